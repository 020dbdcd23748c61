//! This module contains test doubles and message factories for code built on top of the
//!  calibration tracker. They are used by this crate's own tests, but they are also exported for
//!  application testing.
//!
//! Keeping them in the crate's regular (non-#[cfg(test)]) code is what makes them reachable from
//!  other crates' tests.

pub mod listener;
pub mod message;
pub mod sender;

