pub mod calibration;
pub mod config;
pub mod link;
pub mod messaging;
pub mod session;
pub mod test_util;
