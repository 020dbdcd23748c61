pub mod commands;
pub mod lifecycle;
pub mod listener;
pub mod tracker;
