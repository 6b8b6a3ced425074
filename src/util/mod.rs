//! Utility modules

pub mod time;
pub mod topology;
pub mod trace;
