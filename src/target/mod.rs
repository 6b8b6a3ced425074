//! Mapping target
//!
//! The target is a single file (or special file) opened read-write. How it
//! is mapped is up to [`crate::engine::region`]; this module only gets it
//! into shape and reports how many bytes to map.

pub mod file;

pub use file::{prepare_target, PreparedTarget};
