//! Output formatting
//!
//! Text summary on stdout, optional JSON report on disk.

pub mod json;
pub mod text;
