//! Progress reporting module
//!
//! Defines the sink each copy stage reports chunk sizes to, plus a
//! progress bar and a plain counter implementation.

mod reporter;

pub use reporter::*;
