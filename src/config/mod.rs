//! Configuration module for pipecopy
//!
//! Provides pipe sizing, transfer options and CLI arguments.

mod settings;

pub use settings::*;
