//! Source and destination stream module
//!
//! Provides runtime direction checks for the streams a copy reads from and
//! writes to.

mod endpoint;

pub use endpoint::*;
