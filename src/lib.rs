//! # pipecopy - Bounded-Buffer Stream Copy
//!
//! pipecopy copies one byte stream to another through a bounded in-memory
//! pipe. A producer stage reads the source into the pipe while a consumer
//! stage drains the pipe into the destination; both run concurrently on the
//! caller's task.
//!
//! ## Features
//!
//! - **Backpressure**: the producer suspends once the pipe holds the pause
//!   threshold and resumes when the consumer drains it to the resume threshold
//! - **Zero-copy hand-off**: the source is read straight into pipe memory and
//!   published as shared segments
//! - **Progress reporting**: chunk sizes from one chosen side, plus a final
//!   `0` per finished stage
//! - **Cooperative cancellation**: one token stops both stages at their next
//!   suspension point
//! - **Fault propagation**: a failing source faults the pipe so the consumer
//!   stops instead of waiting forever
//!
//! ## Quick Start
//!
//! ```no_run
//! use pipecopy::core::simple_copy;
//!
//! # async fn example() -> pipecopy::Result<()> {
//! let mut source = tokio::fs::File::open("/source.bin").await?;
//! let mut destination = tokio::fs::File::create("/destination.bin").await?;
//!
//! let result = simple_copy(&mut source, &mut destination).await?;
//! println!("Copied {} bytes in {:?}", result.bytes_written, result.duration);
//! # Ok(())
//! # }
//! ```
//!
//! ## Advanced Usage
//!
//! ```no_run
//! use pipecopy::config::{PipeOptions, ProgressSide, TransferOptions};
//! use pipecopy::core::StreamCopier;
//! use pipecopy::progress::ProgressCounter;
//!
//! # async fn example() -> pipecopy::Result<()> {
//! let options = TransferOptions {
//!     pipe: PipeOptions::with_capacity(1024 * 1024),
//!     progress_side: ProgressSide::Write,
//! };
//!
//! let counter = ProgressCounter::new();
//! let copier = StreamCopier::new(options).with_progress(counter.clone());
//!
//! let token = copier.cancellation_token();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     token.cancel();
//! });
//!
//! let mut source = tokio::io::stdin();
//! let mut destination = tokio::io::stdout();
//! let result = copier.copy(&mut source, &mut destination).await?;
//! result.print_summary();
//! println!("{} bytes reported", counter.bytes());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod pipe;
pub mod progress;
pub mod stream;

// Re-export commonly used types
pub use crate::config::{PipeOptions, ProgressSide, TransferOptions};
pub use crate::core::{StreamCopier, TransferResult};
pub use crate::error::{Result, TransferError};
pub use crate::progress::{ProgressReporter, ProgressSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use pipecopy::prelude::*;
    //! ```

    pub use crate::config::{PipeOptions, ProgressSide, TransferOptions};
    pub use crate::core::{copy_pipe_to_stream, copy_stream_to_pipe, simple_copy, StreamCopier, TransferResult};
    pub use crate::error::{Result, StreamRole, TransferError};
    pub use crate::pipe::{bounded, BufferReader, BufferWriter, PipeReader, PipeWriter};
    pub use crate::progress::{ProgressCounter, ProgressReporter, ProgressSink};
    pub use crate::stream::{Endpoint, StreamCapabilities};
}
