//! Core copy engine module
//!
//! Provides the two copy stages and the orchestrator that runs them
//! concurrently around one bounded pipe.

mod consumer;
mod copier;
mod producer;

pub use consumer::*;
pub use copier::*;
pub use producer::*;

use crate::error::{Result, TransferError};
use crate::progress::ProgressSink;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Race a suspension point against the cancellation token
async fn cancellable<F, T, E>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<TransferError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        result = operation => result.map_err(Into::into),
    }
}

fn report(progress: Option<&dyn ProgressSink>, bytes: u64) {
    if let Some(sink) = progress {
        sink.report(bytes);
    }
}
