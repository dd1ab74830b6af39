//! Pipe-to-stream stage

use super::{cancellable, report};
use crate::error::{Result, StreamRole, TransferError};
use crate::pipe::BufferReader;
use crate::progress::ProgressSink;
use crate::stream::{ensure_writable, StreamCapabilities};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Drain a pipe into `destination` until the writer completes
///
/// Every chunk is written, released from the pipe and reported to
/// `progress` in order. On clean completion the destination is flushed and
/// a final `0` is reported.
///
/// Returns the number of bytes written to `destination`.
///
/// # Errors
///
/// - [`TransferError::Disposed`] / [`TransferError::UnsupportedDirection`] if
///   `destination` cannot be written
/// - [`TransferError::Cancelled`] if `cancel` fires or the read is cancelled
/// - [`TransferError::PeerFaulted`] if the writer completed with a fault
/// - Any I/O error from `destination`
pub async fn copy_pipe_to_stream<Rd, D>(
    reader: &mut Rd,
    destination: &mut D,
    progress: Option<&dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<u64>
where
    Rd: BufferReader + ?Sized,
    D: AsyncWrite + StreamCapabilities + Unpin,
{
    ensure_writable(destination, StreamRole::Destination)?;
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }

    let mut total = 0u64;
    loop {
        let result = cancellable(cancel, reader.read()).await?;
        if result.is_canceled() {
            return Err(TransferError::Cancelled);
        }

        // Release each chunk only once it is fully written.
        for (chunk, end) in result.positioned() {
            cancellable(cancel, destination.write_all(chunk)).await?;
            reader.advance_to(end)?;

            total += chunk.len() as u64;
            trace!(bytes = chunk.len(), "chunk consumed");
            report(progress, chunk.len() as u64);
        }
        reader.advance_to(result.end())?;

        if result.is_completed() {
            break;
        }
    }

    cancellable(cancel, destination.flush()).await?;
    report(progress, 0);
    debug!(bytes = total, "consumer finished");
    Ok(total)
}
