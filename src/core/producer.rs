//! Stream-to-pipe stage
//!
//! Reads the source straight into memory borrowed from the pipe's write end
//! and publishes each chunk as soon as it is read.

use super::{cancellable, report};
use crate::error::{Result, StreamRole, TransferError};
use crate::pipe::BufferWriter;
use crate::progress::ProgressSink;
use crate::stream::{ensure_readable, StreamCapabilities};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Copy `source` into a pipe until the source ends or the reader goes away
///
/// Each chunk read is committed, flushed and then reported to `progress`;
/// a final `0` is reported when the loop ends without error. The writer is
/// never completed here: the caller decides when no more data will follow.
///
/// Returns the number of bytes read from `source`.
///
/// # Errors
///
/// - [`TransferError::Disposed`] / [`TransferError::UnsupportedDirection`] if
///   `source` cannot be read
/// - [`TransferError::Cancelled`] if `cancel` fires or the flush is cancelled;
///   the chunk being read at that moment is not committed
/// - Any I/O error from `source`
pub async fn copy_stream_to_pipe<R, W>(
    source: &mut R,
    writer: &mut W,
    progress: Option<&dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<u64>
where
    R: AsyncRead + StreamCapabilities + Unpin,
    W: BufferWriter + ?Sized,
{
    ensure_readable(source, StreamRole::Source)?;
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }

    let mut total = 0u64;
    loop {
        let memory = writer.get_memory(0);
        let read = cancellable(cancel, source.read(memory)).await?;
        if read == 0 {
            break;
        }

        writer.advance(read);
        let flush = cancellable(cancel, writer.flush()).await?;
        if flush.is_canceled {
            return Err(TransferError::Cancelled);
        }

        total += read as u64;
        trace!(bytes = read, "chunk produced");
        report(progress, read as u64);

        if flush.is_completed {
            debug!(bytes = total, "pipe reader completed, producer stopping early");
            break;
        }
    }

    report(progress, 0);
    debug!(bytes = total, "producer finished");
    Ok(total)
}
