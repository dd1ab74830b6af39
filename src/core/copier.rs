//! Stream copy orchestrator
//!
//! Runs the stream-to-pipe and pipe-to-stream stages concurrently on the
//! caller's task, completes each pipe end as its stage finishes, and
//! surfaces the first failure in program order (producer before consumer).

use super::{copy_pipe_to_stream, copy_stream_to_pipe};
use crate::config::{ProgressSide, TransferOptions};
use crate::error::{Result, StreamRole};
use crate::pipe::{self, BufferReader, BufferWriter};
use crate::progress::ProgressSink;
use crate::stream::{ensure_readable, ensure_writable, StreamCapabilities};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of a successful copy
#[derive(Debug, Clone)]
pub struct TransferResult {
    /// Bytes read from the source
    pub bytes_read: u64,
    /// Bytes written to the destination
    pub bytes_written: u64,
    /// Total duration
    pub duration: Duration,
}

impl TransferResult {
    /// Average throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes_written as f64 / secs
        } else {
            0.0
        }
    }

    /// Whether every byte read was also written
    pub fn is_complete(&self) -> bool {
        self.bytes_read == self.bytes_written
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Copy Summary ===");
        println!("Bytes read:      {}", humansize::format_size(self.bytes_read, humansize::BINARY));
        println!("Bytes written:   {}", humansize::format_size(self.bytes_written, humansize::BINARY));
        println!("Duration:        {:.2?}", self.duration);
        println!("Throughput:      {}/s", humansize::format_size(self.throughput() as u64, humansize::BINARY));
    }
}

/// Copies one source stream to one destination stream through a bounded pipe
pub struct StreamCopier {
    /// Pipe sizing and progress attribution
    options: TransferOptions,
    /// Progress sink, handed to the side named by `options.progress_side`
    progress: Option<Arc<dyn ProgressSink>>,
    /// Cancellation token observed by both stages
    cancel: CancellationToken,
}

impl StreamCopier {
    /// Create a new copier
    pub fn new(options: TransferOptions) -> Self {
        Self {
            options,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set progress sink
    pub fn with_progress(self, progress: impl ProgressSink + 'static) -> Self {
        self.with_shared_progress(Arc::new(progress))
    }

    /// Set a progress sink that is also held elsewhere
    pub fn with_shared_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Observe an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get cancellation token for external control
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the operation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check if cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Transfer options in use
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Copy `source` to `destination` through a new bounded pipe
    pub async fn copy<R, D>(&self, source: &mut R, destination: &mut D) -> Result<TransferResult>
    where
        R: AsyncRead + StreamCapabilities + Unpin,
        D: AsyncWrite + StreamCapabilities + Unpin,
    {
        let (mut writer, mut reader) = pipe::bounded(self.options.pipe)?;
        self.copy_via(source, destination, &mut writer, &mut reader).await
    }

    /// Copy `source` to `destination` through caller-supplied pipe ends
    ///
    /// `writer` and `reader` must be the two ends of one buffer. Both are
    /// completed before this returns, whatever the outcome.
    pub async fn copy_via<R, D, W, Rd>(
        &self,
        source: &mut R,
        destination: &mut D,
        writer: &mut W,
        reader: &mut Rd,
    ) -> Result<TransferResult>
    where
        R: AsyncRead + StreamCapabilities + Unpin,
        D: AsyncWrite + StreamCapabilities + Unpin,
        W: BufferWriter + ?Sized,
        Rd: BufferReader + ?Sized,
    {
        let start = Instant::now();

        // Reject misuse before either stage touches a stream.
        let checked = match ensure_readable(&*source, StreamRole::Source) {
            Ok(()) => ensure_writable(&*destination, StreamRole::Destination),
            Err(err) => Err(err),
        };
        if let Err(err) = checked {
            writer.complete(Some(&err));
            reader.complete();
            return Err(err);
        }

        let sink = self.progress.as_deref();
        let (producer_progress, consumer_progress) = match self.options.progress_side {
            ProgressSide::Read => (sink, None),
            ProgressSide::Write => (None, sink),
        };
        debug!(
            side = self.options.progress_side.name(),
            pause = self.options.pipe.pause_writer_threshold,
            "starting stream copy"
        );

        let cancel = &self.cancel;
        let producer = async {
            let result = copy_stream_to_pipe(source, &mut *writer, producer_progress, cancel).await;
            // The consumer only finishes once the write end is completed.
            writer.complete(result.as_ref().err());
            result
        };
        let consumer = async {
            let result = copy_pipe_to_stream(&mut *reader, destination, consumer_progress, cancel).await;
            reader.complete();
            result
        };

        let (produced, consumed) = tokio::join!(producer, consumer);
        let bytes_read = produced?;
        let bytes_written = consumed?;

        let result = TransferResult {
            bytes_read,
            bytes_written,
            duration: start.elapsed(),
        };
        debug!(bytes = result.bytes_written, elapsed = ?result.duration, "stream copy finished");
        Ok(result)
    }
}

impl Default for StreamCopier {
    fn default() -> Self {
        Self::new(TransferOptions::default())
    }
}

/// Copy `source` to `destination` with default options
pub async fn simple_copy<R, D>(source: &mut R, destination: &mut D) -> Result<TransferResult>
where
    R: AsyncRead + StreamCapabilities + Unpin,
    D: AsyncWrite + StreamCapabilities + Unpin,
{
    StreamCopier::default().copy(source, destination).await
}
