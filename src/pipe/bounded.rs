//! Single-writer, single-reader bounded pipe
//!
//! Flushed bytes are kept as a queue of `Bytes` segments. The writer fills a
//! private `BytesMut` and hands committed bytes over on `flush`, so segments
//! are never copied. A flush only publishes once its bytes fit under
//! `pause_writer_threshold` (or the pipe is empty), so the pipe never holds
//! more than the larger of that threshold and one flushed segment. A flush
//! that leaves the pipe at the threshold suspends until the reader has
//! drained it to `resume_writer_threshold` or less.

use super::{BufferReader, BufferWriter, FlushResult, ReadResult};
use crate::config::PipeOptions;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// How the write end finished
#[derive(Debug, Clone)]
enum WriterCompletion {
    Clean,
    Faulted(String),
}

#[derive(Debug, Default)]
struct State {
    /// Flushed, unconsumed segments
    segments: VecDeque<Bytes>,
    /// Sum of segment lengths
    buffered: usize,
    /// Absolute position of the first byte in `segments`
    consumed: u64,
    /// End position handed out by the most recent read
    examined: u64,
    writer: Option<WriterCompletion>,
    reader_completed: bool,
    read_cancel_pending: bool,
    flush_cancel_pending: bool,
}

impl State {
    fn end(&self) -> u64 {
        self.consumed + self.buffered as u64
    }

    fn snapshot(&self) -> Vec<Bytes> {
        self.segments.iter().cloned().collect()
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    options: PipeOptions,
    /// Wakes a reader suspended in `read`
    reader_wake: Notify,
    /// Wakes a writer suspended in `flush`
    writer_wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a bounded pipe, returning its write and read ends
pub fn bounded(options: PipeOptions) -> Result<(PipeWriter, PipeReader)> {
    options.validate()?;

    let shared = Arc::new(Shared {
        state: Mutex::new(State::default()),
        options,
        reader_wake: Notify::new(),
        writer_wake: Notify::new(),
    });

    let writer = PipeWriter {
        shared: Arc::clone(&shared),
        buffer: BytesMut::new(),
        committed: 0,
        completed: false,
    };
    let reader = PipeReader {
        shared,
        completed: false,
    };

    Ok((writer, reader))
}

/// Cancels pending pipe operations from outside the stage that owns the end
#[derive(Debug, Clone)]
pub struct PipeCanceller {
    shared: Arc<Shared>,
}

impl PipeCanceller {
    /// Make the current (or next) `read` return with `is_canceled` set
    pub fn cancel_pending_read(&self) {
        self.shared.lock().read_cancel_pending = true;
        self.shared.reader_wake.notify_one();
    }

    /// Make the current (or next) `flush` return with `is_canceled` set
    pub fn cancel_pending_flush(&self) {
        self.shared.lock().flush_cancel_pending = true;
        self.shared.writer_wake.notify_one();
    }
}

/// Write end of a bounded pipe
///
/// Dropping the writer completes it cleanly.
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
    /// Committed bytes followed by memory lent out by `get_memory`
    buffer: BytesMut,
    committed: usize,
    completed: bool,
}

impl PipeWriter {
    /// Handle for cancelling pending operations on this pipe
    pub fn canceller(&self) -> PipeCanceller {
        PipeCanceller {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bytes committed but not yet flushed
    pub fn unflushed_len(&self) -> usize {
        self.committed
    }

    /// Whether this end has been completed
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Move committed bytes into the shared queue without waiting for room.
    ///
    /// Bytes are discarded when the reader is gone.
    fn publish_remaining(&mut self) {
        let chunk = self.buffer.split_to(self.committed).freeze();
        self.committed = 0;

        let mut state = self.shared.lock();
        if state.reader_completed || chunk.is_empty() {
            return;
        }
        state.buffered += chunk.len();
        state.segments.push_back(chunk);
    }
}

#[async_trait]
impl BufferWriter for PipeWriter {
    fn get_memory(&mut self, size_hint: usize) -> &mut [u8] {
        let size = size_hint.max(self.shared.options.minimum_segment_size);
        self.buffer.resize(self.committed + size, 0);
        &mut self.buffer[self.committed..]
    }

    fn advance(&mut self, count: usize) {
        let lent = self.buffer.len() - self.committed;
        debug_assert!(count <= lent, "advanced {} bytes past {} lent", count, lent);
        self.committed += count.min(lent);
        self.buffer.truncate(self.committed);
    }

    async fn flush(&mut self) -> Result<FlushResult> {
        let options = self.shared.options;
        let mut published = self.committed == 0;
        let mut paused = false;
        loop {
            let notified = self.shared.writer_wake.notified();
            {
                let mut state = self.shared.lock();
                if state.flush_cancel_pending {
                    state.flush_cancel_pending = false;
                    return Ok(FlushResult {
                        is_canceled: true,
                        is_completed: state.reader_completed,
                    });
                }
                if state.reader_completed {
                    self.buffer.clear();
                    self.committed = 0;
                    return Ok(FlushResult {
                        is_canceled: false,
                        is_completed: true,
                    });
                }

                if !published {
                    // An oversized segment may only enter an empty pipe.
                    let fits = state.buffered == 0
                        || state.buffered + self.committed <= options.pause_writer_threshold;
                    if fits {
                        let chunk = self.buffer.split_to(self.committed).freeze();
                        self.committed = 0;
                        state.buffered += chunk.len();
                        state.segments.push_back(chunk);
                        published = true;
                        paused = false;
                        self.shared.reader_wake.notify_one();
                    }
                }

                if published {
                    let has_room = if paused {
                        state.buffered <= options.resume_writer_threshold
                    } else {
                        state.buffered < options.pause_writer_threshold
                    };
                    if has_room {
                        return Ok(FlushResult::default());
                    }
                }
                if !paused {
                    tracing::trace!(buffered = state.buffered, "pipe full, writer paused");
                }
            }
            paused = true;
            notified.await;
        }
    }

    fn complete(&mut self, fault: Option<&TransferError>) {
        if self.completed {
            return;
        }
        self.completed = true;

        if fault.is_none() && self.committed > 0 {
            self.publish_remaining();
        }

        let completion = match fault {
            Some(err) => WriterCompletion::Faulted(err.to_string()),
            None => WriterCompletion::Clean,
        };
        tracing::trace!(?completion, "pipe writer completed");
        self.shared.lock().writer = Some(completion);
        self.shared.reader_wake.notify_one();
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.complete(None);
    }
}

/// Read end of a bounded pipe
///
/// Dropping the reader completes it.
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
    completed: bool,
}

impl PipeReader {
    /// Handle for cancelling pending operations on this pipe
    pub fn canceller(&self) -> PipeCanceller {
        PipeCanceller {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bytes flushed by the writer and not yet consumed
    pub fn buffered_len(&self) -> usize {
        self.shared.lock().buffered
    }

    /// Absolute position of the read cursor
    pub fn position(&self) -> u64 {
        self.shared.lock().consumed
    }

    /// Whether this end has been completed
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

#[async_trait]
impl BufferReader for PipeReader {
    async fn read(&mut self) -> Result<ReadResult> {
        loop {
            let notified = self.shared.reader_wake.notified();
            {
                let mut state = self.shared.lock();
                if state.read_cancel_pending {
                    state.read_cancel_pending = false;
                    return Ok(ReadResult::new(state.consumed, state.snapshot(), true, false));
                }
                if let Some(WriterCompletion::Faulted(message)) = &state.writer {
                    return Err(TransferError::PeerFaulted(message.clone()));
                }

                let end = state.end();
                let writer_done = state.writer.is_some();
                if end > state.examined || writer_done {
                    state.examined = end;
                    return Ok(ReadResult::new(state.consumed, state.snapshot(), false, writer_done));
                }
            }
            notified.await;
        }
    }

    fn advance_to(&mut self, position: u64) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if position <= state.consumed {
            return Ok(());
        }
        let buffered_end = state.end();
        if position > buffered_end {
            return Err(TransferError::InvalidAdvance {
                position,
                buffered_end,
            });
        }

        let count = (position - state.consumed) as usize;
        let mut remaining = count;
        while remaining > 0 {
            let Some(front) = state.segments.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                state.segments.pop_front();
            } else {
                front.advance(remaining);
                remaining = 0;
            }
        }

        state.buffered -= count;
        state.consumed = position;
        state.examined = state.examined.max(position);
        drop(guard);

        self.shared.writer_wake.notify_one();
        Ok(())
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;

        let mut state = self.shared.lock();
        state.reader_completed = true;
        state.segments.clear();
        state.buffered = 0;
        drop(state);

        tracing::trace!("pipe reader completed");
        self.shared.writer_wake.notify_one();
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready};

    fn write_bytes(writer: &mut PipeWriter, data: &[u8]) {
        let memory = writer.get_memory(data.len());
        memory[..data.len()].copy_from_slice(data);
        writer.advance(data.len());
    }

    fn concat(result: &ReadResult) -> Vec<u8> {
        result.chunks().iter().flat_map(|c| c.iter().copied()).collect()
    }

    #[tokio::test]
    async fn test_flushed_bytes_reach_reader_in_order() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();

        write_bytes(&mut writer, b"hello ");
        writer.flush().await.unwrap();
        write_bytes(&mut writer, b"world");
        writer.flush().await.unwrap();

        let result = reader.read().await.unwrap();
        assert_eq!(concat(&result), b"hello world");
        assert_eq!(result.chunks().len(), 2);
        assert!(!result.is_completed());
        assert_eq!(reader.buffered_len(), 11);
    }

    #[tokio::test]
    async fn test_unflushed_bytes_are_invisible() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();
        write_bytes(&mut writer, b"pending");
        assert_eq!(writer.unflushed_len(), 7);

        let mut read = tokio_test::task::spawn(reader.read());
        assert_pending!(read.poll());
        drop(read);
        assert_eq!(reader.buffered_len(), 0);
    }

    #[tokio::test]
    async fn test_read_waits_for_flush() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();

        let mut read = tokio_test::task::spawn(reader.read());
        assert_pending!(read.poll());

        write_bytes(&mut writer, b"abc");
        writer.flush().await.unwrap();

        assert!(read.is_woken());
        let result = assert_ready!(read.poll()).unwrap();
        assert_eq!(concat(&result), b"abc");
    }

    #[tokio::test]
    async fn test_flush_pauses_until_reader_drains() {
        let options = PipeOptions {
            pause_writer_threshold: 8,
            resume_writer_threshold: 4,
            minimum_segment_size: 8,
        };
        let (mut writer, mut reader) = bounded(options).unwrap();

        write_bytes(&mut writer, b"12345678");
        {
            let mut flush = tokio_test::task::spawn(writer.flush());
            assert_pending!(flush.poll());

            // Draining to 6 bytes is not enough to resume.
            reader.advance_to(2).unwrap();
            assert_pending!(flush.poll());

            reader.advance_to(4).unwrap();
            let result = assert_ready!(flush.poll()).unwrap();
            assert_eq!(result, FlushResult::default());
        }
        assert_eq!(reader.buffered_len(), 4);
    }

    #[tokio::test]
    async fn test_flush_waits_for_room_before_publishing() {
        let (mut writer, mut reader) = bounded(PipeOptions::with_capacity(8)).unwrap();
        write_bytes(&mut writer, b"1234567");
        writer.flush().await.unwrap();
        assert_eq!(reader.buffered_len(), 7);

        write_bytes(&mut writer, b"abcdefgh");
        {
            let mut flush = tokio_test::task::spawn(writer.flush());
            assert_pending!(flush.poll());
            assert_eq!(reader.buffered_len(), 7);

            reader.advance_to(3).unwrap();
            assert_pending!(flush.poll());
            assert_eq!(reader.buffered_len(), 4);

            // Published once empty, then paused at capacity.
            reader.advance_to(7).unwrap();
            assert_pending!(flush.poll());
            assert_eq!(reader.buffered_len(), 8);

            reader.advance_to(11).unwrap();
            let result = assert_ready!(flush.poll()).unwrap();
            assert_eq!(result, FlushResult::default());
        }
        assert_eq!(reader.buffered_len(), 4);
    }

    #[tokio::test]
    async fn test_buffered_bytes_never_exceed_capacity() {
        let capacity = 16;
        let (mut writer, mut reader) = bounded(PipeOptions::with_capacity(capacity)).unwrap();
        let sizes = [1usize, 16, 5, 12, 9, 16, 3, 7, 15, 2];
        let total: usize = sizes.iter().sum();

        let produce = async {
            for (i, &size) in sizes.iter().enumerate() {
                write_bytes(&mut writer, &vec![i as u8; size]);
                writer.flush().await.unwrap();
            }
            writer.complete(None);
        };
        let consume = async {
            let mut received = 0;
            loop {
                let result = reader.read().await.unwrap();
                assert!(result.len() <= capacity, "{} bytes buffered", result.len());
                received += result.len();
                reader.advance_to(result.end()).unwrap();
                if result.is_completed() {
                    break received;
                }
                tokio::task::yield_now().await;
            }
        };
        let ((), received) = tokio::join!(produce, consume);

        assert_eq!(received, total);
    }

    #[tokio::test]
    async fn test_partial_advance_keeps_unconsumed_bytes() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();
        write_bytes(&mut writer, b"abcdef");
        writer.flush().await.unwrap();

        let first = reader.read().await.unwrap();
        reader.advance_to(first.start() + 2).unwrap();

        write_bytes(&mut writer, b"gh");
        writer.flush().await.unwrap();

        let second = reader.read().await.unwrap();
        assert_eq!(second.start(), 2);
        assert_eq!(concat(&second), b"cdefgh");
        assert_eq!(reader.position(), 2);
    }

    #[tokio::test]
    async fn test_advance_past_buffered_end_fails() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();
        write_bytes(&mut writer, b"abc");
        writer.flush().await.unwrap();

        let err = reader.advance_to(10).unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidAdvance {
                position: 10,
                buffered_end: 3
            }
        ));
        // Stale positions are ignored.
        reader.advance_to(3).unwrap();
        reader.advance_to(1).unwrap();
        assert_eq!(reader.position(), 3);
    }

    #[tokio::test]
    async fn test_clean_completion_delivers_remaining_bytes() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();
        write_bytes(&mut writer, b"tail");
        writer.complete(None);
        writer.complete(None);

        let result = reader.read().await.unwrap();
        assert_eq!(concat(&result), b"tail");
        assert!(result.is_completed());

        reader.advance_to(result.end()).unwrap();
        let last = reader.read().await.unwrap();
        assert!(last.is_empty());
        assert!(last.is_completed());
    }

    #[tokio::test]
    async fn test_faulted_writer_fails_reader() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();
        write_bytes(&mut writer, b"lost");
        writer.flush().await.unwrap();
        writer.complete(Some(&TransferError::Cancelled));

        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, TransferError::PeerFaulted(ref m) if m == "Operation cancelled"));
    }

    #[tokio::test]
    async fn test_reader_completion_releases_writer() {
        let options = PipeOptions::with_capacity(4);
        let (mut writer, mut reader) = bounded(options).unwrap();

        write_bytes(&mut writer, b"full");
        {
            let mut flush = tokio_test::task::spawn(writer.flush());
            assert_pending!(flush.poll());
            reader.complete();
            let result = assert_ready!(flush.poll()).unwrap();
            assert!(result.is_completed);
        }

        write_bytes(&mut writer, b"more");
        assert!(writer.flush().await.unwrap().is_completed);
    }

    #[tokio::test]
    async fn test_cancel_pending_read() {
        let (_writer, mut reader) = bounded(PipeOptions::default()).unwrap();
        let canceller = reader.canceller();

        let mut read = tokio_test::task::spawn(reader.read());
        assert_pending!(read.poll());
        canceller.cancel_pending_read();

        let result = assert_ready!(read.poll()).unwrap();
        assert!(result.is_canceled());
        assert!(!result.is_completed());
    }

    #[tokio::test]
    async fn test_cancel_pending_flush() {
        let (mut writer, _reader) = bounded(PipeOptions::with_capacity(2)).unwrap();
        let canceller = writer.canceller();

        write_bytes(&mut writer, b"xyz");
        let mut flush = tokio_test::task::spawn(writer.flush());
        assert_pending!(flush.poll());
        canceller.cancel_pending_flush();

        let result = assert_ready!(flush.poll()).unwrap();
        assert!(result.is_canceled);
        assert!(!result.is_completed);
    }

    #[tokio::test]
    async fn test_dropping_writer_completes_pipe() {
        let (mut writer, mut reader) = bounded(PipeOptions::default()).unwrap();
        write_bytes(&mut writer, b"bye");
        drop(writer);

        let result = reader.read().await.unwrap();
        assert_eq!(concat(&result), b"bye");
        assert!(result.is_completed());
    }

    #[test]
    fn test_invalid_options_rejected() {
        assert!(bounded(PipeOptions::with_capacity(0)).is_err());
    }
}
