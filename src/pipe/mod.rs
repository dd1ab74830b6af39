//! Bounded byte pipe module
//!
//! A pipe has one write end and one read end over a shared, capacity-bounded
//! run of bytes. The write end fills memory, commits it with `advance` and
//! publishes it with `flush`; the read end pulls everything published so far
//! and releases what it consumed with `advance_to`. Each end completes
//! independently.
//!
//! The two capabilities are expressed as the [`BufferWriter`] and
//! [`BufferReader`] traits so copy stages do not depend on a concrete pipe.
//! [`bounded`] creates the implementation shipped with this crate.

mod bounded;

pub use bounded::{bounded, PipeCanceller, PipeReader, PipeWriter};

use crate::error::{Result, TransferError};
use async_trait::async_trait;
use bytes::Bytes;

/// Outcome of a `flush`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushResult {
    /// The pending flush was cancelled through [`PipeCanceller::cancel_pending_flush`]
    pub is_canceled: bool,
    /// The reader has completed and will not consume anything further
    pub is_completed: bool,
}

/// Bytes available to the reader at the time of a `read`
#[derive(Debug, Clone, Default)]
pub struct ReadResult {
    start: u64,
    chunks: Vec<Bytes>,
    is_canceled: bool,
    is_completed: bool,
}

impl ReadResult {
    /// Create a read result starting at absolute position `start`
    pub fn new(start: u64, chunks: Vec<Bytes>, is_canceled: bool, is_completed: bool) -> Self {
        Self {
            start,
            chunks,
            is_canceled,
            is_completed,
        }
    }

    /// Available chunks in FIFO order
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Chunks paired with the absolute position just past each of them
    pub fn positioned(&self) -> impl Iterator<Item = (&Bytes, u64)> + '_ {
        let mut position = self.start;
        self.chunks.iter().map(move |chunk| {
            position += chunk.len() as u64;
            (chunk, position)
        })
    }

    /// Absolute position of the first available byte
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Absolute position just past the last available byte
    pub fn end(&self) -> u64 {
        self.start + self.len() as u64
    }

    /// Total bytes available
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Whether no bytes are available
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Bytes::is_empty)
    }

    /// The pending read was cancelled through [`PipeCanceller::cancel_pending_read`]
    pub fn is_canceled(&self) -> bool {
        self.is_canceled
    }

    /// The writer has completed; nothing beyond [`end`](Self::end) will arrive
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }
}

/// Write end of a bounded buffer
#[async_trait]
pub trait BufferWriter: Send {
    /// Borrow writable memory of at least `size_hint` bytes
    fn get_memory(&mut self, size_hint: usize) -> &mut [u8];

    /// Commit the first `count` bytes of the memory last returned by `get_memory`
    fn advance(&mut self, count: usize);

    /// Publish committed bytes to the reader, suspending while the pipe is full
    async fn flush(&mut self) -> Result<FlushResult>;

    /// Signal that nothing more will be written, optionally carrying a fault
    ///
    /// Calling this more than once has no further effect.
    fn complete(&mut self, fault: Option<&TransferError>);
}

/// Read end of a bounded buffer
#[async_trait]
pub trait BufferReader: Send {
    /// Wait for unread bytes, completion or cancellation
    async fn read(&mut self) -> Result<ReadResult>;

    /// Release every byte before absolute position `position`
    ///
    /// Positions at or before the current cursor are ignored.
    fn advance_to(&mut self, position: u64) -> Result<()>;

    /// Signal that nothing more will be read
    ///
    /// Calling this more than once has no further effect.
    fn complete(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_result_positions() {
        let result = ReadResult::new(
            10,
            vec![Bytes::from_static(b"abc"), Bytes::from_static(b"de")],
            false,
            true,
        );

        let ends: Vec<u64> = result.positioned().map(|(_, end)| end).collect();
        assert_eq!(ends, vec![13, 15]);
        assert_eq!(result.start(), 10);
        assert_eq!(result.end(), 15);
        assert_eq!(result.len(), 5);
        assert!(result.is_completed());
        assert!(!result.is_canceled());
    }

    #[test]
    fn test_empty_read_result() {
        let result = ReadResult::new(7, Vec::new(), false, true);
        assert!(result.is_empty());
        assert_eq!(result.end(), 7);
        assert_eq!(result.positioned().count(), 0);
    }
}
