//! Error types for pipecopy
//!
//! This module defines the error taxonomy shared by the pipe, both copy
//! stages and the orchestrator.

use std::fmt;
use thiserror::Error;

/// Which end of a transfer a stream was supplied as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// The stream bytes are read from
    Source,
    /// The stream bytes are written to
    Destination,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// Direction a stream must support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Stream must be readable
    Read,
    /// Stream must be writable
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("reading"),
            Self::Write => f.write_str("writing"),
        }
    }
}

/// Main error type for transfer operations
#[derive(Error, Debug)]
pub enum TransferError {
    /// Stream is closed in both directions
    #[error("The {role} stream has been disposed")]
    Disposed {
        /// Which end of the transfer was disposed
        role: StreamRole,
    },

    /// Stream is open but does not support the required direction
    #[error("The {role} stream does not support {required}")]
    UnsupportedDirection {
        /// Which end of the transfer was misused
        role: StreamRole,
        /// Direction the transfer needed
        required: Direction,
    },

    /// Operation cancelled by the caller or by the pipe
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error raised by a source or destination stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The writing end completed with a fault that the reader observed
    #[error("Pipe writer faulted: {0}")]
    PeerFaulted(String),

    /// Reader tried to consume bytes it was never handed
    #[error("Cannot advance to position {position}: only {buffered_end} bytes have been flushed")]
    InvalidAdvance {
        /// Requested absolute position
        position: u64,
        /// Absolute position of the last flushed byte
        buffered_end: u64,
    },

    /// Invalid pipe or transfer options
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TransferError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error represents cancellation
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::Interrupted,
            _ => false,
        }
    }

    /// Check if this error indicates the caller passed the wrong stream
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::Disposed { .. } | Self::UnsupportedDirection { .. } | Self::InvalidAdvance { .. }
        )
    }

    /// Check if this error is recoverable (the same call could be retried)
    ///
    /// Nothing in this crate retries; this only classifies upstream I/O faults
    /// for callers that do.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// Result type alias for pipecopy operations
pub type Result<T> = std::result::Result<T, TransferError>;

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposed_message_names_role() {
        let err = TransferError::Disposed {
            role: StreamRole::Destination,
        };
        assert_eq!(err.to_string(), "The destination stream has been disposed");
        assert!(err.is_misuse());
    }

    #[test]
    fn test_unsupported_direction_message() {
        let err = TransferError::UnsupportedDirection {
            role: StreamRole::Source,
            required: Direction::Read,
        };
        assert_eq!(err.to_string(), "The source stream does not support reading");
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(TransferError::Cancelled.is_cancellation());
        assert!(!TransferError::PeerFaulted("boom".into()).is_cancellation());

        let interrupted = std::io::Error::new(std::io::ErrorKind::Interrupted, "stop");
        assert!(TransferError::from(interrupted).is_cancellation());
    }

    #[test]
    fn test_error_recoverability() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(TransferError::from(timeout).is_recoverable());
        assert!(!TransferError::Cancelled.is_recoverable());
        assert!(!TransferError::config("bad").is_recoverable());
    }
}
