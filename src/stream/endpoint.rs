//! Direction queries for source and destination streams
//!
//! Tokio's `AsyncRead`/`AsyncWrite` say what a type can do in principle; a
//! copy also needs to know whether a particular stream is usable right now,
//! so that a closed stream is reported as disposed rather than as the wrong
//! kind of stream.

use crate::error::{Direction, Result, StreamRole, TransferError};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Runtime readability and writability of a stream
pub trait StreamCapabilities {
    /// Whether the stream can currently be read
    fn can_read(&self) -> bool;

    /// Whether the stream can currently be written
    fn can_write(&self) -> bool;
}

/// Check that `stream` can be read from
///
/// A stream that is neither readable nor writable has been disposed; one
/// that is only writable was passed in the wrong direction.
pub fn ensure_readable<S>(stream: &S, role: StreamRole) -> Result<()>
where
    S: StreamCapabilities + ?Sized,
{
    ensure_direction(stream.can_read(), stream.can_write(), role, Direction::Read)
}

/// Check that `stream` can be written to
pub fn ensure_writable<S>(stream: &S, role: StreamRole) -> Result<()>
where
    S: StreamCapabilities + ?Sized,
{
    ensure_direction(stream.can_write(), stream.can_read(), role, Direction::Write)
}

fn ensure_direction(
    required: bool,
    other: bool,
    role: StreamRole,
    direction: Direction,
) -> Result<()> {
    match (required, other) {
        (true, _) => Ok(()),
        (false, false) => Err(TransferError::Disposed { role }),
        (false, true) => Err(TransferError::UnsupportedDirection {
            role,
            required: direction,
        }),
    }
}

/// Stream wrapper with explicit directions and a closed state
///
/// Reads and writes on a closed endpoint, or in a direction it was not
/// opened for, fail with an I/O error.
#[derive(Debug)]
pub struct Endpoint<S> {
    inner: S,
    readable: bool,
    writable: bool,
    closed: bool,
}

impl<S> Endpoint<S> {
    /// Wrap a stream that is only read from
    pub fn reader(inner: S) -> Self {
        Self::new(inner, true, false)
    }

    /// Wrap a stream that is only written to
    pub fn writer(inner: S) -> Self {
        Self::new(inner, false, true)
    }

    /// Wrap a stream used in both directions
    pub fn duplex(inner: S) -> Self {
        Self::new(inner, true, true)
    }

    fn new(inner: S, readable: bool, writable: bool) -> Self {
        Self {
            inner,
            readable,
            writable,
            closed: false,
        }
    }

    /// Close the endpoint; it is then neither readable nor writable
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Borrow the wrapped stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the wrapped stream
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn check(&self, direction: Direction) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "endpoint is closed"));
        }
        let allowed = match direction {
            Direction::Read => self.readable,
            Direction::Write => self.writable,
        };
        if allowed {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("endpoint does not support {}", direction),
            ))
        }
    }
}

impl<S> StreamCapabilities for Endpoint<S> {
    fn can_read(&self) -> bool {
        !self.closed && self.readable
    }

    fn can_write(&self) -> bool {
        !self.closed && self.writable
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Endpoint<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.check(Direction::Read)?;
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Endpoint<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.check(Direction::Write)?;
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.check(Direction::Write)?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl<T: StreamCapabilities + ?Sized> StreamCapabilities for &mut T {
    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_write(&self) -> bool {
        (**self).can_write()
    }
}

impl<T: StreamCapabilities + ?Sized> StreamCapabilities for Box<T> {
    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_write(&self) -> bool {
        (**self).can_write()
    }
}

impl<R: AsyncRead + StreamCapabilities> StreamCapabilities for tokio::io::BufReader<R> {
    fn can_read(&self) -> bool {
        self.get_ref().can_read()
    }

    fn can_write(&self) -> bool {
        self.get_ref().can_write()
    }
}

impl<W: AsyncWrite + StreamCapabilities> StreamCapabilities for tokio::io::BufWriter<W> {
    fn can_read(&self) -> bool {
        self.get_ref().can_read()
    }

    fn can_write(&self) -> bool {
        self.get_ref().can_write()
    }
}

macro_rules! fixed_capabilities {
    ($ty:ty, read: $read:expr, write: $write:expr) => {
        impl StreamCapabilities for $ty {
            fn can_read(&self) -> bool {
                $read
            }

            fn can_write(&self) -> bool {
                $write
            }
        }
    };
}

fixed_capabilities!(&[u8], read: true, write: false);
fixed_capabilities!(Vec<u8>, read: false, write: true);
fixed_capabilities!(tokio::io::Empty, read: true, write: false);
fixed_capabilities!(tokio::io::Sink, read: false, write: true);
fixed_capabilities!(tokio::io::Stdin, read: true, write: false);
fixed_capabilities!(tokio::io::Stdout, read: false, write: true);
fixed_capabilities!(tokio::io::Stderr, read: false, write: true);
fixed_capabilities!(tokio::io::DuplexStream, read: true, write: true);
fixed_capabilities!(tokio::net::TcpStream, read: true, write: true);
// Open mode is not observable on a file handle.
fixed_capabilities!(tokio::fs::File, read: true, write: true);

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_readable_source_accepted() {
        let source: &[u8] = b"data";
        assert!(ensure_readable(&source, StreamRole::Source).is_ok());
    }

    #[test]
    fn test_write_only_source_is_unsupported() {
        let source = Endpoint::writer(Vec::<u8>::new());
        let err = ensure_readable(&source, StreamRole::Source).unwrap_err();
        assert!(matches!(
            err,
            TransferError::UnsupportedDirection {
                role: StreamRole::Source,
                required: Direction::Read
            }
        ));
    }

    #[test]
    fn test_closed_destination_is_disposed() {
        let mut destination = Endpoint::writer(Vec::<u8>::new());
        destination.close();
        let err = ensure_writable(&destination, StreamRole::Destination).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Disposed {
                role: StreamRole::Destination
            }
        ));
    }

    #[test]
    fn test_read_only_destination_is_unsupported() {
        let destination = Endpoint::reader(tokio::io::empty());
        let err = ensure_writable(&destination, StreamRole::Destination).unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedDirection { .. }));
    }

    #[test]
    fn test_buffered_wrappers_forward_capabilities() {
        let source = tokio::io::BufReader::new(&b"data"[..]);
        assert!(ensure_readable(&source, StreamRole::Source).is_ok());

        let destination = tokio::io::BufWriter::new(Endpoint::writer(Vec::<u8>::new()));
        assert!(ensure_writable(&destination, StreamRole::Destination).is_ok());
        assert!(!destination.can_read());
    }

    #[tokio::test]
    async fn test_endpoint_passes_through_io() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = Endpoint::writer(client);
        let mut reader = Endpoint::reader(server);

        writer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_closed_endpoint_rejects_io() {
        let mut reader = Endpoint::reader(&b"data"[..]);
        reader.close();
        assert!(!reader.can_read());

        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_wrong_direction_io_rejected() {
        let (client, _server) = tokio::io::duplex(8);
        let mut writer = Endpoint::writer(client);
        let mut buf = [0u8; 1];
        let err = writer.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
