use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected protocol line; implements `Read` and `Write`.
///
/// Wraps a TCP stream. Frame readers borrow it through [`Read`]; writers
/// through [`Write`]. [`LineStream::try_clone`] gives the second half when
/// reading and writing happen on different owners.
pub struct LineStream {
    inner: TcpStream,
    peer: Option<SocketAddr>,
}

impl Read for LineStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for LineStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl LineStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            inner: stream,
            peer,
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// A read that times out surfaces as an I/O error, which the frame layer
    /// treats like a closed connection.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Disable Nagle's algorithm so small frames go out immediately.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new socket handle).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self {
            inner: cloned,
            peer: self.peer,
        })
    }

    /// Address of the remote end, if it was known at accept/connect time.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Shut down both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown(Shutdown::Both).map_err(Into::into)
    }
}

impl std::fmt::Debug for LineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}
