use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LineStream;

/// TCP listener transport.
///
/// Provides bind/accept/connect over IPv4/IPv6 TCP. Every accepted
/// connection becomes one [`LineStream`] carrying exactly one protocol line.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (e.g. `"0.0.0.0:9000"`, `"127.0.0.1:0"`).
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let label = format!("{addr:?}");
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: label.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: label,
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LineStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        Ok(LineStream::from_tcp(stream))
    }

    /// Connect to a listening peer (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<LineStream> {
        let label = format!("{addr:?}");
        let mut resolved = addr.to_socket_addrs().map_err(|e| TransportError::Connect {
            addr: label.clone(),
            source: e,
        })?;
        let target = resolved
            .next()
            .ok_or_else(|| TransportError::NoAddress(label.clone()))?;
        let stream = TcpStream::connect(target).map_err(|e| TransportError::Connect {
            addr: label,
            source: e,
        })?;
        debug!(%target, "connected over tcp");
        Ok(LineStream::from_tcp(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}
