use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use rotcp_transport::{LineStream, TcpTransport, TransportError};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::parser::{FrameParser, ServeConfig, ServeSummary};
use crate::protocol::Protocol;

/// Serves a [`Protocol`] over TCP, one thread per connection.
pub struct ProtocolServer {
    transport: TcpTransport,
    protocol: Arc<Protocol>,
    config: ServeConfig,
    running: Arc<AtomicBool>,
    next_conn_id: AtomicU64,
}

/// Stops a running [`ProtocolServer`] from another thread.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Clear the running flag and wake the accept loop.
    ///
    /// Connections already being served stop after their current frame.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // A throwaway connection unblocks accept().
        let _ = TcpStream::connect(self.local_addr);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl ProtocolServer {
    /// Bind and listen on `addr`.
    pub fn bind(
        addr: impl std::net::ToSocketAddrs + std::fmt::Debug,
        protocol: Arc<Protocol>,
    ) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self {
            transport,
            protocol,
            config: ServeConfig::default(),
            running: Arc::new(AtomicBool::new(true)),
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Override per-connection serve config.
    pub fn with_config(mut self, config: ServeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            running: Arc::clone(&self.running),
            local_addr: self.local_addr(),
        }
    }

    /// Accept connections until stopped, spawning a parser thread for each.
    pub fn run(&self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            let stream = match self.transport.accept() {
                Ok(stream) => stream,
                Err(_) if !self.running.load(Ordering::SeqCst) => break,
                Err(err) => return Err(err.into()),
            };
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let protocol = Arc::clone(&self.protocol);
            let config = self.config.clone();
            let running = Arc::clone(&self.running);
            thread::Builder::new()
                .name(format!("rotcp-conn-{id}"))
                .spawn(move || {
                    let _ = serve_connection(id, stream, protocol, config, &running);
                })
                .map_err(TransportError::from)?;
        }
        info!(protocol = self.protocol.name(), "server stopped");
        Ok(())
    }
}

/// Run one connection's parser loop on the current thread.
pub fn serve_connection(
    id: u64,
    stream: LineStream,
    protocol: Arc<Protocol>,
    config: ServeConfig,
    running: &AtomicBool,
) -> Result<ServeSummary> {
    let peer = stream.peer_addr();
    info!(conn = id, peer = ?peer, "connection opened");

    let result = FrameParser::with_line(stream, protocol, config)
        .and_then(|mut parser| parser.serve(running));
    match &result {
        Ok(summary) => info!(
            conn = id,
            frames_ok = summary.frames_ok,
            frames_dropped = summary.frames_dropped,
            bytes_discarded = summary.bytes_discarded,
            "connection finished"
        ),
        Err(err) => warn!(conn = id, error = %err, "connection ended with error"),
    }
    debug!(conn = id, "connection thread exiting");
    result
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::mpsc;
    use std::time::Duration;

    use rotcp_codec::ExplainedValue;

    use super::*;
    use crate::handler::tests::telemetry_fields;
    use crate::handler::FunctionHandler;
    use crate::protocol::tests::{demo_schema, REFERENCE_FRAME};

    fn channel_protocol(tx: mpsc::Sender<ExplainedValue>) -> Arc<Protocol> {
        let tx = std::sync::Mutex::new(tx);
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields())
            .unwrap()
            .on_message(move |fields| {
                tx.lock().unwrap().send(fields["e"].explained.clone())?;
                Ok(())
            });
        Arc::new(Protocol::builder(demo_schema()).handler(handler).build().unwrap())
    }

    #[test]
    fn serves_concurrent_connections() {
        let (tx, rx) = mpsc::channel();
        let server = ProtocolServer::bind("127.0.0.1:0", channel_protocol(tx)).unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        let accept_loop = thread::spawn(move || server.run());

        let clients: Vec<_> = (0..3)
            .map(|_| {
                thread::spawn(move || {
                    let mut stream = TcpTransport::connect(addr).unwrap();
                    stream.write_all(&REFERENCE_FRAME.repeat(2)).unwrap();
                    stream.flush().unwrap();
                })
            })
            .collect();
        for client in clients {
            client.join().unwrap();
        }

        for _ in 0..6 {
            let label = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(label, ExplainedValue::Enum("B".into()));
        }

        handle.stop();
        accept_loop.join().unwrap().unwrap();
        assert!(!handle.is_running());
    }

    #[test]
    fn serve_connection_reports_summary() {
        let (tx, _rx) = mpsc::channel();
        let protocol = channel_protocol(tx);
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let client = thread::spawn(move || {
            let mut stream = TcpTransport::connect(addr).unwrap();
            let mut wire = vec![0x00];
            wire.extend_from_slice(&REFERENCE_FRAME);
            stream.write_all(&wire).unwrap();
        });

        let stream = listener.accept().unwrap();
        client.join().unwrap();
        let summary = serve_connection(
            1,
            stream,
            protocol,
            ServeConfig::default(),
            &AtomicBool::new(true),
        )
        .unwrap();
        assert_eq!(summary.frames_ok, 1);
        assert_eq!(summary.bytes_discarded, 1);
    }
}
