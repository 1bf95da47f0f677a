use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rotcp_frame::{FrameConfig, FrameError, FrameReader};
use rotcp_transport::LineStream;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, Result};
use crate::protocol::{Message, Protocol};

/// What a connection loop does after a frame-scoped error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Return the error and end the connection.
    CloseConnection,
    /// Log, drop the frame and continue with the next one.
    #[default]
    SkipFrame,
}

/// Configuration for a connection loop.
#[derive(Debug, Clone, Default)]
pub struct ServeConfig {
    pub frame: FrameConfig,
    pub error_policy: ErrorPolicy,
    /// Stop after this many successfully dispatched frames.
    pub max_frames: Option<u64>,
}

/// Outcome counters of one connection loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub frames_ok: u64,
    /// Frames rejected after their preamble matched.
    pub frames_dropped: u64,
    /// Bytes skipped while searching for a preamble.
    pub bytes_discarded: u64,
}

/// Per-connection state machine: read a frame, verify, decrypt, dispatch,
/// repeat.
pub struct FrameParser<T> {
    reader: FrameReader<T>,
    protocol: Arc<Protocol>,
    config: ServeConfig,
}

impl<T: Read> FrameParser<T> {
    pub fn new(inner: T, protocol: Arc<Protocol>) -> Self {
        Self::with_config(inner, protocol, ServeConfig::default())
    }

    pub fn with_config(inner: T, protocol: Arc<Protocol>, config: ServeConfig) -> Self {
        let reader = protocol.reader(inner, config.frame.clone());
        Self {
            reader,
            protocol,
            config,
        }
    }

    /// Read and dispatch exactly one frame.
    pub fn process_next(&mut self) -> Result<Message> {
        let frame = self.reader.read_frame()?;
        self.protocol.dispatch(&frame)
    }

    /// Process frames until the peer closes, `running` is cleared, the
    /// frame limit is reached or an error ends the connection.
    ///
    /// `running` is checked between frames only; a blocked read is not
    /// interrupted.
    pub fn serve(&mut self, running: &AtomicBool) -> Result<ServeSummary> {
        let mut summary = ServeSummary::default();

        while running.load(Ordering::SeqCst) {
            if let Some(max) = self.config.max_frames {
                if summary.frames_ok >= max {
                    debug!(max, "frame limit reached");
                    break;
                }
            }

            match self.process_next() {
                Ok(message) => {
                    summary.frames_ok += 1;
                    info!(
                        function_code = message.function_code,
                        handler = %message.handler,
                        fields = message.fields.len(),
                        "frame dispatched"
                    );
                }
                Err(err) if err.is_connection_closed() => {
                    debug!("connection closed by peer");
                    break;
                }
                Err(err) if err.is_connection_fatal() => return Err(err),
                Err(err) if self.config.error_policy == ErrorPolicy::CloseConnection => {
                    return Err(err)
                }
                Err(DispatchError::Frame(FrameError::SyncLost { found, .. })) => {
                    summary.bytes_discarded += 1;
                    debug!(found = ?found, "preamble mismatch, discarded one byte");
                }
                Err(err) => {
                    summary.frames_dropped += 1;
                    warn!(error = %err, "dropped frame");
                }
            }
        }

        Ok(summary)
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn reader(&self) -> &FrameReader<T> {
        &self.reader
    }
}

impl FrameParser<LineStream> {
    /// Parser over a TCP line, applying the read timeout from config.
    pub fn with_line(
        inner: LineStream,
        protocol: Arc<Protocol>,
        config: ServeConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.frame.read_timeout)?;
        Ok(Self::with_config(inner, protocol, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use bytes::Bytes;
    use rotcp_codec::ExplainedValue;

    use super::*;
    use crate::handler::tests::telemetry_fields;
    use crate::handler::{FunctionHandler, ParsedFields};
    use crate::protocol::tests::{demo_protocol, demo_schema, REFERENCE_FRAME};

    fn recording_protocol(seen: Arc<Mutex<Vec<ParsedFields>>>) -> Arc<Protocol> {
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields())
            .unwrap()
            .on_message(move |fields| {
                seen.lock().unwrap().push(fields.clone());
                Ok(())
            });
        Arc::new(Protocol::builder(demo_schema()).handler(handler).build().unwrap())
    }

    #[test]
    fn process_next_dispatches() {
        let mut parser = FrameParser::new(
            Cursor::new(REFERENCE_FRAME.to_vec()),
            Arc::new(demo_protocol()),
        );
        let message = parser.process_next().unwrap();
        assert_eq!(message.fields["a"].explained, ExplainedValue::Int(2_147_483_647));
        assert!(parser.process_next().unwrap_err().is_connection_closed());
    }

    #[test]
    fn sync_lost_stops_before_any_downstream_work() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut wire = REFERENCE_FRAME.to_vec();
        wire[0] = 0x69;

        let mut parser = FrameParser::new(Cursor::new(wire), recording_protocol(seen.clone()));
        let err = parser.process_next().unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Frame(FrameError::SyncLost { .. })
        ));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(parser.reader().buffered(), REFERENCE_FRAME.len() - 1);
    }

    #[test]
    fn checksum_mismatch_never_reaches_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut wire = REFERENCE_FRAME.to_vec();
        wire[8] ^= 0x10;

        let mut parser = FrameParser::new(Cursor::new(wire), recording_protocol(seen.clone()));
        let err = parser.process_next().unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Frame(FrameError::ChecksumMismatch { .. })
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn skip_policy_resynchronizes_and_continues() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut corrupted = REFERENCE_FRAME.to_vec();
        corrupted[8] ^= 0x10;

        let mut wire = vec![0xEE, 0xEE, 0xEE];
        wire.extend_from_slice(&corrupted);
        wire.extend_from_slice(&REFERENCE_FRAME);

        let mut parser = FrameParser::new(Cursor::new(wire), recording_protocol(seen.clone()));
        let summary = parser.serve(&AtomicBool::new(true)).unwrap();

        assert_eq!(
            summary,
            ServeSummary {
                frames_ok: 1,
                frames_dropped: 1,
                bytes_discarded: 3,
            }
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn close_policy_returns_first_error() {
        let mut wire = vec![0xEE];
        wire.extend_from_slice(&REFERENCE_FRAME);

        let mut parser = FrameParser::with_config(
            Cursor::new(wire),
            Arc::new(demo_protocol()),
            ServeConfig {
                error_policy: ErrorPolicy::CloseConnection,
                ..ServeConfig::default()
            },
        );
        let err = parser.serve(&AtomicBool::new(true)).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Frame(FrameError::SyncLost { .. })
        ));
    }

    #[test]
    fn unknown_function_code_dropped_under_skip() {
        let protocol = Arc::new(demo_protocol());
        // Function code 2 has no handler.
        let mut other = bytes::BytesMut::new();
        rotcp_frame::encode_frame(
            protocol.schema(),
            protocol.checksums(),
            &rotcp_frame::OutgoingFrame::new(2, Bytes::from_static(&[0x00])),
            &mut other,
        )
        .unwrap();

        let mut wire = other.to_vec();
        wire.extend_from_slice(&REFERENCE_FRAME);
        let mut parser = FrameParser::new(Cursor::new(wire), protocol);
        let summary = parser.serve(&AtomicBool::new(true)).unwrap();
        assert_eq!(summary.frames_ok, 1);
        assert_eq!(summary.frames_dropped, 1);
    }

    #[test]
    fn unknown_cipher_flag_ends_connection_under_skip() {
        // Valid checksum, unregistered flag.
        let protocol = Arc::new(demo_protocol());
        let mut fixed = bytes::BytesMut::new();
        rotcp_frame::encode_frame(
            protocol.schema(),
            protocol.checksums(),
            &rotcp_frame::OutgoingFrame {
                function_code: 1,
                encryption_flag: 7,
                serial_number: 0,
                payload: Bytes::copy_from_slice(&REFERENCE_FRAME[4..17]),
            },
            &mut fixed,
        )
        .unwrap();

        let mut parser = FrameParser::new(Cursor::new(fixed.to_vec()), protocol);
        let err = parser.serve(&AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCipherFlag(7)));
    }

    #[test]
    fn max_frames_and_running_flag_stop_the_loop() {
        let wire: Vec<u8> = REFERENCE_FRAME.repeat(3);
        let mut parser = FrameParser::with_config(
            Cursor::new(wire.clone()),
            Arc::new(demo_protocol()),
            ServeConfig {
                max_frames: Some(2),
                ..ServeConfig::default()
            },
        );
        let summary = parser.serve(&AtomicBool::new(true)).unwrap();
        assert_eq!(summary.frames_ok, 2);

        let mut stopped = FrameParser::new(Cursor::new(wire), Arc::new(demo_protocol()));
        let summary = stopped.serve(&AtomicBool::new(false)).unwrap();
        assert_eq!(summary, ServeSummary::default());
    }

    #[test]
    fn two_parsers_share_one_protocol() {
        let protocol = Arc::new(demo_protocol());
        let wire = REFERENCE_FRAME.repeat(2);

        let run = |protocol: Arc<Protocol>, wire: Vec<u8>| {
            std::thread::spawn(move || {
                let mut parser = FrameParser::new(Cursor::new(wire), protocol);
                let mut messages = Vec::new();
                while let Ok(message) = parser.process_next() {
                    messages.push(message);
                }
                messages
            })
        };

        let first = run(Arc::clone(&protocol), wire.clone());
        let second = run(Arc::clone(&protocol), wire);
        let first = first.join().unwrap();
        let second = second.join().unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}
