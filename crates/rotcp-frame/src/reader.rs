use std::io::{ErrorKind, Read};
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use rotcp_transport::LineStream;
use tracing::{debug, trace};

use crate::checksum::ChecksumRegistry;
use crate::codec::FrameConfig;
use crate::context::FrameContext;
use crate::element::{ElementDescriptor, ElementKind};
use crate::error::{FrameError, Result};
use crate::schema::FrameSchema;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete, checksum-verified frames from any `Read` stream.
///
/// Elements are consumed in schema order. A preamble mismatch discards a
/// single byte and returns [`FrameError::SyncLost`], so calling
/// [`read_frame`](Self::read_frame) again scans forward one byte at a time
/// until the stream realigns.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    schema: Arc<FrameSchema>,
    checksums: Arc<ChecksumRegistry>,
    config: FrameConfig,
    /// Bytes already taken for the frame being read.
    partial: usize,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, schema: Arc<FrameSchema>, checksums: Arc<ChecksumRegistry>) -> Self {
        Self::with_config(inner, schema, checksums, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(
        inner: T,
        schema: Arc<FrameSchema>,
        checksums: Arc<ChecksumRegistry>,
        config: FrameConfig,
    ) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            schema,
            checksums,
            config,
            partial: 0,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached,
    /// whether or not a frame was in progress.
    pub fn read_frame(&mut self) -> Result<FrameContext> {
        let schema = Arc::clone(&self.schema);
        let mut ctx = FrameContext::with_capacity(schema.elements().len());
        self.partial = 0;

        for element in schema.elements() {
            let bytes = match element.kind() {
                ElementKind::Preamble => self.read_preamble(element)?,
                ElementKind::Payload => {
                    let frame_length = ctx.frame_length.unwrap_or(0);
                    let len = schema.payload_len(frame_length)?;
                    if len > self.config.max_payload_size {
                        return Err(FrameError::PayloadTooLarge {
                            size: len,
                            max: self.config.max_payload_size,
                        });
                    }
                    self.take(len)?
                }
                _ => self.take(element.fixed_len().unwrap_or(0))?,
            };
            trace!(element = element.name(), len = bytes.len(), "read element");

            match element.kind() {
                ElementKind::Length => ctx.frame_length = Some(header_value(element, &bytes)?),
                ElementKind::SerialNumber => {
                    ctx.serial_number = Some(header_value(element, &bytes)?)
                }
                ElementKind::EncryptionFlag => ctx.encryption_flag = header_value(element, &bytes)?,
                ElementKind::FunctionCode => ctx.function_code = header_value(element, &bytes)?,
                ElementKind::Payload => ctx.payload = bytes.clone(),
                ElementKind::Checksum => {
                    let covered = ctx.covered_bytes(schema.checksum_range());
                    let computed = self.checksums.wire_checksum(element, &covered)?;
                    if computed != bytes {
                        return Err(FrameError::ChecksumMismatch {
                            computed: computed.to_vec(),
                            received: bytes.to_vec(),
                        });
                    }
                }
                ElementKind::Preamble => {}
            }
            self.partial += bytes.len();
            ctx.push(bytes);
        }
        self.partial = 0;

        debug!(
            function_code = ctx.function_code,
            encryption_flag = ctx.encryption_flag,
            payload_len = ctx.payload.len(),
            "frame verified"
        );
        Ok(ctx)
    }

    fn read_preamble(&mut self, element: &ElementDescriptor) -> Result<Bytes> {
        let expected = element.expected_value().unwrap_or_default();
        self.fill(expected.len())?;
        let window = &self.buf[..expected.len()];
        if window != expected {
            let found = window.to_vec();
            self.buf.advance(1);
            return Err(FrameError::SyncLost {
                expected: expected.to_vec(),
                found,
            });
        }
        Ok(self.buf.split_to(expected.len()).freeze())
    }

    fn take(&mut self, len: usize) -> Result<Bytes> {
        self.fill(len)?;
        Ok(self.buf.split_to(len).freeze())
    }

    fn fill(&mut self, len: usize) -> Result<()> {
        while self.buf.len() < len {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    /// Bytes received but not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Bytes of an unfinished frame: elements already taken plus the
    /// unread buffer. Non-zero after `ConnectionClosed` means the stream
    /// ended mid-frame.
    pub fn pending(&self) -> usize {
        self.partial + self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn schema(&self) -> &FrameSchema {
        &self.schema
    }
}

impl FrameReader<LineStream> {
    /// Create a frame reader for a `LineStream` and apply read timeout from config.
    pub fn with_config_line(
        inner: LineStream,
        schema: Arc<FrameSchema>,
        checksums: Arc<ChecksumRegistry>,
        config: FrameConfig,
    ) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, schema, checksums, config))
    }
}

fn header_value(element: &ElementDescriptor, bytes: &[u8]) -> Result<u64> {
    element.codec().decode_unsigned(bytes).map_err(|source| FrameError::Decode {
        element: element.kind(),
        source,
    })
}

pub(crate) fn transport_to_frame_error(err: rotcp_transport::TransportError) -> FrameError {
    match err {
        rotcp_transport::TransportError::Io(io)
        | rotcp_transport::TransportError::Accept(io) => FrameError::Io(io),
        rotcp_transport::TransportError::Bind { source, .. }
        | rotcp_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
