use std::io::{ErrorKind, Write};
use std::sync::Arc;

use bytes::BytesMut;
use rotcp_transport::LineStream;
use tracing::trace;

use crate::checksum::ChecksumRegistry;
use crate::codec::{encode_frame, FrameConfig, OutgoingFrame};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;
use crate::schema::FrameSchema;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    schema: Arc<FrameSchema>,
    checksums: Arc<ChecksumRegistry>,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T, schema: Arc<FrameSchema>, checksums: Arc<ChecksumRegistry>) -> Self {
        Self::with_config(inner, schema, checksums, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
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
        }
    }

    /// Encode and write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &OutgoingFrame) -> Result<()> {
        if frame.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(&self.schema, &self.checksums, frame, &mut self.buf)?;
        trace!(
            function_code = frame.function_code,
            len = self.buf.len(),
            "writing frame"
        );

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameWriter<LineStream> {
    /// Create a frame writer for a `LineStream` and apply write timeout from config.
    pub fn with_config_line(
        inner: LineStream,
        schema: Arc<FrameSchema>,
        checksums: Arc<ChecksumRegistry>,
        config: FrameConfig,
    ) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, schema, checksums, config))
    }
}
