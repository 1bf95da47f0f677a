use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::ChecksumRegistry;
use crate::element::ElementKind;
use crate::error::{FrameError, Result};
use crate::schema::FrameSchema;

/// Default maximum payload size: 64 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Header values and payload of a frame to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub function_code: u64,
    /// Ignored when the schema has no EncryptionFlag element.
    pub encryption_flag: u64,
    /// Ignored when the schema has no SerialNumber element.
    pub serial_number: u64,
    /// Payload bytes, already encrypted.
    pub payload: Bytes,
}

impl OutgoingFrame {
    pub fn new(function_code: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            function_code,
            payload: payload.into(),
            ..Self::default()
        }
    }
}

/// Encode a frame laid out by `schema` into `dst`.
///
/// The Length value is derived from the payload size per the schema's
/// [`LengthCoverage`](crate::LengthCoverage); the checksum covers the same
/// element range the reader verifies.
pub fn encode_frame(
    schema: &FrameSchema,
    checksums: &ChecksumRegistry,
    frame: &OutgoingFrame,
    dst: &mut BytesMut,
) -> Result<()> {
    let mut parts: Vec<Bytes> = Vec::with_capacity(schema.elements().len());
    for element in schema.elements() {
        let kind = element.kind();
        let width = element.fixed_len().unwrap_or(0);
        let header = |value: u64| {
            element
                .codec()
                .encode_unsigned(value, width)
                .map(Bytes::from)
                .map_err(|source| FrameError::Decode {
                    element: kind,
                    source,
                })
        };
        let bytes = match kind {
            ElementKind::Preamble => {
                Bytes::copy_from_slice(element.expected_value().unwrap_or_default())
            }
            ElementKind::Length => header(schema.length_value(frame.payload.len()))?,
            ElementKind::SerialNumber => header(frame.serial_number)?,
            ElementKind::EncryptionFlag => header(frame.encryption_flag)?,
            ElementKind::FunctionCode => header(frame.function_code)?,
            ElementKind::Payload => frame.payload.clone(),
            ElementKind::Checksum => {
                let covered: Vec<u8> = parts
                    .get(schema.checksum_range())
                    .unwrap_or_default()
                    .iter()
                    .flat_map(|b| b.iter().copied())
                    .collect();
                checksums.wire_checksum(element, &covered)?
            }
        };
        parts.push(bytes);
    }

    dst.reserve(parts.iter().map(Bytes::len).sum());
    for part in &parts {
        dst.put_slice(part);
    }
    Ok(())
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 64 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
