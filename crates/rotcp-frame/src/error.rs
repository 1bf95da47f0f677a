use rotcp_codec::CodecError;

use crate::element::ElementKind;

/// Errors that can occur while reading, validating or encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The preamble bytes did not match. One byte has been discarded.
    #[error("preamble mismatch (expected {expected:02x?}, found {found:02x?})")]
    SyncLost { expected: Vec<u8>, found: Vec<u8> },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header element could not be decoded or encoded.
    #[error("{element} element: {source}")]
    Decode {
        element: ElementKind,
        #[source]
        source: CodecError,
    },

    /// The frame is structurally inconsistent with the schema.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The received checksum does not match the computed one.
    #[error("checksum mismatch (computed {computed:02x?}, received {received:02x?})")]
    ChecksumMismatch { computed: Vec<u8>, received: Vec<u8> },

    /// No checksum algorithm is registered under this id.
    #[error("unknown checksum algorithm {0}")]
    UnknownChecksum(u8),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

impl FrameError {
    /// Whether the underlying connection can no longer deliver frames.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, FrameError::ConnectionClosed | FrameError::Io(_))
    }
}

/// Errors raised when a schema violates structural rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema has no elements")]
    Empty,

    #[error("first element must be the preamble, found {0}")]
    PreambleNotFirst(ElementKind),

    #[error("last element must be the checksum, found {0}")]
    ChecksumNotLast(ElementKind),

    #[error("element {0} appears more than once")]
    Duplicate(ElementKind),

    #[error("schema requires a {0} element")]
    Missing(ElementKind),

    #[error("length element must precede the payload")]
    LengthAfterPayload,

    #[error("preamble must have at least one expected byte")]
    EmptyPreamble,

    #[error("{kind} element has invalid width {width}")]
    InvalidWidth { kind: ElementKind, width: usize },

    #[error("{kind} element cannot use the {codec} codec")]
    UnsupportedCodec { kind: ElementKind, codec: &'static str },
}

pub type Result<T> = std::result::Result<T, FrameError>;
