use std::fmt;

use bytes::Bytes;
use rotcp_codec::{ByteOrder, Codec};

/// Structural role of an element, in protocol position order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Preamble,
    Length,
    SerialNumber,
    EncryptionFlag,
    FunctionCode,
    Payload,
    Checksum,
}

impl ElementKind {
    /// Every kind, in protocol position order.
    pub const ALL: [ElementKind; 7] = [
        ElementKind::Preamble,
        ElementKind::Length,
        ElementKind::SerialNumber,
        ElementKind::EncryptionFlag,
        ElementKind::FunctionCode,
        ElementKind::Payload,
        ElementKind::Checksum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Preamble => "preamble",
            ElementKind::Length => "length",
            ElementKind::SerialNumber => "serial_number",
            ElementKind::EncryptionFlag => "encryption_flag",
            ElementKind::FunctionCode => "function_code",
            ElementKind::Payload => "payload",
            ElementKind::Checksum => "checksum",
        }
    }

    /// Kinds whose bytes decode to an unsigned header integer.
    pub fn is_header_integer(&self) -> bool {
        matches!(
            self,
            ElementKind::Length
                | ElementKind::SerialNumber
                | ElementKind::EncryptionFlag
                | ElementKind::FunctionCode
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte count of an element on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementLength {
    Fixed(usize),
    /// Resolved per frame from the Length element. Payload only.
    Dynamic,
}

/// One positioned component of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    kind: ElementKind,
    name: String,
    byte_order: ByteOrder,
    codec: Codec,
    length: ElementLength,
    expected: Option<Bytes>,
    checksum_algorithm: Option<u8>,
    index: usize,
}

impl ElementDescriptor {
    fn fixed(kind: ElementKind, width: usize, byte_order: ByteOrder) -> Self {
        Self {
            kind,
            name: kind.as_str().to_string(),
            byte_order,
            codec: Codec::Binary(byte_order),
            length: ElementLength::Fixed(width),
            expected: None,
            checksum_algorithm: None,
            index: 0,
        }
    }

    /// Start-of-frame marker matched byte for byte.
    pub fn preamble(expected: impl Into<Bytes>) -> Self {
        let expected = expected.into();
        let mut element = Self::fixed(ElementKind::Preamble, expected.len(), ByteOrder::BigEndian);
        element.expected = Some(expected);
        element
    }

    pub fn length(width: usize, byte_order: ByteOrder) -> Self {
        Self::fixed(ElementKind::Length, width, byte_order)
    }

    pub fn serial_number(width: usize, byte_order: ByteOrder) -> Self {
        Self::fixed(ElementKind::SerialNumber, width, byte_order)
    }

    pub fn encryption_flag(width: usize, byte_order: ByteOrder) -> Self {
        Self::fixed(ElementKind::EncryptionFlag, width, byte_order)
    }

    pub fn function_code(width: usize, byte_order: ByteOrder) -> Self {
        Self::fixed(ElementKind::FunctionCode, width, byte_order)
    }

    pub fn payload() -> Self {
        Self {
            length: ElementLength::Dynamic,
            ..Self::fixed(ElementKind::Payload, 0, ByteOrder::BigEndian)
        }
    }

    /// Checksum of `width` bytes computed by algorithm `algorithm`.
    ///
    /// `byte_order` decides how the algorithm's value is laid out on the wire.
    pub fn checksum(width: usize, algorithm: u8, byte_order: ByteOrder) -> Self {
        let mut element = Self::fixed(ElementKind::Checksum, width, byte_order);
        element.checksum_algorithm = Some(algorithm);
        element
    }

    /// Override the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Carry a header integer as packed decimal instead of plain binary.
    pub fn bcd(mut self) -> Self {
        self.codec = Codec::Bcd(self.byte_order);
        self
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// How a header integer is laid out. Binary unless [`bcd`](Self::bcd)
    /// was applied.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn length_kind(&self) -> ElementLength {
        self.length
    }

    /// Fixed width, or `None` for the payload.
    pub fn fixed_len(&self) -> Option<usize> {
        match self.length {
            ElementLength::Fixed(n) => Some(n),
            ElementLength::Dynamic => None,
        }
    }

    /// Expected bytes of a preamble.
    pub fn expected_value(&self) -> Option<&[u8]> {
        self.expected.as_deref()
    }

    pub fn checksum_algorithm(&self) -> Option<u8> {
        self.checksum_algorithm
    }

    /// 0-based position within the schema.
    pub fn index(&self) -> usize {
        self.index
    }
}
