use std::ops::Range;

use bytes::Bytes;

/// One frame as read off the wire, element by element.
///
/// Populated by [`FrameReader`](crate::FrameReader) in schema order and
/// returned once the checksum has been verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameContext {
    elements: Vec<Bytes>,
    /// Decoded Length element.
    pub frame_length: Option<u64>,
    /// Decoded SerialNumber element, when the schema has one.
    pub serial_number: Option<u64>,
    /// Decoded EncryptionFlag element; 0 when the schema has none.
    pub encryption_flag: u64,
    pub function_code: u64,
    /// Payload bytes as received (still encrypted).
    pub payload: Bytes,
}

impl FrameContext {
    pub fn with_capacity(elements: usize) -> Self {
        Self {
            elements: Vec::with_capacity(elements),
            ..Self::default()
        }
    }

    pub(crate) fn push(&mut self, bytes: Bytes) {
        self.elements.push(bytes);
    }

    /// Raw bytes of every element read so far, in schema order.
    pub fn elements(&self) -> &[Bytes] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> Option<&Bytes> {
        self.elements.get(index)
    }

    /// Concatenated bytes of the elements in `range`.
    pub fn covered_bytes(&self, range: Range<usize>) -> Vec<u8> {
        self.elements
            .get(range)
            .unwrap_or_default()
            .iter()
            .flat_map(|b| b.iter().copied())
            .collect()
    }

    /// The whole frame as it appeared on the wire.
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.covered_bytes(0..self.elements.len())
    }
}
