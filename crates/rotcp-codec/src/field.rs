use bytes::Bytes;

use crate::codec::Codec;
use crate::error::{CodecError, Result};
use crate::interpret::Interpretation;
use crate::value::{ExplainedValue, ParsedValue};

/// A named, fixed-length field: codec plus interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    codec: Codec,
    interpretation: Interpretation,
    byte_length: usize,
}

impl FieldSpec {
    /// Build a field, validating the width against the codec and the
    /// interpretation against both.
    pub fn new(
        name: impl Into<String>,
        codec: Codec,
        interpretation: Interpretation,
        byte_length: usize,
    ) -> Result<Self> {
        codec.check_length(byte_length)?;
        interpretation.check_compatible(&codec)?;
        Ok(Self {
            name: name.into(),
            codec,
            interpretation,
            byte_length,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn interpretation(&self) -> &Interpretation {
        &self.interpretation
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Decode exactly `byte_length` bytes. The slice is kept in the result
    /// without copying.
    pub fn decode(&self, bytes: Bytes) -> Result<ParsedValue> {
        if bytes.len() != self.byte_length {
            return Err(CodecError::LengthMismatch {
                expected: self.byte_length,
                actual: bytes.len(),
            });
        }
        let raw_value = self.codec.decode(&bytes)?;
        let explained = self.interpretation.explain(&raw_value)?;
        Ok(ParsedValue {
            raw_bytes: bytes,
            raw_value,
            explained,
        })
    }

    /// Encode a business value into exactly `byte_length` bytes.
    pub fn encode(&self, value: &ExplainedValue) -> Result<Vec<u8>> {
        let raw = self.interpretation.unexplain(value)?;
        self.codec.encode(&raw, self.byte_length)
    }
}
