use std::fmt;

use bytes::Bytes;

/// Primitive value produced by a [`Codec`](crate::Codec).
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl RawValue {
    /// Short name of the variant, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Int(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Int(v) => write!(f, "{v}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Str(s) => f.write_str(s),
        }
    }
}

/// Business value produced by an [`Interpretation`](crate::Interpretation).
#[derive(Debug, Clone, PartialEq)]
pub enum ExplainedValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// Label selected by an enum lookup.
    Enum(String),
    /// Labels of the set bits, low bit first.
    Bitmap(Vec<String>),
}

impl ExplainedValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ExplainedValue::Int(_) => "integer",
            ExplainedValue::Float(_) => "float",
            ExplainedValue::Str(_) => "string",
            ExplainedValue::Enum(_) => "enum",
            ExplainedValue::Bitmap(_) => "bitmap",
        }
    }
}

impl fmt::Display for ExplainedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplainedValue::Int(v) => write!(f, "{v}"),
            ExplainedValue::Float(v) => write!(f, "{v}"),
            ExplainedValue::Str(s) | ExplainedValue::Enum(s) => f.write_str(s),
            ExplainedValue::Bitmap(labels) => write!(f, "[{}]", labels.join(", ")),
        }
    }
}

/// A decoded field: the original bytes, the codec output and the
/// interpreted value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    /// Slice of the payload this field was decoded from.
    pub raw_bytes: Bytes,
    pub raw_value: RawValue,
    pub explained: ExplainedValue,
}
