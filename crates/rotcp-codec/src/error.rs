/// Errors raised while converting between bytes and field values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// Decode was handed no bytes at all.
    #[error("empty input")]
    Empty,

    /// The byte width is not one the codec can represent.
    #[error("unsupported byte length {len}")]
    UnsupportedLength { len: usize },

    /// A slice did not have the length its field declares.
    #[error("expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A BCD byte carried a nibble above 9.
    #[error("invalid BCD byte {byte:#04x}")]
    InvalidBcd { byte: u8 },

    /// A digit string contained something other than `0-9`.
    #[error("invalid decimal digit {ch:?}")]
    InvalidDigit { ch: char },

    /// BCD packs two digits per byte; an odd count cannot be packed.
    #[error("odd digit count {len} for BCD encoding")]
    OddDigits { len: usize },

    /// The value needs more bytes than the field provides.
    #[error("value {value} does not fit in {len} bytes")]
    OutOfRange { value: String, len: usize },

    /// ASCII bytes were not valid text, or text was not ASCII.
    #[error("invalid ASCII text")]
    InvalidText,

    /// The value variant does not match what the codec or interpretation handles.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Integer arithmetic in the affine transform overflowed.
    #[error("arithmetic overflow applying interpretation")]
    Overflow,

    /// The affine transform cannot be inverted (zero multiple).
    #[error("interpretation with multiple 0 cannot be inverted")]
    NotInvertible,

    /// An integer does not land on the interpretation's grid, so no raw
    /// value maps onto it.
    #[error("value {value} is not reachable with multiple {multiple}")]
    OffGrid { value: i64, multiple: i64 },

    /// An enum or bitmap label has no key.
    #[error("unknown label {0:?}")]
    UnknownLabel(String),

    /// Codec and interpretation cannot be combined.
    #[error("incompatible field definition: {0}")]
    Incompatible(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
