use crate::error::{CodecError, Result};
use crate::value::RawValue;

/// Byte widths accepted by the binary integer codec.
pub const INTEGER_WIDTHS: [usize; 5] = [1, 2, 3, 4, 8];

/// Order of bytes for multi-byte values on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Converts a fixed-length byte slice into a [`RawValue`] and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Two's complement signed integer.
    Binary(ByteOrder),
    /// Packed decimal; decodes to a digit string, two digits per byte.
    Bcd(ByteOrder),
    /// Fixed-width text, padded with trailing spaces on encode and trimmed
    /// of them on decode.
    Ascii,
}

impl Codec {
    /// Name used in definition files and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Binary(_) => "bin",
            Codec::Bcd(_) => "bcd",
            Codec::Ascii => "ascii",
        }
    }

    /// Check that the codec can represent `len` bytes.
    pub fn check_length(&self, len: usize) -> Result<()> {
        match self {
            Codec::Binary(_) if !INTEGER_WIDTHS.contains(&len) => {
                Err(CodecError::UnsupportedLength { len })
            }
            _ if len == 0 => Err(CodecError::UnsupportedLength { len }),
            _ => Ok(()),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<RawValue> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        match *self {
            Codec::Binary(order) => decode_int(bytes, order).map(RawValue::Int),
            Codec::Bcd(order) => decode_bcd(bytes, order).map(RawValue::Str),
            Codec::Ascii => std::str::from_utf8(bytes)
                .map(|s| RawValue::Str(s.trim_end_matches(' ').to_owned()))
                .map_err(|_| CodecError::InvalidText),
        }
    }

    /// Encode `value` into exactly `len` bytes.
    pub fn encode(&self, value: &RawValue, len: usize) -> Result<Vec<u8>> {
        self.check_length(len)?;
        match (*self, value) {
            (Codec::Binary(order), RawValue::Int(v)) => encode_int(*v, len, order),
            (Codec::Bcd(order), RawValue::Str(digits)) => encode_bcd(digits, len, order),
            (Codec::Bcd(order), RawValue::Int(v)) => {
                if *v < 0 {
                    return Err(CodecError::OutOfRange {
                        value: v.to_string(),
                        len,
                    });
                }
                encode_bcd(&format!("{:0width$}", v, width = len * 2), len, order)
            }
            (Codec::Ascii, RawValue::Str(s)) => encode_ascii(s, len),
            (Codec::Binary(_), other) => Err(CodecError::TypeMismatch {
                expected: "integer",
                found: other.kind(),
            }),
            (Codec::Bcd(_), other) => Err(CodecError::TypeMismatch {
                expected: "integer or digit string",
                found: other.kind(),
            }),
            (Codec::Ascii, other) => Err(CodecError::TypeMismatch {
                expected: "string",
                found: other.kind(),
            }),
        }
    }

    /// Decode a frame header integer of 1 to 8 bytes. Binary bytes are read
    /// as unsigned, BCD bytes as decimal digits.
    pub fn decode_unsigned(&self, bytes: &[u8]) -> Result<u64> {
        match *self {
            Codec::Binary(order) => decode_uint(bytes, order),
            Codec::Bcd(order) => {
                check_header_len(bytes.len())?;
                decode_bcd(bytes, order)?
                    .parse::<u64>()
                    .map_err(|_| CodecError::Overflow)
            }
            Codec::Ascii => Err(CodecError::Incompatible(
                "ascii codec cannot carry a header integer".into(),
            )),
        }
    }

    /// Encode a frame header integer into exactly `len` bytes (1 to 8).
    pub fn encode_unsigned(&self, v: u64, len: usize) -> Result<Vec<u8>> {
        match *self {
            Codec::Binary(order) => encode_uint(v, len, order),
            Codec::Bcd(order) => {
                check_header_len(len)?;
                encode_bcd(&format!("{:0width$}", v, width = len * 2), len, order)
            }
            Codec::Ascii => Err(CodecError::Incompatible(
                "ascii codec cannot carry a header integer".into(),
            )),
        }
    }
}

/// Reorder `bytes` into big-endian position within an 8-byte buffer's tail.
fn to_be_buffer(bytes: &[u8], order: ByteOrder, fill: u8) -> [u8; 8] {
    let n = bytes.len();
    let mut out = [fill; 8];
    for (i, b) in bytes.iter().enumerate() {
        let pos = match order {
            ByteOrder::BigEndian => i,
            ByteOrder::LittleEndian => n - 1 - i,
        };
        out[8 - n + pos] = *b;
    }
    out
}

fn decode_int(bytes: &[u8], order: ByteOrder) -> Result<i64> {
    let n = bytes.len();
    if !INTEGER_WIDTHS.contains(&n) {
        return Err(CodecError::UnsupportedLength { len: n });
    }
    let msb = match order {
        ByteOrder::BigEndian => bytes[0],
        ByteOrder::LittleEndian => bytes[n - 1],
    };
    let fill = if msb & 0x80 != 0 { 0xFF } else { 0x00 };
    Ok(i64::from_be_bytes(to_be_buffer(bytes, order, fill)))
}

fn encode_int(v: i64, len: usize, order: ByteOrder) -> Result<Vec<u8>> {
    if len < 8 {
        let bits = len * 8;
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if v < min || v > max {
            return Err(CodecError::OutOfRange {
                value: v.to_string(),
                len,
            });
        }
    }
    let mut out = v.to_be_bytes()[8 - len..].to_vec();
    if order == ByteOrder::LittleEndian {
        out.reverse();
    }
    Ok(out)
}

/// Decode an unsigned integer of 1 to 8 bytes. Used for header elements.
pub fn decode_uint(bytes: &[u8], order: ByteOrder) -> Result<u64> {
    match bytes.len() {
        0 => Err(CodecError::Empty),
        n if n > 8 => Err(CodecError::UnsupportedLength { len: n }),
        _ => Ok(u64::from_be_bytes(to_be_buffer(bytes, order, 0))),
    }
}

/// Encode an unsigned integer into exactly `len` bytes (1 to 8).
pub fn encode_uint(v: u64, len: usize, order: ByteOrder) -> Result<Vec<u8>> {
    if len == 0 || len > 8 {
        return Err(CodecError::UnsupportedLength { len });
    }
    if len < 8 && v >> (len * 8) != 0 {
        return Err(CodecError::OutOfRange {
            value: v.to_string(),
            len,
        });
    }
    let mut out = v.to_be_bytes()[8 - len..].to_vec();
    if order == ByteOrder::LittleEndian {
        out.reverse();
    }
    Ok(out)
}

fn check_header_len(len: usize) -> Result<()> {
    match len {
        0 => Err(CodecError::Empty),
        n if n > 8 => Err(CodecError::UnsupportedLength { len: n }),
        _ => Ok(()),
    }
}

fn push_bcd_digits(out: &mut String, byte: u8) -> Result<()> {
    for nibble in [byte >> 4, byte & 0x0F] {
        if nibble > 9 {
            return Err(CodecError::InvalidBcd { byte });
        }
        out.push(char::from(b'0' + nibble));
    }
    Ok(())
}

fn decode_bcd(bytes: &[u8], order: ByteOrder) -> Result<String> {
    let mut digits = String::with_capacity(bytes.len() * 2);
    match order {
        ByteOrder::BigEndian => {
            for b in bytes {
                push_bcd_digits(&mut digits, *b)?;
            }
        }
        ByteOrder::LittleEndian => {
            for b in bytes.iter().rev() {
                push_bcd_digits(&mut digits, *b)?;
            }
        }
    }
    Ok(digits)
}

/// Pack an even-length digit string, left-padding with zero bytes up to `len`.
fn encode_bcd(digits: &str, len: usize, order: ByteOrder) -> Result<Vec<u8>> {
    if let Some(ch) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(CodecError::InvalidDigit { ch });
    }
    if digits.len() % 2 != 0 {
        return Err(CodecError::OddDigits { len: digits.len() });
    }
    let needed = digits.len() / 2;
    if needed > len {
        return Err(CodecError::OutOfRange {
            value: digits.to_owned(),
            len,
        });
    }

    let mut out = vec![0u8; len - needed];
    out.extend(
        digits
            .as_bytes()
            .chunks_exact(2)
            .map(|pair| ((pair[0] - b'0') << 4) | (pair[1] - b'0')),
    );
    if order == ByteOrder::LittleEndian {
        out.reverse();
    }
    Ok(out)
}

/// Truncate or right-pad with spaces to `len` bytes.
fn encode_ascii(s: &str, len: usize) -> Result<Vec<u8>> {
    if !s.is_ascii() {
        return Err(CodecError::InvalidText);
    }
    let mut out: Vec<u8> = s.bytes().take(len).collect();
    out.resize(len, b' ');
    Ok(out)
}
