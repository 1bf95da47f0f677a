use std::collections::BTreeMap;

use crate::codec::Codec;
use crate::error::{CodecError, Result};
use crate::value::{ExplainedValue, RawValue};

/// Linear transform applied to a raw numeric value.
///
/// With `multiply_first` the result is `raw * multiple + offset`,
/// otherwise `(raw + offset) * multiple`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine<T> {
    pub multiply_first: bool,
    pub multiple: T,
    pub offset: T,
}

impl Default for Affine<i64> {
    fn default() -> Self {
        Self {
            multiply_first: true,
            multiple: 1,
            offset: 0,
        }
    }
}

impl Default for Affine<f64> {
    fn default() -> Self {
        Self {
            multiply_first: true,
            multiple: 1.0,
            offset: 0.0,
        }
    }
}

impl Affine<i64> {
    fn apply(&self, raw: i64) -> Result<i64> {
        let out = if self.multiply_first {
            raw.checked_mul(self.multiple)
                .and_then(|v| v.checked_add(self.offset))
        } else {
            raw.checked_add(self.offset)
                .and_then(|v| v.checked_mul(self.multiple))
        };
        out.ok_or(CodecError::Overflow)
    }

    fn invert(&self, value: i64) -> Result<i64> {
        if self.multiple == 0 {
            return Err(CodecError::NotInvertible);
        }
        let scaled = if self.multiply_first {
            value.checked_sub(self.offset).ok_or(CodecError::Overflow)?
        } else {
            value
        };
        if scaled.checked_rem(self.multiple).ok_or(CodecError::Overflow)? != 0 {
            return Err(CodecError::OffGrid {
                value,
                multiple: self.multiple,
            });
        }
        let quotient = scaled.checked_div(self.multiple).ok_or(CodecError::Overflow)?;
        if self.multiply_first {
            Ok(quotient)
        } else {
            quotient.checked_sub(self.offset).ok_or(CodecError::Overflow)
        }
    }
}

impl Affine<f64> {
    fn apply(&self, raw: f64) -> f64 {
        if self.multiply_first {
            raw * self.multiple + self.offset
        } else {
            (raw + self.offset) * self.multiple
        }
    }

    fn invert(&self, value: f64) -> Result<f64> {
        if self.multiple == 0.0 {
            return Err(CodecError::NotInvertible);
        }
        Ok(if self.multiply_first {
            (value - self.offset) / self.multiple
        } else {
            value / self.multiple - self.offset
        })
    }
}

/// How the raw value is scaled before any lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    Integer(Affine<i64>),
    Float(Affine<f64>),
    /// Raw string passes through unchanged.
    Text,
}

/// Maps an integer onto labels.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// One label per value; `other` covers values with no entry.
    Enum {
        labels: BTreeMap<i64, String>,
        other: String,
    },
    /// One label per bit index; every set bit with a label is reported.
    Bitmap(BTreeMap<u32, String>),
}

/// Raw value to business value transformation for a field.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    scale: Scale,
    lookup: Option<Lookup>,
}

impl Default for Interpretation {
    fn default() -> Self {
        Self::integer(Affine::default())
    }
}

impl Interpretation {
    pub fn integer(affine: Affine<i64>) -> Self {
        Self {
            scale: Scale::Integer(affine),
            lookup: None,
        }
    }

    pub fn float(affine: Affine<f64>) -> Self {
        Self {
            scale: Scale::Float(affine),
            lookup: None,
        }
    }

    pub fn text() -> Self {
        Self {
            scale: Scale::Text,
            lookup: None,
        }
    }

    /// Attach an enum lookup. Replaces any previous lookup.
    pub fn with_enum<L: Into<String>>(
        mut self,
        other: impl Into<String>,
        labels: impl IntoIterator<Item = (i64, L)>,
    ) -> Self {
        self.lookup = Some(Lookup::Enum {
            labels: labels.into_iter().map(|(k, v)| (k, v.into())).collect(),
            other: other.into(),
        });
        self
    }

    /// Attach a bitmap lookup. Replaces any previous lookup.
    pub fn with_bitmap<L: Into<String>>(mut self, bits: impl IntoIterator<Item = (u32, L)>) -> Self {
        self.lookup = Some(Lookup::Bitmap(
            bits.into_iter().map(|(k, v)| (k, v.into())).collect(),
        ));
        self
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    pub fn lookup(&self) -> Option<&Lookup> {
        self.lookup.as_ref()
    }

    /// Reject combinations that cannot produce a value, such as an
    /// arithmetic scale over ASCII text.
    pub fn check_compatible(&self, codec: &Codec) -> Result<()> {
        match (codec, &self.scale) {
            (Codec::Ascii, Scale::Integer(_) | Scale::Float(_)) => {
                return Err(CodecError::Incompatible(
                    "ascii codec only supports string interpretation".into(),
                ));
            }
            (Codec::Binary(_), Scale::Text) => {
                return Err(CodecError::Incompatible(
                    "bin codec does not support string interpretation".into(),
                ));
            }
            _ => {}
        }
        match (&self.lookup, &self.scale) {
            (Some(_), Scale::Float(_) | Scale::Text) => Err(CodecError::Incompatible(
                "enum and bitmap lookups require integer interpretation".into(),
            )),
            (Some(Lookup::Bitmap(bits)), _) if bits.keys().any(|bit| *bit >= 64) => Err(
                CodecError::Incompatible("bitmap bit index must be below 64".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Raw value to business value.
    pub fn explain(&self, raw: &RawValue) -> Result<ExplainedValue> {
        let scaled = match (&self.scale, raw) {
            (Scale::Integer(a), RawValue::Int(v)) => ExplainedValue::Int(a.apply(*v)?),
            (Scale::Integer(a), RawValue::Str(digits)) => {
                ExplainedValue::Int(a.apply(parse_digits(digits)?)?)
            }
            (Scale::Float(a), RawValue::Int(v)) => ExplainedValue::Float(a.apply(*v as f64)),
            (Scale::Float(a), RawValue::Float(v)) => ExplainedValue::Float(a.apply(*v)),
            (Scale::Float(a), RawValue::Str(digits)) => {
                ExplainedValue::Float(a.apply(parse_digits(digits)? as f64))
            }
            (Scale::Text, RawValue::Str(s)) => ExplainedValue::Str(s.clone()),
            (Scale::Integer(_), other) => return Err(mismatch("integer", other.kind())),
            (Scale::Text, other) => return Err(mismatch("string", other.kind())),
        };

        match (&self.lookup, scaled) {
            (None, value) => Ok(value),
            (Some(Lookup::Enum { labels, other }), ExplainedValue::Int(v)) => Ok(
                ExplainedValue::Enum(labels.get(&v).unwrap_or(other).clone()),
            ),
            (Some(Lookup::Bitmap(bits)), ExplainedValue::Int(v)) => {
                let word = v as u64;
                Ok(ExplainedValue::Bitmap(
                    bits.iter()
                        .filter(|(bit, _)| **bit < 64 && (word >> **bit) & 1 == 1)
                        .map(|(_, label)| label.clone())
                        .collect(),
                ))
            }
            (Some(_), value) => Err(mismatch("integer", value.kind())),
        }
    }

    /// Business value back to a raw value suitable for the codec.
    pub fn unexplain(&self, value: &ExplainedValue) -> Result<RawValue> {
        let scaled = match (&self.lookup, value) {
            (Some(Lookup::Enum { labels, .. }), ExplainedValue::Enum(label)) => labels
                .iter()
                .find(|(_, l)| *l == label)
                .map(|(k, _)| ExplainedValue::Int(*k))
                .ok_or_else(|| CodecError::UnknownLabel(label.clone()))?,
            (Some(Lookup::Bitmap(bits)), ExplainedValue::Bitmap(labels)) => {
                let mut word = 0u64;
                for label in labels {
                    let bit = bits
                        .iter()
                        .find(|(_, l)| *l == label)
                        .map(|(bit, _)| *bit)
                        .ok_or_else(|| CodecError::UnknownLabel(label.clone()))?;
                    word |= 1u64.checked_shl(bit).ok_or(CodecError::Overflow)?;
                }
                ExplainedValue::Int(word as i64)
            }
            (_, ExplainedValue::Enum(_)) => return Err(mismatch("enum lookup", "enum")),
            (_, ExplainedValue::Bitmap(_)) => return Err(mismatch("bitmap lookup", "bitmap")),
            (_, other) => other.clone(),
        };

        match (&self.scale, scaled) {
            (Scale::Integer(a), ExplainedValue::Int(v)) => Ok(RawValue::Int(a.invert(v)?)),
            (Scale::Float(a), ExplainedValue::Float(v)) => float_to_raw(a.invert(v)?),
            (Scale::Float(a), ExplainedValue::Int(v)) => float_to_raw(a.invert(v as f64)?),
            (Scale::Text, ExplainedValue::Str(s)) => Ok(RawValue::Str(s)),
            (Scale::Integer(_), other) => Err(mismatch("integer", other.kind())),
            (Scale::Float(_), other) => Err(mismatch("float", other.kind())),
            (Scale::Text, other) => Err(mismatch("string", other.kind())),
        }
    }
}

fn mismatch(expected: &'static str, found: &'static str) -> CodecError {
    CodecError::TypeMismatch { expected, found }
}

fn parse_digits(digits: &str) -> Result<i64> {
    if let Some(ch) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(CodecError::InvalidDigit { ch });
    }
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse::<i64>().map_err(|_| CodecError::Overflow)
}

// Raw values are integral on the wire; round the inverse to the nearest step.
fn float_to_raw(v: f64) -> Result<RawValue> {
    let rounded = v.round();
    if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return Err(CodecError::Overflow);
    }
    Ok(RawValue::Int(rounded as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteOrder;

    fn scaled(multiply_first: bool, multiple: i64, offset: i64) -> Interpretation {
        Interpretation::integer(Affine {
            multiply_first,
            multiple,
            offset,
        })
    }

    #[test]
    fn affine_order_matters() {
        let raw = RawValue::Int(10);
        assert_eq!(
            scaled(true, 2, 3).explain(&raw).expect("explain should succeed"),
            ExplainedValue::Int(23)
        );
        assert_eq!(
            scaled(false, 2, 3).explain(&raw).expect("explain should succeed"),
            ExplainedValue::Int(26)
        );
    }

    #[test]
    fn float_scale_of_integer_raw() {
        let interp = Interpretation::float(Affine {
            multiply_first: true,
            multiple: 0.01,
            offset: 0.0,
        });
        let ExplainedValue::Float(v) = interp
            .explain(&RawValue::Int(4660))
            .expect("explain should succeed")
        else {
            panic!("expected float");
        };
        assert!((v - 46.60).abs() < 1e-9);
    }

    #[test]
    fn bcd_digits_feed_numeric_scales() {
        let interp = Interpretation::float(Affine {
            multiply_first: true,
            multiple: 0.0001,
            offset: 0.0,
        });
        let ExplainedValue::Float(v) = interp
            .explain(&RawValue::Str("00123456".into()))
            .expect("explain should succeed")
        else {
            panic!("expected float");
        };
        assert!((v - 12.3456).abs() < 1e-9);
        assert_eq!(
            Interpretation::default()
                .explain(&RawValue::Str("0042".into()))
                .expect("explain should succeed"),
            ExplainedValue::Int(42)
        );
    }

    #[test]
    fn integer_overflow_is_reported() {
        assert_eq!(
            scaled(true, 2, 0).explain(&RawValue::Int(i64::MAX)),
            Err(CodecError::Overflow)
        );
    }

    #[test]
    fn enum_falls_back_to_other() {
        let interp = Interpretation::default().with_enum("Other", [(0, "A"), (1, "B"), (2, "C")]);
        assert_eq!(
            interp.explain(&RawValue::Int(1)).expect("explain should succeed"),
            ExplainedValue::Enum("B".into())
        );
        assert_eq!(
            interp.explain(&RawValue::Int(7)).expect("explain should succeed"),
            ExplainedValue::Enum("Other".into())
        );
    }

    #[test]
    fn bitmap_reports_set_bits_low_first() {
        let interp = Interpretation::default().with_bitmap([(3, "door"), (0, "power"), (5, "fan")]);
        assert_eq!(
            interp
                .explain(&RawValue::Int(0b0000_1001))
                .expect("explain should succeed"),
            ExplainedValue::Bitmap(vec!["power".into(), "door".into()])
        );
        assert_eq!(
            interp
                .unexplain(&ExplainedValue::Bitmap(vec!["fan".into(), "power".into()]))
                .expect("unexplain should succeed"),
            RawValue::Int(0b0010_0001)
        );
    }

    #[test]
    fn unexplain_inverts_affine() {
        assert_eq!(
            scaled(true, 2, 3)
                .unexplain(&ExplainedValue::Int(23))
                .expect("unexplain should succeed"),
            RawValue::Int(10)
        );
        assert_eq!(
            scaled(false, 2, 3)
                .unexplain(&ExplainedValue::Int(26))
                .expect("unexplain should succeed"),
            RawValue::Int(10)
        );
        let price = Interpretation::float(Affine {
            multiply_first: true,
            multiple: 0.01,
            offset: 0.0,
        });
        assert_eq!(
            price
                .unexplain(&ExplainedValue::Float(46.6))
                .expect("unexplain should succeed"),
            RawValue::Int(4660)
        );
        assert_eq!(
            scaled(true, 0, 0).unexplain(&ExplainedValue::Int(1)),
            Err(CodecError::NotInvertible)
        );
    }

    #[test]
    fn unexplain_rejects_off_grid_values() {
        assert_eq!(
            scaled(true, 2, 0).unexplain(&ExplainedValue::Int(27)),
            Err(CodecError::OffGrid {
                value: 27,
                multiple: 2
            })
        );
        assert_eq!(
            scaled(true, 2, 3).unexplain(&ExplainedValue::Int(24)),
            Err(CodecError::OffGrid {
                value: 24,
                multiple: 2
            })
        );
        assert_eq!(
            scaled(false, 2, 3).unexplain(&ExplainedValue::Int(25)),
            Err(CodecError::OffGrid {
                value: 25,
                multiple: 2
            })
        );
        assert_eq!(
            scaled(false, -2, 0)
                .unexplain(&ExplainedValue::Int(-8))
                .expect("unexplain should succeed"),
            RawValue::Int(4)
        );
    }

    #[test]
    fn unexplain_enum_label() {
        let interp = Interpretation::default().with_enum("Other", [(0, "A"), (2, "C")]);
        assert_eq!(
            interp
                .unexplain(&ExplainedValue::Enum("C".into()))
                .expect("unexplain should succeed"),
            RawValue::Int(2)
        );
        assert_eq!(
            interp.unexplain(&ExplainedValue::Enum("Other".into())),
            Err(CodecError::UnknownLabel("Other".into()))
        );
    }

    #[test]
    fn incompatible_combinations_rejected() {
        assert!(Interpretation::default()
            .check_compatible(&Codec::Ascii)
            .is_err());
        assert!(Interpretation::text()
            .check_compatible(&Codec::Binary(ByteOrder::BigEndian))
            .is_err());
        assert!(Interpretation::float(Affine::default())
            .with_enum("x", [(0, "a")])
            .check_compatible(&Codec::Binary(ByteOrder::BigEndian))
            .is_err());
        assert!(Interpretation::default()
            .with_bitmap([(64, "high")])
            .check_compatible(&Codec::Binary(ByteOrder::BigEndian))
            .is_err());
        assert!(Interpretation::text()
            .check_compatible(&Codec::Bcd(ByteOrder::BigEndian))
            .is_ok());
    }
}
