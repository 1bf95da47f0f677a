//! Field codecs and value interpretation.
//!
//! Turning a byte range into a business value happens in two steps:
//!
//! 1. a [`Codec`] converts the fixed-length slice into a primitive
//!    [`RawValue`] (plain binary integer, BCD digit string, ASCII text);
//! 2. an [`Interpretation`] turns the raw value into an [`ExplainedValue`]
//!    through an affine transform and an optional enum or bitmap lookup.
//!
//! A [`FieldSpec`] names a byte range and pairs the two. It is the unit used
//! both for frame header elements and for application payload fields.

pub mod codec;
pub mod error;
pub mod field;
pub mod interpret;
pub mod value;

pub use codec::{decode_uint, encode_uint, ByteOrder, Codec, INTEGER_WIDTHS};
pub use error::{CodecError, Result};
pub use field::FieldSpec;
pub use interpret::{Affine, Interpretation, Lookup, Scale};
pub use value::{ExplainedValue, ParsedValue, RawValue};
