//! JSON protocol definition files.
//!
//! A definition describes one protocol variant: the frame element layout
//! and the payload fields of every function code. It compiles into a frozen
//! [`Protocol`](rotcp_dispatch::Protocol).
//!
//! ```json
//! {
//!   "name": "demo",
//!   "elements": [
//!     { "kind": "preamble", "value": "68" },
//!     { "kind": "length", "width": 1 },
//!     { "kind": "encryption_flag", "width": 1 },
//!     { "kind": "function_code", "width": 1 },
//!     { "kind": "payload" },
//!     { "kind": "checksum", "width": 2, "algorithm": 0, "order": "little" }
//!   ],
//!   "functions": [
//!     { "code": 1, "name": "telemetry", "fields": [
//!       { "name": "e", "codec": "bin", "length": 1,
//!         "enum": { "other": "Other", "labels": { "0": "A", "1": "B" } } }
//!     ] }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rotcp_codec::{
    Affine, ByteOrder, Codec, CodecError, ExplainedValue, FieldSpec, Interpretation, Lookup,
    ParsedValue, Scale,
};
use rotcp_dispatch::{BoxError, DispatchError, FunctionHandler, ParsedFields, Protocol};
use rotcp_frame::{ElementDescriptor, FrameSchema, LengthCoverage, SchemaError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Errors raised while loading or compiling a definition.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid definition JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid preamble hex {value:?}: {source}")]
    Preamble {
        value: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("function {code:#04x} field {field:?}: {reason}")]
    InvalidField {
        code: u64,
        field: String,
        reason: String,
    },

    #[error("function {code:#04x} field {field:?}: {source}")]
    Field {
        code: u64,
        field: String,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("invalid message values: {0}")]
    Values(String),
}

pub type Result<T> = std::result::Result<T, DefinitionError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageDef {
    #[default]
    PayloadAndChecksum,
    HeaderAndPayload,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDef {
    #[default]
    Big,
    Little,
}

impl From<OrderDef> for ByteOrder {
    fn from(order: OrderDef) -> Self {
        match order {
            OrderDef::Big => ByteOrder::BigEndian,
            OrderDef::Little => ByteOrder::LittleEndian,
        }
    }
}

/// One frame element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementDef {
    /// `value` is the expected bytes in hex.
    Preamble {
        value: String,
    },
    Length {
        width: usize,
        #[serde(default)]
        order: OrderDef,
        #[serde(default)]
        codec: HeaderCodecDef,
    },
    SerialNumber {
        width: usize,
        #[serde(default)]
        order: OrderDef,
        #[serde(default)]
        codec: HeaderCodecDef,
    },
    EncryptionFlag {
        width: usize,
        #[serde(default)]
        order: OrderDef,
        #[serde(default)]
        codec: HeaderCodecDef,
    },
    FunctionCode {
        width: usize,
        #[serde(default)]
        order: OrderDef,
        #[serde(default)]
        codec: HeaderCodecDef,
    },
    Payload,
    Checksum {
        width: usize,
        #[serde(default)]
        algorithm: u8,
        #[serde(default)]
        order: OrderDef,
    },
}

/// Layout of a header integer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderCodecDef {
    #[default]
    Bin,
    Bcd,
}

impl HeaderCodecDef {
    fn apply(self, element: ElementDescriptor) -> ElementDescriptor {
        match self {
            HeaderCodecDef::Bin => element,
            HeaderCodecDef::Bcd => element.bcd(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecDef {
    Bin,
    Bcd,
    Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleDef {
    Integer,
    Float,
    String,
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplainDef {
    #[serde(rename = "as", default)]
    pub scale: Option<ScaleDef>,
    #[serde(default = "one")]
    pub multiple: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "yes")]
    pub multiply_first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDef {
    pub other: String,
    pub labels: BTreeMap<i64, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    pub codec: CodecDef,
    pub length: usize,
    #[serde(default)]
    pub order: OrderDef,
    #[serde(default)]
    pub explain: Option<ExplainDef>,
    #[serde(rename = "enum", default)]
    pub enum_labels: Option<EnumDef>,
    #[serde(default)]
    pub bitmap: Option<BTreeMap<u32, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionDef {
    pub code: u64,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// A whole protocol variant as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolDefinition {
    pub name: String,
    #[serde(default)]
    pub length_coverage: CoverageDef,
    pub elements: Vec<ElementDef>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

impl ProtocolDefinition {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Validated frame schema.
    pub fn schema(&self) -> Result<FrameSchema> {
        let mut elements = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            elements.push(match element {
                ElementDef::Preamble { value } => {
                    let bytes = hex::decode(value).map_err(|source| DefinitionError::Preamble {
                        value: value.clone(),
                        source,
                    })?;
                    ElementDescriptor::preamble(bytes)
                }
                ElementDef::Length {
                    width,
                    order,
                    codec,
                } => codec.apply(ElementDescriptor::length(*width, (*order).into())),
                ElementDef::SerialNumber {
                    width,
                    order,
                    codec,
                } => codec.apply(ElementDescriptor::serial_number(*width, (*order).into())),
                ElementDef::EncryptionFlag {
                    width,
                    order,
                    codec,
                } => codec.apply(ElementDescriptor::encryption_flag(*width, (*order).into())),
                ElementDef::FunctionCode {
                    width,
                    order,
                    codec,
                } => codec.apply(ElementDescriptor::function_code(*width, (*order).into())),
                ElementDef::Payload => ElementDescriptor::payload(),
                ElementDef::Checksum {
                    width,
                    algorithm,
                    order,
                } => ElementDescriptor::checksum(*width, *algorithm, (*order).into()),
            });
        }
        let coverage = match self.length_coverage {
            CoverageDef::PayloadAndChecksum => LengthCoverage::PayloadAndChecksum,
            CoverageDef::HeaderAndPayload => LengthCoverage::HeaderAndPayload,
        };
        Ok(FrameSchema::new(elements)?.with_coverage(coverage))
    }

    /// Compile into a frozen protocol. `callback_for` supplies the callback
    /// of each function's handler.
    pub fn compile<F, C>(&self, mut callback_for: F) -> Result<Protocol>
    where
        F: FnMut(&FunctionDef) -> C,
        C: Fn(&ParsedFields) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        let mut builder = Protocol::builder(self.schema()?).name(self.name.clone());
        for function in &self.functions {
            let fields = function
                .fields
                .iter()
                .map(|field| field_spec(function.code, field))
                .collect::<Result<Vec<_>>>()?;
            let handler = FunctionHandler::new(function.code, function.name.clone(), fields)?
                .on_message(callback_for(function));
            builder = builder.handler(handler);
        }
        Ok(builder.build()?)
    }

    /// Compile with no-op callbacks.
    pub fn build(&self) -> Result<Protocol> {
        self.compile(|_| |_: &ParsedFields| -> std::result::Result<(), BoxError> { Ok(()) })
    }
}

fn field_spec(code: u64, field: &FieldDef) -> Result<FieldSpec> {
    let invalid = |reason: &str| DefinitionError::InvalidField {
        code,
        field: field.name.clone(),
        reason: reason.to_string(),
    };
    if field.enum_labels.is_some() && field.bitmap.is_some() {
        return Err(invalid("enum and bitmap are mutually exclusive"));
    }

    let order = ByteOrder::from(field.order);
    let codec = match field.codec {
        CodecDef::Bin => Codec::Binary(order),
        CodecDef::Bcd => Codec::Bcd(order),
        CodecDef::Ascii => Codec::Ascii,
    };

    let explain = field.explain.clone().unwrap_or(ExplainDef {
        scale: None,
        multiple: 1.0,
        offset: 0.0,
        multiply_first: true,
    });
    let scale = explain.scale.unwrap_or(match field.codec {
        CodecDef::Bin => ScaleDef::Integer,
        CodecDef::Bcd | CodecDef::Ascii => ScaleDef::String,
    });

    let mut interpretation = match scale {
        ScaleDef::Integer => {
            if explain.multiple.fract() != 0.0 || explain.offset.fract() != 0.0 {
                return Err(invalid("integer interpretation needs whole multiple and offset"));
            }
            Interpretation::integer(Affine {
                multiply_first: explain.multiply_first,
                multiple: explain.multiple as i64,
                offset: explain.offset as i64,
            })
        }
        ScaleDef::Float => Interpretation::float(Affine {
            multiply_first: explain.multiply_first,
            multiple: explain.multiple,
            offset: explain.offset,
        }),
        ScaleDef::String => Interpretation::text(),
    };
    if let Some(labels) = &field.enum_labels {
        interpretation = interpretation.with_enum(labels.other.clone(), labels.labels.clone());
    }
    if let Some(bits) = &field.bitmap {
        interpretation = interpretation.with_bitmap(bits.clone());
    }

    FieldSpec::new(field.name.clone(), codec, interpretation, field.length).map_err(|source| {
        DefinitionError::Field {
            code,
            field: field.name.clone(),
            source,
        }
    })
}

/// Convert a JSON object of field values into business values for the
/// handler of `code`.
///
/// Enum fields take their label, bitmap fields an array of labels,
/// string fields a JSON string and numeric fields a JSON number.
pub fn values_from_json(
    protocol: &Protocol,
    code: u64,
    json: &Value,
) -> Result<HashMap<String, ExplainedValue>> {
    let handler = protocol
        .handlers()
        .get(code)
        .ok_or(DispatchError::UnknownFunctionCode(code))?;
    let object = json
        .as_object()
        .ok_or_else(|| DefinitionError::Values("values must be a JSON object".into()))?;

    let mut values = HashMap::with_capacity(handler.fields().len());
    for field in handler.fields() {
        let Some(value) = object.get(field.name()) else {
            continue;
        };
        let interpretation = field.interpretation();
        let explained = match (interpretation.lookup(), interpretation.scale(), value) {
            (Some(Lookup::Enum { .. }), _, Value::String(label)) => {
                ExplainedValue::Enum(label.clone())
            }
            (Some(Lookup::Bitmap(_)), _, Value::Array(items)) => ExplainedValue::Bitmap(
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        DefinitionError::Values(format!("{}: bitmap labels must be strings", field.name()))
                    })?,
            ),
            (None, Scale::Text, Value::String(s)) => ExplainedValue::Str(s.clone()),
            (None, Scale::Integer(_), Value::Number(n)) => {
                ExplainedValue::Int(n.as_i64().ok_or_else(|| {
                    DefinitionError::Values(format!("{}: expected an integer", field.name()))
                })?)
            }
            (None, Scale::Float(_), Value::Number(n)) => {
                ExplainedValue::Float(n.as_f64().ok_or_else(|| {
                    DefinitionError::Values(format!("{}: expected a number", field.name()))
                })?)
            }
            _ => {
                return Err(DefinitionError::Values(format!(
                    "{}: unexpected value {value}",
                    field.name()
                )))
            }
        };
        values.insert(field.name().to_string(), explained);
    }
    Ok(values)
}

/// JSON form of an explained value.
pub fn explained_to_json(value: &ExplainedValue) -> Value {
    match value {
        ExplainedValue::Int(v) => Value::from(*v),
        ExplainedValue::Float(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        ExplainedValue::Str(s) | ExplainedValue::Enum(s) => Value::String(s.clone()),
        ExplainedValue::Bitmap(labels) => {
            Value::Array(labels.iter().cloned().map(Value::String).collect())
        }
    }
}

/// JSON form of a parsed field: raw bytes in hex, raw value and explained value.
pub fn parsed_to_json(value: &ParsedValue) -> Value {
    let mut object = Map::new();
    object.insert("raw".into(), Value::String(hex::encode(&value.raw_bytes)));
    object.insert("raw_value".into(), Value::String(value.raw_value.to_string()));
    object.insert("value".into(), explained_to_json(&value.explained));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use rotcp_dispatch::FrameParser;

    use super::*;

    const DEMO: &str = include_str!("../protocols/demo.json");
    const YKC: &str = include_str!("../protocols/ykc.json");

    #[test]
    fn demo_definition_compiles() {
        let definition = ProtocolDefinition::from_json(DEMO).expect("demo should parse");
        let protocol = definition.build().expect("demo should compile");

        assert_eq!(protocol.name(), "demo");
        assert_eq!(protocol.schema().elements().len(), 6);
        let telemetry = protocol.handlers().get(1).expect("fc 1 should exist");
        assert_eq!(telemetry.total_length(), 13);
        assert!(protocol.handlers().get(2).is_some());
        assert!(protocol.handlers().get(3).is_some());
    }

    #[test]
    fn ykc_definition_uses_header_coverage() {
        let definition = ProtocolDefinition::from_json(YKC).expect("ykc should parse");
        assert_eq!(definition.length_coverage, CoverageDef::HeaderAndPayload);
        let protocol = definition.build().expect("ykc should compile");
        assert_eq!(
            protocol.schema().coverage(),
            LengthCoverage::HeaderAndPayload
        );
        assert_eq!(
            protocol.handlers().get(1).expect("login should exist").total_length(),
            30
        );
    }

    #[test]
    fn ykc_login_sample_decodes() {
        let protocol = ProtocolDefinition::from_json(YKC)
            .expect("ykc should parse")
            .build()
            .expect("ykc should compile");
        let wire = hex::decode(
            "6822000000015503141278230500020a56342e312e353000010101010101010101010104675a",
        )
        .expect("sample hex should decode");

        let mut parser = FrameParser::new(Cursor::new(wire), Arc::new(protocol));
        let message = parser.process_next().expect("sample should dispatch");

        assert_eq!(message.handler, "login");
        assert_eq!(message.serial_number, Some(0));
        let value = |name: &str| message.fields[name].explained.clone();
        assert_eq!(value("pile_code"), ExplainedValue::Str("55031412782305".into()));
        assert_eq!(value("pile_type"), ExplainedValue::Enum("dc".into()));
        assert_eq!(value("gun_number"), ExplainedValue::Int(2));
        assert_eq!(value("protocol_version"), ExplainedValue::Int(10));
        assert_eq!(value("program_version"), ExplainedValue::Str("V4.1.50\0".into()));
        assert_eq!(value("net_type"), ExplainedValue::Enum("lan".into()));
        assert_eq!(value("operator"), ExplainedValue::Enum("other".into()));
    }

    #[test]
    fn defaults_fill_in_interpretation() {
        let field: FieldDef =
            serde_json::from_str(r#"{ "name": "code", "codec": "bcd", "length": 3 }"#)
                .expect("field should parse");
        let spec = field_spec(1, &field).expect("field should compile");
        assert_eq!(spec.interpretation().scale(), &Scale::Text);

        let field: FieldDef = serde_json::from_str(
            r#"{ "name": "t", "codec": "bin", "length": 2,
                 "explain": { "multiple": 10, "offset": -5, "multiply_first": false } }"#,
        )
        .expect("field should parse");
        let spec = field_spec(1, &field).expect("field should compile");
        assert_eq!(
            spec.interpretation().scale(),
            &Scale::Integer(Affine {
                multiply_first: false,
                multiple: 10,
                offset: -5
            })
        );
    }

    #[test]
    fn rejects_invalid_fields() {
        let fractional: FieldDef = serde_json::from_str(
            r#"{ "name": "x", "codec": "bin", "length": 2, "explain": { "multiple": 0.5 } }"#,
        )
        .expect("field should parse");
        assert!(matches!(
            field_spec(1, &fractional),
            Err(DefinitionError::InvalidField { .. })
        ));

        let ascii_number: FieldDef = serde_json::from_str(
            r#"{ "name": "x", "codec": "ascii", "length": 2, "explain": { "as": "integer" } }"#,
        )
        .expect("field should parse");
        assert!(matches!(
            field_spec(1, &ascii_number),
            Err(DefinitionError::Field { .. })
        ));

        let bad_width: FieldDef =
            serde_json::from_str(r#"{ "name": "x", "codec": "bin", "length": 5 }"#)
                .expect("field should parse");
        assert!(matches!(
            field_spec(1, &bad_width),
            Err(DefinitionError::Field { .. })
        ));
    }

    #[test]
    fn rejects_bad_schema_and_json() {
        assert!(matches!(
            ProtocolDefinition::from_json("{"),
            Err(DefinitionError::Json(_))
        ));

        let no_preamble = r#"{ "name": "x", "elements": [
            { "kind": "function_code", "width": 1 },
            { "kind": "checksum", "width": 2 } ] }"#;
        let definition = ProtocolDefinition::from_json(no_preamble).expect("json should parse");
        assert!(matches!(
            definition.schema(),
            Err(DefinitionError::Schema(SchemaError::PreambleNotFirst(_)))
        ));

        let bad_hex = r#"{ "name": "x", "elements": [
            { "kind": "preamble", "value": "6" },
            { "kind": "function_code", "width": 1 },
            { "kind": "checksum", "width": 2 } ] }"#;
        let definition = ProtocolDefinition::from_json(bad_hex).expect("json should parse");
        assert!(matches!(
            definition.schema(),
            Err(DefinitionError::Preamble { .. })
        ));
    }

    #[test]
    fn header_elements_accept_bcd() {
        let decimal = r#"{ "name": "x", "elements": [
            { "kind": "preamble", "value": "68" },
            { "kind": "length", "width": 1, "codec": "bcd" },
            { "kind": "function_code", "width": 2, "order": "little", "codec": "bcd" },
            { "kind": "payload" },
            { "kind": "checksum", "width": 2 } ] }"#;
        let schema = ProtocolDefinition::from_json(decimal)
            .expect("json should parse")
            .schema()
            .expect("schema should build");
        assert_eq!(schema.elements()[1].codec(), Codec::Bcd(ByteOrder::BigEndian));
        assert_eq!(
            schema.elements()[2].codec(),
            Codec::Bcd(ByteOrder::LittleEndian)
        );
        assert_eq!(schema.elements()[4].codec(), Codec::Binary(ByteOrder::BigEndian));

        let ascii = r#"{ "name": "x", "elements": [
            { "kind": "preamble", "value": "68" },
            { "kind": "function_code", "width": 1, "codec": "ascii" },
            { "kind": "checksum", "width": 2 } ] }"#;
        assert!(matches!(
            ProtocolDefinition::from_json(ascii),
            Err(DefinitionError::Json(_))
        ));
    }

    #[test]
    fn values_follow_field_interpretation() {
        let protocol = ProtocolDefinition::from_json(DEMO)
            .expect("demo should parse")
            .build()
            .expect("demo should compile");
        let json: Value = serde_json::from_str(
            r#"{ "a": 2147483647, "b": -2147483648, "c": 9320, "d": 46.6, "e": "B" }"#,
        )
        .expect("values should parse");

        let values = values_from_json(&protocol, 1, &json).expect("values should convert");
        assert_eq!(values["e"], ExplainedValue::Enum("B".into()));
        assert_eq!(values["d"], ExplainedValue::Float(46.6));

        let wire = protocol
            .encode_message(1, 0, 0, &values)
            .expect("message should encode");
        assert_eq!(hex::encode(&wire), "680f00017fffffff8000000012341234011a40");

        let wrong = serde_json::json!({ "e": 3 });
        assert!(matches!(
            values_from_json(&protocol, 1, &wrong),
            Err(DefinitionError::Values(_))
        ));
    }

    #[test]
    fn json_forms() {
        assert_eq!(explained_to_json(&ExplainedValue::Int(-3)), serde_json::json!(-3));
        assert_eq!(
            explained_to_json(&ExplainedValue::Bitmap(vec!["a".into(), "b".into()])),
            serde_json::json!(["a", "b"])
        );
        assert_eq!(explained_to_json(&ExplainedValue::Float(f64::NAN)), Value::Null);
    }
}
