use std::collections::HashMap;
use std::fmt;

use bytes::{Bytes, BytesMut};
use rotcp_codec::{ExplainedValue, FieldSpec, ParsedValue};

use crate::error::{BoxError, DispatchError, Result};

/// Decoded payload fields keyed by field name.
pub type ParsedFields = HashMap<String, ParsedValue>;

type Callback = Box<dyn Fn(&ParsedFields) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Ordered field layout of one function code's payload, plus the callback
/// invoked with the decoded fields.
pub struct FunctionHandler {
    code: u64,
    name: String,
    fields: Vec<FieldSpec>,
    total_length: usize,
    callback: Callback,
}

impl FunctionHandler {
    /// Create a handler. Field names must be unique.
    ///
    /// The callback defaults to a no-op; attach one with
    /// [`on_message`](Self::on_message).
    pub fn new(code: u64, name: impl Into<String>, fields: Vec<FieldSpec>) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name() == field.name()) {
                return Err(DispatchError::DuplicateField {
                    code,
                    field: field.name().to_string(),
                });
            }
        }
        let total_length = fields.iter().map(FieldSpec::byte_length).sum();
        Ok(Self {
            code,
            name: name.into(),
            fields,
            total_length,
            callback: Box::new(|_| Ok(())),
        })
    }

    /// Replace the callback.
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ParsedFields) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback = Box::new(callback);
        self
    }

    pub fn code(&self) -> u64 {
        self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Sum of the field widths; the exact payload size this handler accepts.
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Decode `payload` field by field, in declared order.
    pub fn parse(&self, payload: Bytes) -> Result<ParsedFields> {
        if payload.len() != self.total_length {
            return Err(DispatchError::PayloadLengthMismatch {
                code: self.code,
                expected: self.total_length,
                actual: payload.len(),
            });
        }

        let mut parsed = ParsedFields::with_capacity(self.fields.len());
        let mut offset = 0usize;
        for field in &self.fields {
            let end = offset + field.byte_length();
            let value = field
                .decode(payload.slice(offset..end))
                .map_err(|source| DispatchError::Field {
                    field: field.name().to_string(),
                    source,
                })?;
            parsed.insert(field.name().to_string(), value);
            offset = end;
        }
        Ok(parsed)
    }

    /// Parse `payload` and run the callback on the result.
    pub fn handle(&self, payload: Bytes) -> Result<ParsedFields> {
        let parsed = self.parse(payload)?;
        (self.callback)(&parsed).map_err(|source| DispatchError::Callback {
            code: self.code,
            source,
        })?;
        Ok(parsed)
    }

    /// Encode business values into a payload, in declared field order.
    pub fn encode(&self, values: &HashMap<String, ExplainedValue>) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(self.total_length);
        for field in &self.fields {
            let value = values
                .get(field.name())
                .ok_or_else(|| DispatchError::MissingValue(field.name().to_string()))?;
            let bytes = field.encode(value).map_err(|source| DispatchError::Field {
                field: field.name().to_string(),
                source,
            })?;
            payload.extend_from_slice(&bytes);
        }
        Ok(payload.freeze())
    }
}

impl fmt::Debug for FunctionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionHandler")
            .field("code", &self.code)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("total_length", &self.total_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use rotcp_codec::{Affine, ByteOrder, Codec, Interpretation, RawValue};

    use super::*;

    const BE: ByteOrder = ByteOrder::BigEndian;

    pub(crate) const TELEMETRY_PAYLOAD: [u8; 13] = [
        0x7F, 0xFF, 0xFF, 0xFF, 0x80, 0x00, 0x00, 0x00, 0x12, 0x34, 0x12, 0x34, 0x01,
    ];

    /// Fields a..e of the 13-byte telemetry payload.
    pub(crate) fn telemetry_fields() -> Vec<FieldSpec> {
        let int = Interpretation::default();
        vec![
            FieldSpec::new("a", Codec::Binary(BE), int.clone(), 4).unwrap(),
            FieldSpec::new("b", Codec::Binary(BE), int.clone(), 4).unwrap(),
            FieldSpec::new(
                "c",
                Codec::Binary(BE),
                Interpretation::integer(Affine {
                    multiply_first: true,
                    multiple: 2,
                    offset: 0,
                }),
                2,
            )
            .unwrap(),
            FieldSpec::new(
                "d",
                Codec::Binary(BE),
                Interpretation::float(Affine {
                    multiply_first: true,
                    multiple: 0.01,
                    offset: 0.0,
                }),
                2,
            )
            .unwrap(),
            FieldSpec::new(
                "e",
                Codec::Binary(BE),
                int.with_enum("Other", [(0, "A"), (1, "B"), (2, "C")]),
                1,
            )
            .unwrap(),
        ]
    }

    #[test]
    fn parse_accounts_every_byte() {
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields()).unwrap();
        assert_eq!(handler.total_length(), 13);

        let parsed = handler
            .parse(Bytes::from_static(&TELEMETRY_PAYLOAD))
            .unwrap();
        assert_eq!(parsed["a"].explained, ExplainedValue::Int(2_147_483_647));
        assert_eq!(parsed["b"].explained, ExplainedValue::Int(-2_147_483_648));
        assert_eq!(parsed["c"].raw_value, RawValue::Int(4660));
        assert_eq!(parsed["c"].explained, ExplainedValue::Int(9320));
        match parsed["d"].explained {
            ExplainedValue::Float(v) => assert!((v - 46.60).abs() < 1e-9),
            ref other => panic!("expected float, got {other:?}"),
        }
        assert_eq!(parsed["e"].explained, ExplainedValue::Enum("B".into()));
        assert_eq!(parsed["e"].raw_bytes.as_ref(), &[0x01]);
    }

    #[test]
    fn enum_miss_uses_fallback_label() {
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields()).unwrap();
        let mut payload = TELEMETRY_PAYLOAD;
        payload[12] = 0x09;
        let parsed = handler.parse(Bytes::copy_from_slice(&payload)).unwrap();
        assert_eq!(parsed["e"].explained, ExplainedValue::Enum("Other".into()));
    }

    #[test]
    fn wrong_payload_length_is_reported() {
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields()).unwrap();
        let err = handler
            .parse(Bytes::copy_from_slice(&TELEMETRY_PAYLOAD[..12]))
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::PayloadLengthMismatch {
                code: 1,
                expected: 13,
                actual: 12
            }
        ));
    }

    #[test]
    fn handle_invokes_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields())
            .unwrap()
            .on_message(move |fields| {
                assert_eq!(fields.len(), 5);
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        handler
            .handle(Bytes::from_static(&TELEMETRY_PAYLOAD))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_error_is_surfaced() {
        let handler = FunctionHandler::new(4, "fails", telemetry_fields())
            .unwrap()
            .on_message(|_| Err("rejected".into()));
        let err = handler
            .handle(Bytes::from_static(&TELEMETRY_PAYLOAD))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Callback { code: 4, .. }));
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn duplicate_field_names_rejected() {
        let mut fields = telemetry_fields();
        fields.push(fields[0].clone());
        let err = FunctionHandler::new(1, "dup", fields).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateField { field, .. } if field == "a"));
    }

    #[test]
    fn encode_inverts_parse() {
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields()).unwrap();
        let parsed = handler
            .parse(Bytes::from_static(&TELEMETRY_PAYLOAD))
            .unwrap();
        let values: HashMap<String, ExplainedValue> = parsed
            .into_iter()
            .map(|(name, value)| (name, value.explained))
            .collect();

        let payload = handler.encode(&values).unwrap();
        assert_eq!(payload.as_ref(), &TELEMETRY_PAYLOAD);
    }

    #[test]
    fn encode_requires_every_field() {
        let handler = FunctionHandler::new(1, "telemetry", telemetry_fields()).unwrap();
        let err = handler.encode(&HashMap::new()).unwrap_err();
        assert!(matches!(err, DispatchError::MissingValue(name) if name == "a"));
    }
}
