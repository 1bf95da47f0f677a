use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use rotcp_codec::ExplainedValue;
use rotcp_frame::{
    encode_frame, ChecksumRegistry, FrameConfig, FrameContext, FrameReader, FrameSchema,
    FrameWriter, OutgoingFrame,
};
use tracing::debug;

use crate::cipher::{Cipher, CipherRegistry, CipherRegistryBuilder};
use crate::error::{DispatchError, Result};
use crate::handler::{FunctionHandler, ParsedFields};
use crate::registry::{HandlerRegistry, HandlerRegistryBuilder};

/// A dispatched frame: header values plus the handler's decoded fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub function_code: u64,
    /// Name of the handler that decoded the payload.
    pub handler: String,
    pub serial_number: Option<u64>,
    pub encryption_flag: u64,
    pub fields: ParsedFields,
}

/// Frozen protocol definition shared by every connection.
#[derive(Debug)]
pub struct Protocol {
    name: String,
    schema: Arc<FrameSchema>,
    checksums: Arc<ChecksumRegistry>,
    ciphers: CipherRegistry,
    handlers: HandlerRegistry,
}

impl Protocol {
    pub fn builder(schema: FrameSchema) -> ProtocolBuilder {
        ProtocolBuilder {
            name: "rotcp".to_string(),
            schema,
            checksums: ChecksumRegistry::with_defaults(),
            ciphers: CipherRegistry::builder(),
            handlers: HandlerRegistry::builder(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &FrameSchema {
        &self.schema
    }

    pub fn checksums(&self) -> &ChecksumRegistry {
        &self.checksums
    }

    pub fn ciphers(&self) -> &CipherRegistry {
        &self.ciphers
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Frame reader over `inner` bound to this protocol's schema.
    pub fn reader<T: Read>(&self, inner: T, config: FrameConfig) -> FrameReader<T> {
        FrameReader::with_config(
            inner,
            Arc::clone(&self.schema),
            Arc::clone(&self.checksums),
            config,
        )
    }

    /// Frame writer over `inner` bound to this protocol's schema.
    pub fn writer<T: Write>(&self, inner: T, config: FrameConfig) -> FrameWriter<T> {
        FrameWriter::with_config(
            inner,
            Arc::clone(&self.schema),
            Arc::clone(&self.checksums),
            config,
        )
    }

    /// Decrypt a verified frame's payload and run its function handler.
    pub fn dispatch(&self, frame: &FrameContext) -> Result<Message> {
        let payload = self
            .ciphers
            .decrypt(frame.encryption_flag, frame.payload.clone())?;
        let handler = self
            .handlers
            .get(frame.function_code)
            .ok_or(DispatchError::UnknownFunctionCode(frame.function_code))?;

        debug!(
            function_code = frame.function_code,
            handler = handler.name(),
            "dispatching frame"
        );
        let fields = handler.handle(payload)?;
        Ok(Message {
            function_code: frame.function_code,
            handler: handler.name().to_string(),
            serial_number: frame.serial_number,
            encryption_flag: frame.encryption_flag,
            fields,
        })
    }

    /// Encode `values` through the handler for `code`, then encrypt the
    /// payload with the cipher for `flag`.
    pub fn outgoing(
        &self,
        code: u64,
        flag: u64,
        serial: u64,
        values: &HashMap<String, ExplainedValue>,
    ) -> Result<OutgoingFrame> {
        let handler = self
            .handlers
            .get(code)
            .ok_or(DispatchError::UnknownFunctionCode(code))?;
        let payload = self.ciphers.encrypt(flag, handler.encode(values)?)?;
        Ok(OutgoingFrame {
            function_code: code,
            encryption_flag: flag,
            serial_number: serial,
            payload,
        })
    }

    /// Complete wire bytes of a message.
    pub fn encode_message(
        &self,
        code: u64,
        flag: u64,
        serial: u64,
        values: &HashMap<String, ExplainedValue>,
    ) -> Result<Bytes> {
        let frame = self.outgoing(code, flag, serial, values)?;
        let mut buf = BytesMut::new();
        encode_frame(&self.schema, &self.checksums, &frame, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Assembles a [`Protocol`]; [`build`](Self::build) freezes it.
pub struct ProtocolBuilder {
    name: String,
    schema: FrameSchema,
    checksums: ChecksumRegistry,
    ciphers: CipherRegistryBuilder,
    handlers: HandlerRegistryBuilder,
}

impl ProtocolBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the default checksum registry.
    pub fn checksums(mut self, checksums: ChecksumRegistry) -> Self {
        self.checksums = checksums;
        self
    }

    pub fn cipher(mut self, flag: u64, cipher: impl Cipher + 'static) -> Self {
        self.ciphers = self.ciphers.register(flag, cipher);
        self
    }

    pub fn handler(mut self, handler: FunctionHandler) -> Self {
        self.handlers = self.handlers.register(handler);
        self
    }

    /// Check the checksum element against the registry and freeze.
    pub fn build(self) -> Result<Protocol> {
        self.checksums.check_element(self.schema.checksum())?;
        Ok(Protocol {
            name: self.name,
            schema: Arc::new(self.schema),
            checksums: Arc::new(self.checksums),
            ciphers: self.ciphers.build(),
            handlers: self.handlers.build(),
        })
    }
}
