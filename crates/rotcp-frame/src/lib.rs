//! Frame schema and streaming frame reader/writer.
//!
//! A frame is an ordered list of elements described by a [`FrameSchema`]:
//!
//! ```text
//! ┌──────────┬────────┬─────────┬──────┬──────────┬─────────┬──────────┐
//! │ Preamble │ Length │ Serial? │ Flag │ Function │ Payload │ Checksum │
//! │ fixed    │ uint   │ uint    │ uint │ uint     │ dynamic │ fixed    │
//! └──────────┴────────┴─────────┴──────┴──────────┴─────────┴──────────┘
//! ```
//!
//! [`FrameReader`] pulls one element at a time from any [`std::io::Read`],
//! sizes the payload from the Length element, and verifies the checksum
//! before handing back a [`FrameContext`]. [`FrameWriter`] does the reverse.

pub mod checksum;
pub mod codec;
pub mod context;
pub mod element;
pub mod error;
pub mod reader;
pub mod schema;
pub mod writer;

pub use checksum::{
    ChecksumAlgorithm, ChecksumRegistry, ChecksumRegistryBuilder, Crc16Modbus, Crc16Xmodem, Sum16,
    CRC16_MODBUS, CRC16_XMODEM, SUM16,
};
pub use codec::{encode_frame, FrameConfig, OutgoingFrame, DEFAULT_MAX_PAYLOAD};
pub use context::FrameContext;
pub use element::{ElementDescriptor, ElementKind, ElementLength};
pub use error::{FrameError, Result, SchemaError};
pub use reader::FrameReader;
pub use schema::{FrameSchema, LengthCoverage};
pub use writer::FrameWriter;

pub use rotcp_codec::ByteOrder;
