//! Rules over TCP: declarative binary line protocols.
//!
//! rotcp turns a declarative description of a binary frame layout and its
//! per-function payload fields into a running TCP service that verifies,
//! decrypts and decodes every frame into named, typed values.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and connected line streams
//! - [`codec`]: Field codecs (BIN, BCD, ASCII) and value interpretation
//! - [`frame`]: Frame schema, streaming reader/validator and writer
//! - [`dispatch`]: Cipher and handler registries, parser loop, TCP server
//! - [`definition`]: JSON protocol definition files (behind `definition` feature)

/// Re-export transport types.
pub mod transport {
    pub use rotcp_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use rotcp_codec::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rotcp_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use rotcp_dispatch::*;
}

#[cfg(feature = "definition")]
pub mod definition;
