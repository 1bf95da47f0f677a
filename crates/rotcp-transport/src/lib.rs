//! TCP byte-stream transport.
//!
//! This is the lowest layer of rotcp. A protocol line is an ordered,
//! blocking-readable byte stream; everything above only needs
//! [`std::io::Read`] and [`std::io::Write`] on the [`LineStream`] returned here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::LineStream;
pub use tcp::TcpTransport;
