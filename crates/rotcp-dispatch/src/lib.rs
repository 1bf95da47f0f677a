//! Function-code dispatch and connection serving.
//!
//! A [`Protocol`] is the frozen bundle a connection loop needs: the frame
//! schema, checksum and cipher registries, and the [`HandlerRegistry`]
//! mapping function codes to [`FunctionHandler`]s. It is built once through
//! [`ProtocolBuilder`] and shared as `Arc<Protocol>` by every
//! [`FrameParser`], one per connection.
//!
//! ```text
//! bytes → FrameReader → decrypt(flag) → handler(code).parse → callback
//! ```

pub mod cipher;
pub mod error;
pub mod handler;
pub mod parser;
pub mod protocol;
pub mod registry;
pub mod server;

pub use cipher::{Cipher, CipherRegistry, CipherRegistryBuilder, Identity};
pub use error::{BoxError, DispatchError, Result};
pub use handler::{FunctionHandler, ParsedFields};
pub use parser::{ErrorPolicy, FrameParser, ServeConfig, ServeSummary};
pub use protocol::{Message, Protocol, ProtocolBuilder};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};
pub use server::{serve_connection, ProtocolServer, ServerHandle};
