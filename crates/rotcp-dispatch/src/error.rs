use rotcp_codec::CodecError;
use rotcp_frame::FrameError;
use rotcp_transport::TransportError;

/// Error type for user-supplied ciphers and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while dispatching frames or building a protocol.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No cipher is registered for the frame's encryption flag.
    #[error("no cipher registered for encryption flag {0}")]
    UnknownCipherFlag(u64),

    /// The cipher rejected the payload.
    #[error("cipher for flag {flag} failed: {source}")]
    Cipher {
        flag: u64,
        #[source]
        source: BoxError,
    },

    /// No handler is registered for the frame's function code.
    #[error("no handler registered for function code {0:#04x}")]
    UnknownFunctionCode(u64),

    /// The payload size differs from the sum of the handler's field widths.
    #[error("function code {code:#04x} expects {expected} payload bytes, got {actual}")]
    PayloadLengthMismatch {
        code: u64,
        expected: usize,
        actual: usize,
    },

    /// A payload field could not be decoded or encoded.
    #[error("field {field:?}: {source}")]
    Field {
        field: String,
        #[source]
        source: CodecError,
    },

    /// Encoding was asked for a message without a value for this field.
    #[error("no value supplied for field {0:?}")]
    MissingValue(String),

    /// Two fields of one handler share a name.
    #[error("function code {code:#04x} declares field {field:?} twice")]
    DuplicateField { code: u64, field: String },

    /// The handler callback reported an error.
    #[error("callback for function code {code:#04x} failed: {source}")]
    Callback {
        code: u64,
        #[source]
        source: BoxError,
    },
}

impl DispatchError {
    /// Whether the connection must be closed after this error.
    ///
    /// I/O failures and unknown encryption flags end the connection; every
    /// other error only drops the current frame.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            DispatchError::Frame(err) => err.is_connection_fatal(),
            DispatchError::Transport(_) | DispatchError::UnknownCipherFlag(_) => true,
            _ => false,
        }
    }

    /// Whether the peer closed the connection.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, DispatchError::Frame(FrameError::ConnectionClosed))
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
