/// Errors from loading a binary schema bundle.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("truncated bundle: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("invalid bundle: {0}")]
    InvalidData(String),

    #[error("non-monotonic field tag in type '{type_name}'")]
    NonMonotonicTag { type_name: String },

    #[error("subtype index {index} out of range (0..{len}) for field '{field_name}'")]
    SubtypeOutOfRange {
        field_name: String,
        index: u16,
        len: usize,
    },

    #[error("unknown field meta-tag {0}")]
    UnknownMetaTag(u16),
}

/// Errors from the binary encoder.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("recursion too deep encoding field '{field}' (limit {limit})")]
    RecursionTooDeep { field: String, limit: usize },

    #[error("integer value out of 64-bit range for field '{field}'")]
    IntegerOutOfRange { field: String },

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("encode error: {0}")]
    Other(String),
}

/// Errors from the binary decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated data: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("recursion too deep decoding field '{field}' (limit {limit})")]
    RecursionTooDeep { field: String, limit: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("invalid utf-8 string in field '{field}': {source}")]
    InvalidUtf8 {
        field: String,
        source: std::string::FromUtf8Error,
    },
}

/// Errors from the pack/unpack compression.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid packed data: {0}")]
    InvalidData(String),

    #[error("unpacked size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },
}

/// Errors surfaced by the underlying frame transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("dial timed out")]
    DialTimeout,

    #[error("websocket error: {0}")]
    WebsocketError(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connection broke, reconnect invited")]
    ConnectBreak,
}

/// Terminal errors reached while attempting to resume a session.
#[derive(Debug, thiserror::Error)]
pub enum ResumptionError {
    #[error("server refused reconnect (code {code})")]
    ReconnectError { code: String },

    #[error("server claims to have received {server_recv} bytes, more than the {sent_bytes} client sent")]
    ReconnectMatchError { server_recv: u64, sent_bytes: u64 },

    #[error("reconnect requires {needed} cached bytes but only {available} are retained")]
    ReconnectCacheError { needed: u64, available: u64 },
}

/// Errors from the request/response host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("handler for '{0}' already registered")]
    DuplicateHandler(String),

    #[error("call on closed session")]
    SessionClosed,

    #[error("unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("unknown session {0}")]
    UnknownSession(u32),

    #[error("package type '{0}' not found in schema")]
    PackageTypeNotFound(String),

    #[error("protocol '{0}' has no response and is not confirm-able, call() has nothing to await")]
    NotAwaitable(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Pack(#[from] PackError),
}

/// Top-level error type that wraps all sub-errors.
#[derive(Debug, thiserror::Error)]
pub enum SprotoError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Resumption(#[from] ResumptionError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result type alias for sproto operations.
pub type Result<T> = std::result::Result<T, SprotoError>;
