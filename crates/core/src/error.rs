//! Error types for the brs-transfer system.
//!
//! All operations return structured errors rather than panicking.
//! Encoders fail before emitting any bits for an out-of-domain value, so a
//! returned buffer is always a complete, valid encoding.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Encoding: a value lies outside an encoder's declared domain
/// - Cursor: reading past the end of a byte buffer
/// - Transfer: timeouts, artifact namespace and console failures
/// - I/O: file system or process pipes
/// - Json, Pattern: save data input and log watch patterns
#[derive(Debug, Error)]
pub enum Error {
    /// Encoder input was outside its domain
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Byte cursor read out of bounds
    #[error("cursor error: {0}")]
    Cursor(#[from] CursorError),

    /// Transfer orchestration failure
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// File or pipe I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Save data could not be parsed from JSON
    #[error("save data JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A log watch pattern failed to compile
    #[error("log pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// True if this error is a transfer timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transfer(TransferError::Timeout { .. }))
    }
}

/// Value encoding errors.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Value does not fit the bound given to a bounded encoder
    #[error("{operation}: value {value} is not below max {max}")]
    ValueOutOfRange {
        operation: &'static str,
        value: u64,
        max: u64,
    },

    /// The bound itself is unusable (bounded ints need max >= 2)
    #[error("{operation}: max {max} must be at least 2")]
    InvalidBound { operation: &'static str, max: u64 },

    /// Text could not be parsed as a 128-bit identifier
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    /// A length does not fit the signed 32-bit length prefix
    #[error("{operation}: length {length} exceeds i32 range")]
    LengthOverflow {
        operation: &'static str,
        length: usize,
    },

    /// Component property value does not match its declared type
    #[error("property {property:?} declared as {expected} but got {actual}")]
    UnrealTypeMismatch {
        property: String,
        expected: String,
        actual: &'static str,
    },

    /// Component schema names a type the encoder does not know
    #[error("unknown unreal type {0:?}")]
    UnknownUnrealType(String),

    /// Brick carries a component but is missing one of its properties
    #[error("brick {brick} component {component:?} is missing property {property:?}")]
    MissingProperty {
        brick: usize,
        component: String,
        property: String,
    },
}

/// Byte cursor errors.
#[derive(Debug, Error)]
pub enum CursorError {
    /// Attempted to read past the end of the buffer, including a trailing
    /// partial chunk in `ByteCursor::chunk`
    #[error("out of bounds: offset {offset} + {requested} bytes exceeds {available} available")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        available: usize,
    },

    /// Chunk length of zero requested
    #[error("chunk length must be non-zero")]
    ZeroLength,
}

/// Transfer orchestration errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// No completion signal arrived before the deadline
    #[error("{what} timed out after {timeout_ms}ms")]
    Timeout { what: String, timeout_ms: u64 },

    /// Artifact name would resolve outside the artifact root
    #[error("artifact name {0:?} resolves outside the artifact root")]
    PathOutsideRoot(String),

    /// Artifact file does not exist
    #[error("artifact {0:?} does not exist")]
    ArtifactMissing(String),

    /// Baked artifact on disk no longer matches what was written
    #[error("artifact {name:?} changed on disk: expected crc {expected:#010x}, got {actual:#010x}")]
    ArtifactChanged {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Log stream has no more senders
    #[error("log stream closed")]
    StreamClosed,

    /// Server process is gone or its stdin is closed
    #[error("server process exited: {0}")]
    ProcessExited(String),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
