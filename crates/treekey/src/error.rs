//! Error types for key encoding and decoding.

use thiserror::Error;

/// Errors that can occur while building, decoding or navigating a key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The operation is illegal in the current state of the key buffer.
    ///
    /// Raised when appending after an edge value or a guard byte, cutting
    /// more segments than exist, or positioning the cursor out of range.
    #[error("structural error: {0}")]
    Structural(String),

    /// The bytes at `offset` do not encode a value of the expected type.
    #[error("conversion error at offset {offset}: {message}")]
    Conversion {
        /// Byte offset of the segment (or byte) that failed to decode.
        offset: usize,
        /// Human-readable description.
        message: String,
    },

    /// The encoded key would grow past its maximum size.
    #[error("key too long: {requested} bytes exceeds maximum of {maximum}")]
    Capacity {
        /// Size the key would have had after the operation.
        requested: usize,
        /// Maximum permitted size.
        maximum: usize,
    },

    /// A decode was attempted at or past the end of the key.
    #[error("no segment at index {index} (key size {size})")]
    MissingSegment {
        /// Cursor position at which decoding was attempted.
        index: usize,
        /// Encoded size of the key.
        size: usize,
    },

    /// The appended value's type has no registered key coder.
    #[error("no key coder registered for type {0}")]
    NoCodec(String),

    /// The value cannot be represented in a key segment.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// The key cannot be stored as a record key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A key configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KeyError {
    /// Creates a structural error.
    #[must_use]
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    /// Creates a conversion error for the byte at `offset`.
    #[must_use]
    pub fn conversion(offset: usize, message: impl Into<String>) -> Self {
        Self::Conversion { offset, message: message.into() }
    }

    /// Returns `true` for errors caused by malformed or mismatched bytes.
    #[must_use]
    pub const fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }
}

/// Result type for key operations.
pub type KeyResult<T> = Result<T, KeyError>;
