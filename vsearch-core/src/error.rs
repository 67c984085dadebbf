//! # Error Handling
//!
//! Error types shared by every vsearch index.
//!
//! ## Design Principles
//!
//! 1. **Typed**: Every failure surfaces as a distinct variant, never a panic
//! 2. **Contextual**: Errors carry the values that caused them
//! 3. **Final**: Nothing is retried internally; callers decide

use thiserror::Error;

/// Result type alias for vsearch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for vsearch
#[derive(Error, Debug)]
pub enum Error {
    // Construction Errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Vector Errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cannot normalize a zero vector")]
    ZeroVector,

    // Index Errors
    #[error("Index is empty")]
    EmptyIndex,

    // Persistence Errors
    #[error("Unsupported index format version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("Corrupted index data: {details}")]
    Corrupted { details: String },

    // System Errors
    #[error("IO error: {message}")]
    Io { message: String, source: std::io::Error },
}

impl Error {
    /// Shorthand for a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration { message: message.into() }
    }

    /// Check if error is recoverable
    ///
    /// A failed read leaves the target index in an undefined state, so
    /// persistence errors are not recoverable for that index.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::DimensionMismatch { .. } => true,
            Error::ZeroVector => true,
            Error::EmptyIndex => true,
            Error::Configuration { .. } => false,
            Error::UnsupportedVersion { .. } => false,
            Error::Corrupted { .. } => false,
            Error::Io { .. } => false,
        }
    }

    /// Get error code for monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Error::ZeroVector => "ZERO_VECTOR",
            Error::EmptyIndex => "EMPTY_INDEX",
            Error::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Error::Corrupted { .. } => "CORRUPTED",
            Error::Io { .. } => "IO_ERROR",
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Fail with `DimensionMismatch` unless `actual == expected`
#[inline]
pub fn ensure_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, actual })
    }
}
