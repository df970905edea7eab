//! Domain error types
//!
//! This module defines the error hierarchy for Anvil. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Anvil error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum AnvilError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Curve payload decode errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Source store errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Database/connection-pool errors
    #[error("Database error: {0}")]
    Database(String),

    /// Write-path failures inside an item transaction
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Checkpoint file errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Engine loop errors
    #[error("Engine error: {0}")]
    Engine(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Curve payload decode errors
///
/// A decode failure means "this record's curve is unavailable", never a fatal
/// pipeline error: callers persist the record without curve data or mark the
/// single item failed, but the batch keeps going.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The legacy text wrapper around the payload could not be decoded
    #[error("Invalid text wrapper: {0}")]
    Wrapper(String),

    /// Decompression of the payload failed
    #[error("Decompression failed: {0}")]
    Decompress(String),

    /// The decompressed/raw bytes could not be unpacked into samples
    #[error("Unpack failed: {0}")]
    Unpack(String),
}

/// Source store errors
///
/// Errors that occur while enumerating or fetching legacy records.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Batch enumeration failed; the batch is retried after a backoff
    /// and the watermark is left untouched.
    #[error("Batch fetch failed: {0}")]
    Fetch(String),

    /// A record vanished between enumeration and fetch; the item is
    /// marked failed and not retried automatically.
    #[error("Source record not found: offset {0}")]
    NotFound(i64),

    /// A source row carried a value the pipeline cannot interpret
    #[error("Invalid source row: {0}")]
    InvalidRow(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for AnvilError {
    fn from(err: std::io::Error) -> Self {
        AnvilError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for AnvilError {
    fn from(err: serde_json::Error) -> Self {
        AnvilError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for AnvilError {
    fn from(err: toml::de::Error) -> Self {
        AnvilError::Configuration(format!("TOML parse error: {err}"))
    }
}
