//! Result type alias for Anvil operations

use crate::domain::errors::AnvilError;

/// Result type alias used throughout the application
pub type Result<T> = std::result::Result<T, AnvilError>;
