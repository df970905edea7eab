//! Domain models and types for Anvil.
//!
//! This module contains the core domain models, types and business rules for
//! the migration engine.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`Family`], [`Offset`])
//! - **The normalized aggregate** ([`ResultAggregate`] with [`Program`],
//!   [`StepRecord`], [`CurveSeries`], [`AlarmEvent`])
//! - **Error types** ([`AnvilError`], [`DecodeError`], [`SourceError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, AnvilError>`]:
//!
//! ```rust,no_run
//! use anvil::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let config = anvil::config::load_config("anvil.toml")?;
//!     let _ = config;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod errors;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use aggregate::{
    AlarmEvent, CurveSeries, Program, ResultAggregate, ResultRecord, StepRecord, TestStatus,
};
pub use errors::{AnvilError, DecodeError, SourceError};
pub use ids::{Family, Offset};
pub use result::Result;
