//! Configuration management for Anvil.
//!
//! TOML-based configuration loading, parsing and validation.
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [database]
//! host = "10.18.120.240"
//! port = 5432
//! dbname = "equipment"
//! user = "anvil"
//! password = "${ANVIL_DB_PASSWORD}"
//! max_connections = 16
//!
//! [engine]
//! batch_size = 200
//! workers = 10
//!
//! [[family]]
//! name = "fastening"
//! kind = "fastening"
//! checkpoint_file = "state/fastening_checkpoint.json"
//!
//! [[family]]
//! name = "riveting"
//! kind = "riveting"
//! poll_interval_seconds = 60
//! ```
//!
//! Use `${VAR_NAME}` syntax for environment variable substitution; an
//! `ANVIL_<SECTION>_<KEY>` environment variable overrides the corresponding
//! file value after parsing.

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    AnvilConfig, ApplicationConfig, DatabaseConfig, EngineConfig, FamilyConfig, LoggingConfig,
    WatermarkPolicy,
};
pub use secret::{secret_string, SecretString, SecretValue};
