//! Configuration schema types
//!
//! This module defines the configuration structure for Anvil: one database
//! section, engine-wide defaults, and one `[[family]]` block per record
//! family the supervisor should run.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Watermark advancement policy after a batch with failed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPolicy {
    /// Advance to the batch's maximum offset regardless of item outcomes.
    /// Failed items are surfaced via the fail counter and not retried -
    /// the legacy behavior.
    #[default]
    AdvanceAlways,
    /// Advance only to just below the lowest failed offset, so the next
    /// run re-enumerates the failures.
    HoldOnFailure,
}

/// Main Anvil configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnvilConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Connection-pool configuration for the database holding both the
    /// legacy source tables and the normalized target schema
    pub database: DatabaseConfig,

    /// Engine-wide defaults, overridable per family
    #[serde(default)]
    pub engine: EngineConfig,

    /// Record families to migrate; one engine instance runs per enabled entry
    #[serde(rename = "family", default)]
    pub families: Vec<FamilyConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AnvilConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.database.validate()?;
        self.engine.validate()?;
        self.logging.validate()?;

        if self.families.is_empty() {
            return Err("At least one [[family]] section is required".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for family in &self.families {
            family.validate()?;
            if !seen.insert(family.name.as_str()) {
                return Err(format!("Duplicate family name '{}'", family.name));
            }
        }
        Ok(())
    }

    /// Families that are enabled for this run
    pub fn enabled_families(&self) -> impl Iterator<Item = &FamilyConfig> {
        self.families.iter().filter(|f| f.enabled)
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Database connection-pool configuration
///
/// Injected explicitly wherever a pool is constructed; there is no
/// process-wide connection singleton.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host
    pub host: String,

    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name
    pub dbname: String,

    /// Database user
    pub user: String,

    /// Database password
    /// Stored securely in memory and automatically zeroized on drop
    pub password: SecretString,

    /// Maximum pooled connections; sized for worker count + fetch headroom
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Timeout for acquiring a pooled connection
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,

    /// Per-statement timeout applied to every query
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_seconds: u64,
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("database.host cannot be empty".to_string());
        }
        if self.dbname.is_empty() {
            return Err("database.dbname cannot be empty".to_string());
        }
        if self.user.is_empty() {
            return Err("database.user cannot be empty".to_string());
        }
        if self.max_connections == 0 {
            return Err("database.max_connections must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Engine-wide defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Items fetched and dispatched per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent workers per family
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Resume from the checkpoint file (otherwise counters restart and the
    /// offset comes from `start_offset` or 0)
    #[serde(default = "default_true")]
    pub resume: bool,

    /// When set, an empty batch sleeps this long and retries instead of
    /// terminating the family
    #[serde(default)]
    pub poll_interval_seconds: Option<u64>,

    /// Watermark advancement policy for batches with failures
    #[serde(default)]
    pub watermark_policy: WatermarkPolicy,

    /// Backoff before retrying a failed batch enumeration
    #[serde(default = "default_fetch_retry")]
    pub fetch_retry_seconds: u64,

    /// Supervisor backoff before respawning a crashed family
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
            resume: true,
            poll_interval_seconds: None,
            watermark_policy: WatermarkPolicy::default(),
            fetch_retry_seconds: default_fetch_retry(),
            restart_backoff_seconds: default_restart_backoff(),
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("engine.batch_size must be greater than 0".to_string());
        }
        if self.workers == 0 {
            return Err("engine.workers must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// One record family to migrate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// Family name; labels the checkpoint and becomes the craft type in the
    /// normalized schema
    pub name: String,

    /// Pipeline kind from the registry ("fastening" or "riveting")
    pub kind: String,

    /// Whether the supervisor runs this family
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Checkpoint file path; defaults to `<name>_checkpoint.json`
    #[serde(default)]
    pub checkpoint_file: Option<String>,

    /// Per-family batch size override
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Per-family worker count override
    #[serde(default)]
    pub workers: Option<usize>,

    /// Stop after this many items in one session
    #[serde(default)]
    pub limit: Option<u64>,

    /// Force the starting offset (used when resume is off)
    #[serde(default)]
    pub start_offset: Option<i64>,

    /// Per-family poll interval override
    #[serde(default)]
    pub poll_interval_seconds: Option<u64>,

    /// Per-family watermark policy override
    #[serde(default)]
    pub watermark_policy: Option<WatermarkPolicy>,
}

impl FamilyConfig {
    fn validate(&self) -> Result<(), String> {
        crate::domain::Family::new(self.name.clone())
            .map_err(|e| format!("family.name: {e}"))?;
        if self.kind.is_empty() {
            return Err(format!("family '{}': kind cannot be empty", self.name));
        }
        if self.batch_size == Some(0) {
            return Err(format!("family '{}': batch_size must be greater than 0", self.name));
        }
        if self.workers == Some(0) {
            return Err(format!("family '{}': workers must be greater than 0", self.name));
        }
        Ok(())
    }

    /// Checkpoint file path for this family
    pub fn checkpoint_path(&self) -> String {
        self.checkpoint_file
            .clone()
            .unwrap_or_else(|| format!("{}_checkpoint.json", self.name))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable JSON file logging in addition to console output
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_log_path")]
    pub local_path: String,

    /// Log rotation (daily or hourly)
    #[serde(default = "default_log_rotation")]
    pub local_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_log_path(),
            local_rotation: default_log_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid = ["daily", "hourly"];
        if !valid.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid.join(", ")
            ));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> usize {
    16
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_statement_timeout() -> u64 {
    60
}

fn default_batch_size() -> usize {
    200
}

fn default_workers() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_fetch_retry() -> u64 {
    5
}

fn default_restart_backoff() -> u64 {
    10
}

fn default_log_path() -> String {
    "logs".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}
