//! Init command implementation
//!
//! Writes a commented sample configuration file.

use clap::Args;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Output path for the configuration file
    #[arg(short, long, default_value = "anvil.toml")]
    pub output: String,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

const SAMPLE_CONFIG: &str = r#"# Anvil configuration

[application]
# trace, debug, info, warn, error
log_level = "info"

[database]
host = "localhost"
port = 5432
dbname = "equipment"
user = "anvil"
# Use ${VAR} substitution to keep credentials out of the file
password = "${ANVIL_DB_PASSWORD}"
max_connections = 16
connection_timeout_seconds = 30
statement_timeout_seconds = 60

[engine]
batch_size = 200
workers = 10
resume = true
# Uncomment to keep polling for new data instead of stopping at end-of-stream
# poll_interval_seconds = 60
# "advance-always" (legacy behavior) or "hold-on-failure" (retry failed
# offsets on the next pass)
watermark_policy = "advance-always"
fetch_retry_seconds = 5
restart_backoff_seconds = 10

[[family]]
name = "fastening"
kind = "fastening"
checkpoint_file = "state/fastening_checkpoint.json"

[[family]]
name = "riveting"
kind = "riveting"
checkpoint_file = "state/riveting_checkpoint.json"

[logging]
local_enabled = false
local_path = "logs"
local_rotation = "daily"
"#;

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        let path = Path::new(&self.output);
        if path.exists() && !self.force {
            eprintln!(
                "{} already exists; pass --force to overwrite",
                path.display()
            );
            return Ok(2);
        }

        std::fs::write(path, SAMPLE_CONFIG)?;
        println!("Wrote sample configuration to {}", path.display());
        println!("Set ANVIL_DB_PASSWORD and edit the database section before running.");
        Ok(0)
    }
}
