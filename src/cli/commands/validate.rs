//! Validate-config command implementation

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        match load_config(config_path) {
            Ok(config) => {
                println!("Configuration valid: {config_path}");
                println!(
                    "  database: {}:{}/{}",
                    config.database.host, config.database.port, config.database.dbname
                );
                for family in &config.families {
                    println!(
                        "  family: {} (kind: {}, enabled: {}, checkpoint: {})",
                        family.name,
                        family.kind,
                        family.enabled,
                        family.checkpoint_path()
                    );
                }
                Ok(0)
            }
            Err(e) => {
                eprintln!("Configuration invalid: {e}");
                Ok(2)
            }
        }
    }
}
