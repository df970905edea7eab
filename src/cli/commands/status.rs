//! Status command implementation
//!
//! Prints each configured family's checkpoint state: watermark, counters and
//! last write time.

use crate::config::load_config;
use crate::core::state::CheckpointStore;
use crate::domain::Family;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this family
    #[arg(long)]
    pub family: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = load_config(config_path)?;

        println!(
            "{:<12} {:<10} {:>12} {:>10} {:>8}  {}",
            "FAMILY", "ENABLED", "WATERMARK", "SUCCESS", "FAILED", "LAST WRITE"
        );

        for family_config in &config.families {
            if let Some(only) = &self.family {
                if &family_config.name != only {
                    continue;
                }
            }

            let family = Family::new(family_config.name.clone())
                .map_err(|e| anyhow::anyhow!("invalid family name: {e}"))?;
            let store = CheckpointStore::new(family_config.checkpoint_path(), family);
            let checkpoint = store.load();

            println!(
                "{:<12} {:<10} {:>12} {:>10} {:>8}  {}",
                family_config.name,
                if family_config.enabled { "yes" } else { "no" },
                checkpoint.last_offset,
                checkpoint.success_count,
                checkpoint.fail_count,
                checkpoint
                    .last_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string()),
            );
        }

        Ok(0)
    }
}
