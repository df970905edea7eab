//! Run command implementation
//!
//! Launches the supervisor with one engine per enabled family, applying any
//! CLI overrides on top of the loaded configuration.

use crate::adapters::postgres::PostgresClient;
use crate::config::load_config;
use crate::core::family::FamilyRegistry;
use crate::core::Supervisor;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only run these families (comma-separated names)
    #[arg(long)]
    pub family: Option<String>,

    /// Override the batch size for all families
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override the worker count for all families
    #[arg(long)]
    pub workers: Option<usize>,

    /// Stop each family after this many items
    #[arg(long)]
    pub limit: Option<u64>,

    /// Force the starting offset (implies --no-resume)
    #[arg(long)]
    pub start_offset: Option<i64>,

    /// Ignore the checkpoint watermark and counters
    #[arg(long)]
    pub no_resume: bool,

    /// Poll for new data at this interval instead of terminating on
    /// end-of-stream (seconds)
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Run one pass and exit even when families configure polling
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = load_config(config_path)?;

        // Apply CLI overrides
        if let Some(names) = &self.family {
            let wanted: Vec<&str> = names.split(',').map(str::trim).collect();
            for name in &wanted {
                if !config.families.iter().any(|f| f.name == *name) {
                    tracing::error!(family = %name, "Unknown family");
                    eprintln!("Unknown family '{name}' - not present in the configuration");
                    return Ok(2);
                }
            }
            for family in &mut config.families {
                family.enabled = wanted.contains(&family.name.as_str());
            }
            tracing::info!(families = ?wanted, "Restricting run to selected families");
        }

        if let Some(batch_size) = self.batch_size {
            tracing::info!(batch_size, "Overriding batch size from CLI");
            config.engine.batch_size = batch_size;
            for family in &mut config.families {
                family.batch_size = None;
            }
        }

        if let Some(workers) = self.workers {
            tracing::info!(workers, "Overriding worker count from CLI");
            config.engine.workers = workers;
            for family in &mut config.families {
                family.workers = None;
            }
        }

        if let Some(limit) = self.limit {
            for family in &mut config.families {
                family.limit = Some(limit);
            }
        }

        if let Some(start_offset) = self.start_offset {
            tracing::info!(start_offset, "Forcing starting offset from CLI");
            config.engine.resume = false;
            for family in &mut config.families {
                family.start_offset = Some(start_offset);
            }
        }

        if self.no_resume {
            tracing::info!("Resume disabled from CLI");
            config.engine.resume = false;
        }

        if let Some(interval) = self.poll_interval {
            config.engine.poll_interval_seconds = Some(interval);
        }
        if self.once {
            config.engine.poll_interval_seconds = None;
            for family in &mut config.families {
                family.poll_interval_seconds = None;
            }
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }
        if config.enabled_families().count() == 0 {
            eprintln!("No enabled families to run");
            return Ok(2);
        }

        // Connect and bootstrap the target schema
        let client = Arc::new(PostgresClient::new(&config.database)?);
        client.test_connection().await?;
        client.ensure_schema().await?;

        let supervisor = Supervisor::new(
            client,
            FamilyRegistry::builtin(),
            Duration::from_secs(config.engine.restart_backoff_seconds),
        );

        let summaries = supervisor.run(&config, shutdown_signal).await?;

        println!();
        println!("Migration summary:");
        let mut any_failures = false;
        for summary in &summaries {
            any_failures |= !summary.is_successful();
            println!(
                "  {:<12} batches: {:<5} migrated: {:<7} skipped: {:<7} failed: {:<5} watermark: {}",
                summary.family.as_str(),
                summary.batches,
                summary.migrated,
                summary.already_migrated,
                summary.failed,
                summary.final_offset,
            );
        }

        Ok(if any_failures { 1 } else { 0 })
    }
}
