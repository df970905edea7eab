//! Family supervisor
//!
//! Spawns one cancellable engine task per enabled family and observes their
//! completion through a JoinSet. A crashed engine is respawned after a fixed
//! backoff; respawns always resume from the checkpoint so no completed batch
//! is redone. Shutdown reaches every engine through the shared watch channel
//! and takes effect between batches.

use crate::adapters::postgres::PostgresClient;
use crate::config::schema::AnvilConfig;
use crate::core::engine::{Engine, EngineOptions, EngineSummary};
use crate::core::family::{FamilyPipeline, FamilyRegistry};
use crate::core::state::CheckpointStore;
use crate::domain::ids::Family;
use crate::domain::{AnvilError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Supervisor for the configured family engines.
pub struct Supervisor {
    client: Arc<PostgresClient>,
    registry: FamilyRegistry,
    restart_backoff: Duration,
}

impl Supervisor {
    /// Create a supervisor over a shared connection pool and registry.
    pub fn new(
        client: Arc<PostgresClient>,
        registry: FamilyRegistry,
        restart_backoff: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            restart_backoff,
        }
    }

    /// Run every enabled family until completion or shutdown.
    ///
    /// Families run independently: one family finishing (or crashing and
    /// being respawned) never affects the others. Returns the summaries of
    /// the families that completed normally.
    ///
    /// # Errors
    ///
    /// Returns an error when a family cannot be constructed - unknown kind
    /// or invalid name. Runtime engine errors are handled by respawning.
    pub async fn run(
        &self,
        config: &AnvilConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<EngineSummary>> {
        // Construct every pipeline before spawning anything, so one bad
        // family config cannot abort engines that already started.
        let mut prepared = Vec::new();
        for family_config in config.enabled_families() {
            let family =
                Family::new(family_config.name.clone()).map_err(AnvilError::Configuration)?;
            let pipeline = self.registry.create(
                &family_config.kind,
                Arc::clone(&self.client),
                family.clone(),
            )?;
            let options = EngineOptions::resolve(&config.engine, family_config);
            prepared.push((family_config, family, pipeline, options));
        }

        let mut tasks: JoinSet<(String, Result<EngineSummary>)> = JoinSet::new();
        for (family_config, family, pipeline, options) in prepared {
            tracing::info!(
                family = %family,
                kind = %family_config.kind,
                checkpoint = %family_config.checkpoint_path(),
                "Launching family engine"
            );

            tasks.spawn(supervise(
                family_config.name.clone(),
                family,
                pipeline,
                family_config.checkpoint_path(),
                options,
                self.restart_backoff,
                shutdown.clone(),
            ));
        }

        let mut summaries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(summary))) => summaries.push(summary),
                Ok((name, Err(e))) => {
                    tracing::error!(family = %name, error = %e, "Family ended with error");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Family task panicked");
                }
            }
        }
        Ok(summaries)
    }
}

/// Restart-on-crash loop for one family.
async fn supervise(
    name: String,
    family: Family,
    pipeline: Arc<dyn FamilyPipeline>,
    checkpoint_path: String,
    mut options: EngineOptions,
    backoff: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (String, Result<EngineSummary>) {
    loop {
        let store = CheckpointStore::new(&checkpoint_path, family.clone());
        let engine = Engine::new(
            Arc::clone(&pipeline),
            store,
            options.clone(),
            shutdown.clone(),
        );

        match engine.run().await {
            Ok(summary) => return (name, Ok(summary)),
            Err(e) => {
                tracing::error!(family = %family, error = %e, "Engine crashed");
                if *shutdown.borrow() {
                    return (name, Err(e));
                }

                tracing::info!(
                    family = %family,
                    backoff_secs = backoff.as_secs(),
                    "Respawning engine after backoff"
                );
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return (name, Err(e));
                        }
                    }
                }
                // A respawn picks up where the checkpoint left off even when
                // the session was configured to start fresh.
                options.resume = true;
            }
        }
    }
}
