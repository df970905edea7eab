//! Per-family engine loop
//!
//! The loop is the heart of the migration: fetch the next batch of offsets,
//! fan it out over the worker pool, join, fold the outcomes, advance the
//! watermark and rewrite the checkpoint. Batches never overlap - batch N's
//! checkpoint is persisted before batch N+1 is fetched.

use crate::config::schema::{EngineConfig, FamilyConfig, WatermarkPolicy};
use crate::core::engine::outcome::BatchStats;
use crate::core::engine::pool::run_batch;
use crate::core::engine::summary::EngineSummary;
use crate::core::family::FamilyPipeline;
use crate::core::state::{Checkpoint, CheckpointStore};
use crate::domain::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Resolved invocation parameters for one engine session.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Items fetched and dispatched per batch
    pub batch_size: usize,
    /// Concurrent workers
    pub workers: usize,
    /// Resume from the checkpoint file
    pub resume: bool,
    /// Forced starting offset when not resuming
    pub start_offset: Option<i64>,
    /// Stop after this many items in the session
    pub session_limit: Option<u64>,
    /// Sleep-and-retry interval for empty batches (continuous polling)
    pub poll_interval: Option<Duration>,
    /// Watermark advancement policy
    pub watermark_policy: WatermarkPolicy,
    /// Backoff after a failed batch enumeration
    pub fetch_retry: Duration,
}

impl EngineOptions {
    /// Resolve options from engine-wide defaults and a family's overrides.
    pub fn resolve(engine: &EngineConfig, family: &FamilyConfig) -> Self {
        Self {
            batch_size: family.batch_size.unwrap_or(engine.batch_size),
            workers: family.workers.unwrap_or(engine.workers),
            resume: engine.resume,
            start_offset: family.start_offset,
            session_limit: family.limit,
            poll_interval: family
                .poll_interval_seconds
                .or(engine.poll_interval_seconds)
                .map(Duration::from_secs),
            watermark_policy: family.watermark_policy.unwrap_or(engine.watermark_policy),
            fetch_retry: Duration::from_secs(engine.fetch_retry_seconds),
        }
    }
}

/// One family's migration engine.
pub struct Engine {
    pipeline: Arc<dyn FamilyPipeline>,
    store: CheckpointStore,
    options: EngineOptions,
    shutdown: watch::Receiver<bool>,
}

impl Engine {
    /// Create an engine for one family.
    pub fn new(
        pipeline: Arc<dyn FamilyPipeline>,
        store: CheckpointStore,
        options: EngineOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pipeline,
            store,
            options,
            shutdown,
        }
    }

    /// Run the engine loop until end-of-stream, the session limit, or a
    /// shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error only when the checkpoint cannot be persisted; item
    /// and fetch failures are absorbed into counters and retries.
    pub async fn run(mut self) -> Result<EngineSummary> {
        let family = self.pipeline.family().clone();
        let start = Instant::now();

        let mut checkpoint = self.store.load();
        let mut last_offset = if self.options.resume && checkpoint.last_offset > 0 {
            checkpoint.last_offset
        } else {
            self.options.start_offset.unwrap_or(0)
        };
        if !self.options.resume {
            checkpoint.reset_counters();
        }

        let mut summary = EngineSummary::new(family.clone());
        let mut session_items: u64 = 0;

        tracing::info!(
            family = %family,
            start_offset = last_offset,
            batch_size = self.options.batch_size,
            workers = self.options.workers,
            poll_interval = ?self.options.poll_interval,
            "Starting engine"
        );

        loop {
            if *self.shutdown.borrow() {
                tracing::info!(family = %family, "Shutdown signal received, stopping between batches");
                break;
            }

            if let Some(limit) = self.options.session_limit {
                if session_items >= limit {
                    tracing::info!(family = %family, limit, "Session item limit reached");
                    break;
                }
            }

            // 1. Enumerate the next batch
            let batch = match self
                .pipeline
                .next_batch(last_offset, self.options.batch_size as i64)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    // Fetch failures leave the watermark untouched and retry
                    tracing::warn!(family = %family, error = %e, "Batch fetch failed, backing off");
                    if self.sleep_or_shutdown(self.options.fetch_retry).await {
                        break;
                    }
                    continue;
                }
            };

            // 2. Empty batch: end-of-stream or poll
            if batch.is_empty() {
                match self.options.poll_interval {
                    Some(interval) => {
                        tracing::debug!(family = %family, interval_secs = interval.as_secs(), "No new data, sleeping");
                        if self.sleep_or_shutdown(interval).await {
                            break;
                        }
                        continue;
                    }
                    None => {
                        tracing::info!(family = %family, "No more data, finished");
                        break;
                    }
                }
            }

            // 3. Fork-join the batch
            let batch_len = batch.len();
            let batch_start = Instant::now();
            let stats = run_batch(Arc::clone(&self.pipeline), batch, self.options.workers).await;
            let elapsed = batch_start.elapsed();

            // 4. Advance the watermark and persist the checkpoint
            let watermark = stats.watermark(last_offset, self.options.watermark_policy);
            let advanced = watermark > last_offset;
            checkpoint.record_batch(watermark, stats.successes() as u64, stats.failed as u64);
            self.store.save(&checkpoint)?;
            last_offset = watermark;

            session_items += batch_len as u64;
            fold(&mut summary, &stats);
            log_batch(&family, &stats, &checkpoint, elapsed);

            // A held watermark re-enumerates the same failed offsets next
            // round; pace the retries instead of spinning.
            if !advanced && self.sleep_or_shutdown(self.options.fetch_retry).await {
                break;
            }
        }

        summary.final_offset = last_offset;
        summary.duration = start.elapsed();
        summary.log_summary();
        Ok(summary)
    }

    /// Sleep for `duration` unless shutdown fires first. Returns true when
    /// the engine should stop.
    async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = self.shutdown.changed() => match changed {
                Ok(()) => *self.shutdown.borrow(),
                // Sender gone means the process is tearing down
                Err(_) => true,
            },
        }
    }
}

fn fold(summary: &mut EngineSummary, stats: &BatchStats) {
    summary.batches += 1;
    summary.dispatched += stats.dispatched;
    summary.migrated += stats.migrated;
    summary.already_migrated += stats.already_migrated;
    summary.failed += stats.failed;
}

fn log_batch(
    family: &crate::domain::Family,
    stats: &BatchStats,
    checkpoint: &Checkpoint,
    elapsed: Duration,
) {
    let speed = if elapsed.as_secs_f64() > 0.0 {
        stats.dispatched as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    tracing::info!(
        family = %family,
        dispatched = stats.dispatched,
        migrated = stats.migrated,
        already_migrated = stats.already_migrated,
        failed = stats.failed,
        watermark = checkpoint.last_offset,
        total_success = checkpoint.success_count,
        total_failed = checkpoint.fail_count,
        elapsed_secs = format!("{:.2}", elapsed.as_secs_f64()),
        speed = format!("{speed:.1} rec/s"),
        "Batch done"
    );
}
