//! Typed per-item outcomes and batch accounting
//!
//! Item processing never signals through exceptions/panics: each worker
//! returns an [`ItemOutcome`] and the join barrier folds them into
//! [`BatchStats`], which also computes the watermark the checkpoint advances
//! to under the configured policy.

use crate::config::WatermarkPolicy;

/// Outcome of processing one source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The record was normalized and committed
    Migrated,
    /// A result for this natural key already existed; nothing was written
    AlreadyMigrated,
    /// The record could not be migrated; the aggregate was rolled back
    Failed(String),
}

impl ItemOutcome {
    /// Whether this outcome counts as a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failed(_))
    }
}

/// Folded results of one batch after the join barrier.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Items dispatched in the batch
    pub dispatched: usize,
    /// Items migrated this batch
    pub migrated: usize,
    /// Items skipped as already migrated
    pub already_migrated: usize,
    /// Items that failed
    pub failed: usize,
    /// Failure reasons, keyed by offset
    pub errors: Vec<(i64, String)>,
    /// Highest offset seen in the batch
    max_offset: Option<i64>,
    /// Lowest failed offset, when any item failed
    min_failed_offset: Option<i64>,
}

impl BatchStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed item into the stats.
    pub fn record(&mut self, offset: i64, outcome: ItemOutcome) {
        self.dispatched += 1;
        self.max_offset = Some(self.max_offset.map_or(offset, |m| m.max(offset)));

        match outcome {
            ItemOutcome::Migrated => self.migrated += 1,
            ItemOutcome::AlreadyMigrated => self.already_migrated += 1,
            ItemOutcome::Failed(reason) => {
                self.failed += 1;
                self.min_failed_offset =
                    Some(self.min_failed_offset.map_or(offset, |m| m.min(offset)));
                self.errors.push((offset, reason));
            }
        }
    }

    /// Items that completed without failure (migrated or already present)
    pub fn successes(&self) -> usize {
        self.migrated + self.already_migrated
    }

    /// Compute the new watermark given the previous one and the policy.
    ///
    /// The watermark never regresses. Under hold-on-failure, a batch with
    /// failures advances only to just below its lowest failed offset so the
    /// next enumeration revisits the failures; otherwise the batch's maximum
    /// offset wins regardless of item outcomes.
    pub fn watermark(&self, previous: i64, policy: WatermarkPolicy) -> i64 {
        let Some(max_offset) = self.max_offset else {
            return previous;
        };

        let candidate = match (policy, self.min_failed_offset) {
            (WatermarkPolicy::HoldOnFailure, Some(min_failed)) => min_failed - 1,
            _ => max_offset,
        };
        candidate.max(previous)
    }
}
