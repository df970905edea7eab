//! Checkpoint model for crash-resumable progress tracking
//!
//! A checkpoint captures one family's migration watermark plus its running
//! success/fail counters. It is process-wide state, not part of the business
//! schema: created on first run, read then overwritten once per batch, and
//! never deleted by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted per-family progress state.
///
/// The watermark (`last_offset`) is the highest offset known to be fully
/// dispatched - not necessarily fully succeeded; failed items show up in
/// `fail_count` so operators can start a fresh pass when needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Highest offset whose batch has completed its join barrier
    pub last_offset: i64,

    /// When the checkpoint was last written
    pub last_time: Option<DateTime<Utc>>,

    /// Items migrated (or already present) across all resumed sessions
    pub success_count: u64,

    /// Items that failed across all resumed sessions
    pub fail_count: u64,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            last_offset: 0,
            last_time: None,
            success_count: 0,
            fail_count: 0,
        }
    }
}

impl Checkpoint {
    /// Fold one completed batch into the checkpoint.
    ///
    /// `watermark` must already honor the configured watermark policy; the
    /// checkpoint only guarantees monotonicity.
    pub fn record_batch(&mut self, watermark: i64, successes: u64, failures: u64) {
        debug_assert!(watermark >= self.last_offset, "watermark must not regress");
        self.last_offset = self.last_offset.max(watermark);
        self.success_count += successes;
        self.fail_count += failures;
        self.last_time = Some(Utc::now());
    }

    /// Reset the counters, keeping the watermark.
    ///
    /// Used when a session starts without `resume` so the counters reflect
    /// the fresh pass only.
    pub fn reset_counters(&mut self) {
        self.success_count = 0;
        self.fail_count = 0;
    }

    /// Total items accounted for by this checkpoint
    pub fn total_count(&self) -> u64 {
        self.success_count + self.fail_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zeroed() {
        let cp = Checkpoint::default();
        assert_eq!(cp.last_offset, 0);
        assert_eq!(cp.success_count, 0);
        assert_eq!(cp.fail_count, 0);
        assert!(cp.last_time.is_none());
    }

    #[test]
    fn test_record_batch_accumulates() {
        let mut cp = Checkpoint::default();
        cp.record_batch(9, 3, 1);
        cp.record_batch(17, 4, 0);

        assert_eq!(cp.last_offset, 17);
        assert_eq!(cp.success_count, 7);
        assert_eq!(cp.fail_count, 1);
        assert_eq!(cp.total_count(), 8);
        assert!(cp.last_time.is_some());
    }

    #[test]
    fn test_watermark_monotonic() {
        let mut cp = Checkpoint::default();
        cp.record_batch(50, 1, 0);
        // A same-watermark batch (all items failed under hold-on-failure)
        // must not regress the offset.
        cp.record_batch(50, 0, 2);
        assert_eq!(cp.last_offset, 50);
        assert_eq!(cp.fail_count, 2);
    }

    #[test]
    fn test_reset_counters_keeps_watermark() {
        let mut cp = Checkpoint::default();
        cp.record_batch(100, 10, 2);
        cp.reset_counters();

        assert_eq!(cp.last_offset, 100);
        assert_eq!(cp.success_count, 0);
        assert_eq!(cp.fail_count, 0);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut cp = Checkpoint::default();
        cp.record_batch(1234, 5, 1);

        let json = serde_json::to_string(&cp).unwrap();
        assert!(json.contains("last_offset"));
        assert!(json.contains("1234"));

        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
    }
}
