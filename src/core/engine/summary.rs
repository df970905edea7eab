//! Engine session summary and reporting

use crate::domain::ids::Family;
use std::time::Duration;

/// Summary of one engine session for a family.
#[derive(Debug, Clone)]
pub struct EngineSummary {
    /// Family this session ran for
    pub family: Family,

    /// Batches completed
    pub batches: usize,

    /// Items dispatched this session
    pub dispatched: usize,

    /// Items migrated this session
    pub migrated: usize,

    /// Items skipped as already migrated
    pub already_migrated: usize,

    /// Items that failed this session
    pub failed: usize,

    /// Watermark when the session ended
    pub final_offset: i64,

    /// Session duration
    pub duration: Duration,
}

impl EngineSummary {
    /// Create an empty summary for a family
    pub fn new(family: Family) -> Self {
        Self {
            family,
            batches: 0,
            dispatched: 0,
            migrated: 0,
            already_migrated: 0,
            failed: 0,
            final_offset: 0,
            duration: Duration::from_secs(0),
        }
    }

    /// Whether the session completed without item failures
    pub fn is_successful(&self) -> bool {
        self.failed == 0
    }

    /// Success rate as a percentage of dispatched items
    pub fn success_rate(&self) -> f64 {
        if self.dispatched == 0 {
            return 100.0;
        }
        ((self.dispatched - self.failed) as f64 / self.dispatched as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            family = %self.family,
            batches = self.batches,
            dispatched = self.dispatched,
            migrated = self.migrated,
            already_migrated = self.already_migrated,
            failed = self.failed,
            final_offset = self.final_offset,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Session completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_empty_summary_is_successful() {
        let summary = EngineSummary::new(Family::from_str("fastening").unwrap());
        assert!(summary.is_successful());
        assert_eq!(summary.success_rate(), 100.0);
    }

    #[test]
    fn test_success_rate() {
        let mut summary = EngineSummary::new(Family::from_str("fastening").unwrap());
        summary.dispatched = 10;
        summary.failed = 2;
        assert!(!summary.is_successful());
        assert_eq!(summary.success_rate(), 80.0);
    }
}
