//! Record family pipelines
//!
//! Each family owns its decoder variant, source queries and normalization
//! rules behind the common [`FamilyPipeline`] capability trait. Families are
//! constructed through the explicit [`FamilyRegistry`].

pub mod fastening;
pub mod registry;
pub mod riveting;
pub mod traits;

pub use fastening::FasteningPipeline;
pub use registry::{FamilyRegistry, PipelineCtor};
pub use riveting::RivetingPipeline;
pub use traits::FamilyPipeline;

use chrono::{DateTime, Duration, Utc};

/// Shift a timestamp forward by a fractional number of seconds.
pub(crate) fn offset_time(start: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    start + Duration::microseconds((seconds * 1_000_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_offset_time_fractional_seconds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let shifted = offset_time(start, 1.5);
        assert_eq!((shifted - start).num_milliseconds(), 1500);
    }

    #[test]
    fn test_offset_time_zero() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(offset_time(start, 0.0), start);
    }
}
