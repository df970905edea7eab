//! Curve payload decoding
//!
//! Legacy records embed their measurement curves as opaque binary payloads in
//! one denormalized column. Two format variants exist:
//!
//! - [`frame`] - fixed-width packed sample frames starting at a known byte
//!   offset, one embedded step index per frame
//! - [`packed`] - a gzip-compressed homogeneous array of 32-bit floats with
//!   no time axis; timestamps are synthesized from the execution duration
//!
//! Every decode failure is a [`crate::domain::DecodeError`]: the caller
//! treats the record as curve-less rather than failing the pipeline.

pub mod frame;
pub mod packed;

pub use frame::{decode_frames, FrameFormat, FrameIter, FrameSample, RawCurve};
pub use packed::{decode_packed, time_axis};

/// Round to 4 decimal places, the precision the source system records.
pub(crate) fn round4(value: f32) -> f64 {
    (f64::from(value) * 10_000.0).round() / 10_000.0
}

/// Round to 6 decimal places, used for synthesized time axes.
pub(crate) fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
