//! Compressed float-array curve decoding (Variant B)
//!
//! The riveting controllers store each graph as a gzip-compressed dense array
//! of little-endian 32-bit floats. No time axis is embedded: timestamps are
//! synthesized by evenly spacing the samples across the execution duration.

use crate::core::decode::{round4, round6};
use crate::domain::errors::DecodeError;
use flate2::read::GzDecoder;
use std::io::Read;

/// Decode a compressed uniform float array into sample values.
///
/// Values are rounded to 4 decimals. Trailing bytes that do not fill a whole
/// float are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::Decompress`] when the payload is not valid gzip.
pub fn decode_packed(payload: &[u8]) -> Result<Vec<f64>, DecodeError> {
    let mut decoder = GzDecoder::new(payload);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::Decompress(e.to_string()))?;

    let values = decompressed
        .chunks_exact(4)
        .map(|chunk| {
            let raw = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            round4(raw)
        })
        .collect();
    Ok(values)
}

/// Synthesize a time axis for `num_points` samples spanning `total_duration`
/// seconds.
///
/// The first timestamp is always 0.0 and the last equals the duration. For a
/// single point (or none) only a zero timestamp is emitted; a non-positive
/// duration falls back to a 1 ms spacing so the axis stays strictly
/// increasing.
pub fn time_axis(num_points: usize, total_duration: f64) -> Vec<f64> {
    if num_points <= 1 {
        return vec![0.0];
    }
    let dt = if total_duration > 0.0 {
        total_duration / (num_points - 1) as f64
    } else {
        0.001
    };
    (0..num_points).map(|i| round6(i as f64 * dt)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip_floats(values: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_known_values() {
        let payload = gzip_floats(&[1.5, -2.25, 100.123456]);
        let values = decode_packed(&payload).unwrap();
        assert_eq!(values, vec![1.5, -2.25, 100.1235]);
    }

    #[test]
    fn test_decode_empty_array() {
        let payload = gzip_floats(&[]);
        let values = decode_packed(&payload).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_decode_ignores_trailing_partial_float() {
        let mut bytes = 1.0f32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0x01, 0x02]); // half a float
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let payload = encoder.finish().unwrap();

        let values = decode_packed(&payload).unwrap();
        assert_eq!(values, vec![1.0]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_packed(b"definitely not gzip");
        assert!(matches!(result, Err(DecodeError::Decompress(_))));
    }

    #[test]
    fn test_time_axis_even_spacing() {
        let axis = time_axis(5, 2.0);
        assert_eq!(axis, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_time_axis_single_point() {
        assert_eq!(time_axis(1, 10.0), vec![0.0]);
        assert_eq!(time_axis(0, 10.0), vec![0.0]);
    }

    #[test]
    fn test_time_axis_zero_duration_fallback() {
        let axis = time_axis(3, 0.0);
        assert_eq!(axis, vec![0.0, 0.001, 0.002]);
    }

    #[test]
    fn test_time_axis_spans_duration() {
        let n = 250;
        let duration = 3.7;
        let axis = time_axis(n, duration);
        assert_eq!(axis.len(), n);
        assert_eq!(axis[0], 0.0);
        assert!((axis[n - 1] - duration).abs() < 1e-6);
        for pair in axis.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }
}
