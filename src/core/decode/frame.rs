//! Fixed-frame curve decoding (Variant A)
//!
//! The fastening controllers dump their sample buffer verbatim: a header
//! region of controller state, then a dense run of 40-byte little-endian
//! frames. Each frame packs `i16 x2, f32 x8, i32 x1`, mapped positionally to
//! named channels. The decoder is lazy: frames are unpacked one at a time as
//! the iterator is driven.

use crate::core::decode::round4;
use crate::domain::errors::DecodeError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Byte length of one packed sample frame
pub const FRAME_LEN: usize = 40;

/// Family-specific frame layout descriptor.
///
/// Only the header length varies between controller generations; the frame
/// layout itself is fixed.
#[derive(Debug, Clone, Copy)]
pub struct FrameFormat {
    /// Byte offset where the first frame starts
    pub start_offset: usize,
}

impl FrameFormat {
    /// Layout used by the fastening controllers
    pub const FASTENING: FrameFormat = FrameFormat { start_offset: 7816 };
}

/// An opaque curve payload as read from the source column.
///
/// Older exports store the payload as a base64 text wrapper instead of raw
/// bytes; both are accepted.
#[derive(Debug, Clone)]
pub enum RawCurve {
    /// Raw binary payload
    Bytes(Vec<u8>),
    /// Legacy base64 text wrapper
    Text(String),
}

impl RawCurve {
    /// Unwrap into raw bytes, decoding the text wrapper when present.
    fn into_bytes(self) -> Result<Vec<u8>, DecodeError> {
        match self {
            RawCurve::Bytes(data) => Ok(data),
            RawCurve::Text(text) => BASE64
                .decode(text.trim())
                .map_err(|e| DecodeError::Wrapper(e.to_string())),
        }
    }
}

/// One decoded sample frame.
///
/// Float channels are rounded to 4 decimals; integer channels pass through.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    /// Spindle speed set-point (rpm)
    pub speed_set: i16,
    /// Actual spindle speed (rpm)
    pub speed_actual: i16,
    /// Torque (Nm)
    pub torque: f64,
    /// Filtered torque (Nm)
    pub torque_filtered: f64,
    /// Torque gradient
    pub torque_gradient: f64,
    /// Penetration depth (mm)
    pub depth: f64,
    /// Depth gradient
    pub depth_gradient: f64,
    /// Rotation angle (deg)
    pub angle: f64,
    /// Downforce pressure set-point
    pub pressure_set: f64,
    /// Actual downforce pressure
    pub pressure_actual: f64,
    /// Program step this sample belongs to
    pub step: i32,
}

/// Decode a fixed-frame payload into a lazy sample iterator.
///
/// A missing payload or one shorter than the header offset yields an empty
/// iterator - short payloads are routine for aborted executions, not errors.
/// Truncated trailing bytes are ignored, and a frame that unpacks to
/// non-finite floats is dropped individually without ending the decode.
///
/// # Errors
///
/// Returns [`DecodeError::Wrapper`] when a text-wrapped payload is not valid
/// base64.
pub fn decode_frames(
    payload: Option<RawCurve>,
    format: FrameFormat,
) -> Result<FrameIter, DecodeError> {
    let data = match payload {
        Some(raw) => raw.into_bytes()?,
        None => Vec::new(),
    };
    Ok(FrameIter::new(data, format))
}

/// Lazy iterator over the packed frames of one payload.
pub struct FrameIter {
    data: Vec<u8>,
    pos: usize,
}

impl FrameIter {
    fn new(data: Vec<u8>, format: FrameFormat) -> Self {
        // A payload that ends inside the header carries no samples at all.
        let pos = if data.len() <= format.start_offset {
            data.len()
        } else {
            format.start_offset
        };
        Self { data, pos }
    }

    /// Number of whole frames remaining
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos) / FRAME_LEN
    }
}

impl Iterator for FrameIter {
    type Item = FrameSample;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos + FRAME_LEN <= self.data.len() {
            let chunk = &self.data[self.pos..self.pos + FRAME_LEN];
            self.pos += FRAME_LEN;
            if let Some(sample) = unpack_frame(chunk) {
                return Some(sample);
            }
            // corrupt frame: skip it, keep decoding
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

fn read_i16(chunk: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([chunk[at], chunk[at + 1]])
}

fn read_f32(chunk: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([chunk[at], chunk[at + 1], chunk[at + 2], chunk[at + 3]])
}

fn read_i32(chunk: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([chunk[at], chunk[at + 1], chunk[at + 2], chunk[at + 3]])
}

/// Unpack one 40-byte frame; `None` when the frame carries non-finite floats.
fn unpack_frame(chunk: &[u8]) -> Option<FrameSample> {
    let floats = [
        read_f32(chunk, 4),
        read_f32(chunk, 8),
        read_f32(chunk, 12),
        read_f32(chunk, 16),
        read_f32(chunk, 20),
        read_f32(chunk, 24),
        read_f32(chunk, 28),
        read_f32(chunk, 32),
    ];
    if floats.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(FrameSample {
        speed_set: read_i16(chunk, 0),
        speed_actual: read_i16(chunk, 2),
        torque: round4(floats[0]),
        torque_filtered: round4(floats[1]),
        torque_gradient: round4(floats[2]),
        depth: round4(floats[3]),
        depth_gradient: round4(floats[4]),
        angle: round4(floats[5]),
        pressure_set: round4(floats[6]),
        pressure_actual: round4(floats[7]),
        step: read_i32(chunk, 36),
    })
}
