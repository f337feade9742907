//! Mapping from `[-1, 1]` samples to the sink's unsigned 8-bit representation.

/// Mid-scale value, written by the device callback when no buffer is ready.
pub const SILENCE_U8: u8 = 128;

/// `round((s + 1) / 2 * 255)`, clamped to the representable range.
#[inline]
pub fn encode_u8(sample: f64) -> u8 {
    ((sample + 1.0) / 2.0 * 255.0).round().clamp(0.0, 255.0) as u8
}
