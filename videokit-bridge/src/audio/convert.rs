//! PCM sample conversion
//!
//! Straight linear scale from signed 16-bit to f32. No dithering, no
//! resampling, no channel remapping.

/// Divisor mapping `i16::MAX` to exactly 1.0
pub const S16_SCALE: f32 = i16::MAX as f32;

/// Convert one S16 sample to f32 in [-1.0, 1.0]
///
/// `i16::MIN / i16::MAX` is slightly below -1.0, so it is clamped.
#[inline]
pub fn s16_to_f32(sample: i16) -> f32 {
    (sample as f32 / S16_SCALE).max(-1.0)
}

/// Convert `samples` native-endian S16 values from `raw` into `out`
///
/// `out` is cleared first and reused across calls. Returns the number of
/// samples converted, which is `samples` unless `raw` is shorter than
/// `samples * 2` bytes.
pub fn convert_s16_ne(raw: &[u8], samples: usize, out: &mut Vec<f32>) -> usize {
    out.clear();
    out.extend(
        raw.chunks_exact(2)
            .take(samples)
            .map(|pair| s16_to_f32(i16::from_ne_bytes([pair[0], pair[1]]))),
    );
    out.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    #[test]
    fn test_extremes_map_into_unit_range() {
        assert_eq!(s16_to_f32(0), 0.0);
        assert_eq!(s16_to_f32(i16::MAX), 1.0);
        assert_eq!(s16_to_f32(-i16::MAX), -1.0);
        assert_eq!(s16_to_f32(i16::MIN), -1.0);
    }

    #[test]
    fn test_convert_preserves_count_and_order() {
        let raw = to_bytes(&[0, 16384, -16384, i16::MAX, i16::MIN]);
        let mut out = Vec::new();

        assert_eq!(convert_s16_ne(&raw, 5, &mut out), 5);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-4);
        assert!((out[2] + 0.5).abs() < 1e-4);
        assert_eq!(out[3], 1.0);
        assert_eq!(out[4], -1.0);
    }

    #[test]
    fn test_all_values_stay_in_range() {
        let all: Vec<i16> = (i16::MIN..=i16::MAX).step_by(7).collect();
        let raw = to_bytes(&all);
        let mut out = Vec::new();

        assert_eq!(convert_s16_ne(&raw, all.len(), &mut out), all.len());
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_short_buffer_converts_what_is_there() {
        let raw = to_bytes(&[1, 2, 3]);
        let mut out = vec![9.0; 10];

        assert_eq!(convert_s16_ne(&raw, 8, &mut out), 3);
        assert_eq!(out.len(), 3);
    }
}
