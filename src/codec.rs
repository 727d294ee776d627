// ============================================================================
// codec.rs — shader-fluid
// Packs bounded signed scalars into 8-bit texture channels and back.
// ============================================================================

/// Smallest usable encode range. Keeps the normalization division finite.
pub const MIN_RANGE: f32 = 1e-8;

/// The encoded zero. Decodes to within half a quantization step of zero,
/// since 255 levels have no exact center.
pub const ZERO_LEVEL: u8 = 128;

/// Encode `value` into a single channel, mapping `[-range, range]` linearly
/// onto `[0, 255]`. Values outside the range saturate.
///
/// Callers must pick `range >= max |value|` to avoid losing the field's
/// extremes to saturation.
pub fn encode(value: f32, range: f32) -> u8 {
    let range = range.max(MIN_RANGE);
    let clamped = value.clamp(-range, range);
    let normalized = ((clamped / range) * 0.5 + 0.5).clamp(0.0, 1.0);
    (normalized * 255.0).round() as u8
}

/// Inverse of [`encode`]. The advection shader performs the same arithmetic
/// in `decode_velocity`; the host only needs it to check that contract.
#[cfg(test)]
pub fn decode(channel: u8, range: f32) -> f32 {
    let range = range.max(MIN_RANGE);
    ((channel as f32 / 255.0) - 0.5) * 2.0 * range
}

/// Opaque grey texel carrying `channel` in R, G and B.
pub fn grey_texel(channel: u8) -> [u8; 4] {
    [channel, channel, channel, 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGES: [f32; 4] = [0.0001, 0.03, 1.0, 250.0];

    #[test]
    fn zero_encodes_to_midpoint() {
        for range in RANGES {
            assert_eq!(encode(0.0, range), ZERO_LEVEL);
        }
    }

    #[test]
    fn zero_level_decodes_within_half_a_step() {
        for range in RANGES {
            let half_step = range / 255.0;
            let back = decode(ZERO_LEVEL, range);
            assert!(back > 0.0, "range {range}: midpoint is not exact");
            assert!(back <= half_step * 1.0001, "range {range}: {back}");
        }
    }

    #[test]
    fn round_trip_within_one_step() {
        for range in RANGES {
            let step = range / 255.0;
            for i in 0..=1000 {
                let v = -range + 2.0 * range * (i as f32 / 1000.0);
                let back = decode(encode(v, range), range);
                assert!(
                    (back - v).abs() <= step * 1.0001,
                    "range {range}: {v} came back as {back}"
                );
            }
        }
    }

    #[test]
    fn saturates_outside_range() {
        let range = 0.03;
        assert_eq!(encode(0.5, range), encode(range, range));
        assert_eq!(encode(-7.0, range), encode(-range, range));
        assert_eq!(encode(range, range), 255);
        assert_eq!(encode(-range, range), 0);
    }

    #[test]
    fn monotonic_and_symmetric() {
        let range = 1.0;
        let mut prev = 0u8;
        for i in 0..=200 {
            let v = -1.0 + i as f32 / 100.0;
            let c = encode(v, range);
            assert!(c >= prev);
            prev = c;
            // Mirror pairs straddle the midpoint 127.5.
            let mirrored = encode(-v, range);
            assert!((c as i32 + mirrored as i32 - 255).abs() <= 1);
        }
    }

    #[test]
    fn zero_range_is_floored() {
        assert_eq!(encode(0.0, 0.0), ZERO_LEVEL);
        assert_eq!(encode(1.0, 0.0), 255);
        assert!(decode(255, 0.0).is_finite());
    }
}
