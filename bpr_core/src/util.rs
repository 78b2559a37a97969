//! Small numeric helpers shared by the control law and the actuator.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Round to nearest (ties away from zero) and saturate into `i32`.
/// Non-finite values (NaN/±Inf) map to 0.
#[inline]
pub fn round_to_i32(x: f32) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    let r = x.round();
    if r >= i32::MAX as f32 {
        i32::MAX
    } else if r <= i32::MIN as f32 {
        i32::MIN
    } else {
        r as i32
    }
}

/// Half-period in microseconds for a step rate, as f64 to keep the
/// slow end exact. Zero or non-finite rates return `f64::INFINITY`.
#[inline]
pub fn half_period_us(steps_per_sec: f32) -> f64 {
    let sps = f64::from(steps_per_sec.abs());
    if !sps.is_finite() || sps == 0.0 {
        return f64::INFINITY;
    }
    (MICROS_PER_SEC as f64 / 2.0 / sps).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_ties_away_from_zero() {
        assert_eq!(round_to_i32(2.5), 3);
        assert_eq!(round_to_i32(-2.5), -3);
        assert_eq!(round_to_i32(8.33), 8);
    }

    #[test]
    fn saturates_and_zeroes_non_finite() {
        assert_eq!(round_to_i32(1e12), i32::MAX);
        assert_eq!(round_to_i32(-1e12), i32::MIN);
        assert_eq!(round_to_i32(f32::NAN), 0);
    }

    #[test]
    fn half_period_matches_rate() {
        assert_eq!(half_period_us(40.0), 12_500.0);
        assert_eq!(half_period_us(-40.0), 12_500.0);
        assert!(half_period_us(0.0).is_infinite());
    }
}
