//! Linear raw-to-physical sensor calibration.

/// `physical = raw * m + q`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorCalibration {
    pub m: f32,
    pub q: f32,
}

impl Default for SensorCalibration {
    fn default() -> Self {
        Self {
            m: 0.0489,
            q: -1.955,
        }
    }
}

impl SensorCalibration {
    pub fn new(m: f32, q: f32) -> Self {
        Self { m, q }
    }

    pub fn to_physical(&self, raw: u16) -> f32 {
        f32::from(raw) * self.m + self.q
    }

    /// Solve the line through two `(raw, physical)` samples.
    ///
    /// Returns `None` when both samples share the same raw value or the
    /// result is not finite.
    pub fn from_points(p1: CalibrationPoint, p2: CalibrationPoint) -> Option<Self> {
        if p1.raw == p2.raw {
            return None;
        }
        let dr = f32::from(p2.raw) - f32::from(p1.raw);
        let m = (p2.value - p1.value) / dr;
        let q = p2.value - m * f32::from(p2.raw);
        (m.is_finite() && q.is_finite()).then_some(Self { m, q })
    }
}

/// A raw reading paired with the physical value it represents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub raw: u16,
    pub value: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_maps_full_scale() {
        let c = SensorCalibration::default();
        assert!(c.to_physical(40).abs() < 0.01);
        assert!((c.to_physical(1023) - 48.07).abs() < 0.05);
    }

    #[test]
    fn degenerate_pair_is_rejected() {
        let p = CalibrationPoint {
            raw: 512,
            value: 1.0,
        };
        let q = CalibrationPoint {
            raw: 512,
            value: 3.0,
        };
        assert!(SensorCalibration::from_points(p, q).is_none());
    }
}
