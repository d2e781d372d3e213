use crate::config::TrackerConfig;
use log::debug;
use nalgebra::Vector2;

/// Classifies accelerometer readings against the rollover cone.
///
/// The cone lives in acceleration space with its apex at `z = min_accel` and
/// opens toward `z = max_accel`. The IMU is mounted so the vertical axis
/// reads about `+g` upright, which is outside the band. On the roof it reads
/// near `-g` with little lateral load and falls inside the cone.
#[derive(Debug, Clone, Copy)]
pub struct RolloverDetector {
    min_accel: f64,
    max_accel: f64,
    sensitivity: f64,
    cone_coeff: f64,
}

impl RolloverDetector {
    pub fn new(min_accel: f64, max_accel: f64, sensitivity: f64) -> Self {
        Self {
            min_accel,
            max_accel,
            sensitivity,
            cone_coeff: min_accel / (max_accel - min_accel),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.min_accel, config.max_accel, config.sensitivity)
    }

    /// Cone radius at height `z`
    pub fn radius_at(&self, z: f64) -> f64 {
        (self.cone_coeff * (z - self.min_accel) * self.sensitivity).abs()
    }

    pub fn classify(&self, accel: [f64; 3]) -> bool {
        let [x, y, z] = accel;
        if z < self.min_accel || z > self.max_accel {
            return false;
        }

        let r = self.radius_at(z);
        let dist_from_axis = Vector2::new(x, y).norm();
        debug!(
            "cone radius {:.3} at z={:.3}, point ({:.3},{:.3}) is {:.3} off axis",
            r, z, x, y, dist_from_axis
        );
        dist_from_axis <= r
    }
}

/// Hysteresis counter for sustained rollover.
///
/// Counts up while samples are in the cone, down otherwise, and never leaves
/// `0..=threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollState {
    consecutive_roll_seconds: u32,
    threshold: u32,
}

impl RollState {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_roll_seconds: 0,
            threshold,
        }
    }

    pub fn count(&self) -> u32 {
        self.consecutive_roll_seconds
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn at_threshold(&self) -> bool {
        self.consecutive_roll_seconds >= self.threshold
    }

    /// Apply one sample. Returns true only on the tick the counter climbs
    /// onto the threshold; staying saturated does not re-trigger.
    pub fn update(&mut self, in_cone: bool) -> bool {
        let before = self.consecutive_roll_seconds;
        if in_cone {
            self.consecutive_roll_seconds = (before + 1).min(self.threshold);
        } else {
            self.consecutive_roll_seconds = before.saturating_sub(1);
        }
        before < self.threshold && self.consecutive_roll_seconds == self.threshold
    }
}
