//! Axis calibration and tracked position state.
//!
//! Each rotational arm of the goniometer is an open-loop stepper axis. The
//! only absolute reference is the limit switch found during homing, so every
//! position here is a signed step count relative to that calibrated origin.
//! Conversion between angles and steps is pure arithmetic with no I/O;
//! callers are responsible for checking limits before committing a move.

use crate::error::{ArspecError, Result};
use std::fmt;

/// One physical rotational degree of freedom (sample arm or detector arm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Sample arm.
    X,
    /// Detector arm.
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
        }
    }
}

/// Per-axis conversion factors and motion limits.
///
/// Measured once per hardware setup and immutable afterwards. The hard limit
/// interval is the absolute step range beyond which motion must never be
/// commanded; the soft limit is the conservative angle inside it used as the
/// canonical home reference.
#[derive(Debug, Clone)]
pub struct AxisCalibration {
    steps_per_degree: f64,
    home_offset_steps: i32,
    soft_limit_degrees: f64,
    hard_limit_steps: (i32, i32),
}

impl AxisCalibration {
    /// Builds a calibration, validating its invariants.
    ///
    /// Hard limits are given in degrees and converted once; the low bound
    /// must map strictly below the high bound and the soft limit must map
    /// inside the interval.
    pub fn new(
        steps_per_degree: f64,
        home_offset_steps: i32,
        soft_limit_degrees: f64,
        hard_limit_degrees: (f64, f64),
    ) -> Result<Self> {
        if !steps_per_degree.is_finite() || steps_per_degree <= 0.0 {
            return Err(ArspecError::Configuration(format!(
                "steps_per_degree must be positive, got {steps_per_degree}"
            )));
        }

        let low = (hard_limit_degrees.0 * steps_per_degree).round() as i32;
        let high = (hard_limit_degrees.1 * steps_per_degree).round() as i32;
        if low >= high {
            return Err(ArspecError::Configuration(format!(
                "hard limit interval is empty: [{low}, {high}] steps"
            )));
        }

        let soft = (soft_limit_degrees * steps_per_degree).round() as i32;
        if soft < low || soft > high {
            return Err(ArspecError::Configuration(format!(
                "soft limit {soft_limit_degrees} deg ({soft} steps) falls outside hard limits [{low}, {high}]"
            )));
        }

        Ok(Self {
            steps_per_degree,
            home_offset_steps,
            soft_limit_degrees,
            hard_limit_steps: (low, high),
        })
    }

    /// Converts an angle to the nearest whole step count.
    pub fn angle_to_steps(&self, degrees: f64) -> i32 {
        (degrees * self.steps_per_degree).round() as i32
    }

    /// Converts a step count back to an angle.
    pub fn steps_to_angle(&self, steps: i32) -> f64 {
        f64::from(steps) / self.steps_per_degree
    }

    /// Inclusive range check against the hard step limits.
    pub fn within_hard_limits(&self, steps: i32) -> bool {
        let (low, high) = self.hard_limit_steps;
        (low..=high).contains(&steps)
    }

    /// Angular value of a single step.
    pub fn degrees_per_step(&self) -> f64 {
        1.0 / self.steps_per_degree
    }

    /// Signed step count from the limit-switch trigger point to the origin.
    pub fn home_offset_steps(&self) -> i32 {
        self.home_offset_steps
    }

    /// Canonical home angle.
    pub fn soft_limit_degrees(&self) -> f64 {
        self.soft_limit_degrees
    }

    /// Step count of the canonical home angle.
    pub fn soft_limit_steps(&self) -> i32 {
        self.angle_to_steps(self.soft_limit_degrees)
    }

    /// The `(low, high)` hard limit interval in steps.
    pub fn hard_limit_steps(&self) -> (i32, i32) {
        self.hard_limit_steps
    }
}

/// Tracked position of one axis.
///
/// `position_steps` is authoritative; `angle_degrees` is the cached
/// conversion. Mutated only at commit points (a successful move, home, or
/// position-set), never speculatively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisState {
    /// Signed step count since the last successful home or position-set.
    pub position_steps: i32,
    /// Cached angle corresponding to `position_steps`.
    pub angle_degrees: f64,
}

impl AxisState {
    /// State at the step origin.
    pub fn zero() -> Self {
        Self {
            position_steps: 0,
            angle_degrees: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal() -> AxisCalibration {
        // The measured goniometer gearing: (9680 * 2) steps over 160 degrees.
        AxisCalibration::new(121.0, -10720, 10.0, (10.0, 90.0)).unwrap()
    }

    #[test]
    fn converts_known_angles() {
        let cal = cal();
        assert_eq!(cal.angle_to_steps(10.0), 1210);
        assert_eq!(cal.angle_to_steps(90.0), 10890);
        assert_eq!(cal.angle_to_steps(-10.0), -1210);
        assert!((cal.steps_to_angle(1210) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn round_trip_is_within_one_step() {
        let cal = cal();
        for &angle in &[0.0, 10.0, 33.333, 45.004, 89.996, -12.7] {
            let back = cal.steps_to_angle(cal.angle_to_steps(angle));
            assert!(
                (back - angle).abs() < cal.degrees_per_step(),
                "angle {angle} round-tripped to {back}"
            );
        }
    }

    #[test]
    fn hard_limits_are_inclusive() {
        let cal = cal();
        let (low, high) = cal.hard_limit_steps();
        assert!(cal.within_hard_limits(low));
        assert!(cal.within_hard_limits(high));
        assert!(!cal.within_hard_limits(low - 1));
        assert!(!cal.within_hard_limits(high + 1));
    }

    #[test]
    fn soft_limit_maps_inside_hard_limits() {
        let cal = cal();
        assert!(cal.within_hard_limits(cal.soft_limit_steps()));
    }

    #[test]
    fn rejects_empty_hard_limit_interval() {
        let result = AxisCalibration::new(121.0, 0, 10.0, (90.0, 10.0));
        assert!(matches!(result, Err(ArspecError::Configuration(_))));
    }

    #[test]
    fn rejects_soft_limit_outside_hard_limits() {
        let result = AxisCalibration::new(121.0, 0, 5.0, (10.0, 90.0));
        assert!(matches!(result, Err(ArspecError::Configuration(_))));
    }

    #[test]
    fn rejects_nonpositive_steps_per_degree() {
        assert!(AxisCalibration::new(0.0, 0, 10.0, (10.0, 90.0)).is_err());
        assert!(AxisCalibration::new(-121.0, 0, 10.0, (10.0, 90.0)).is_err());
    }
}
