//! Wheel geometry conversions
//!
//! Converts robot-level distances, angles and speeds into wheel steps and
//! pulse rates, and executed steps back into wheel travel.

use core::f32::consts::PI;

use crate::config::Calibration;
use crate::error::ConfigError;

/// Full steps (with microstepping) per wheel revolution on the turtle board
pub const STEPS_PER_REV: u32 = 800;

/// Step/distance conversion for one calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    steps_per_rev: u32,
    calibration: Calibration,
    steps_per_um: f32,
}

impl Kinematics {
    /// Create a conversion from validated calibration
    pub fn new(steps_per_rev: u32, calibration: Calibration) -> Result<Self, ConfigError> {
        calibration.validate()?;
        if steps_per_rev == 0 {
            return Err(ConfigError::InvalidCalibration);
        }

        let circumference_um = PI * calibration.wheel_diameter_um as f32;
        Ok(Self {
            steps_per_rev,
            calibration,
            steps_per_um: steps_per_rev as f32 / circumference_um,
        })
    }

    /// Steps per wheel revolution
    pub fn steps_per_rev(&self) -> u32 {
        self.steps_per_rev
    }

    /// Calibration this conversion was built from
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Wheel steps per micrometre of travel
    pub fn steps_per_um(&self) -> f32 {
        self.steps_per_um
    }

    /// Axel distance in micrometres
    pub fn axel_um(&self) -> f32 {
        self.calibration.axel_distance_um as f32
    }

    /// Steps for a wheel travel distance (sign ignored, rounded to nearest)
    pub fn distance_to_steps(&self, distance_um: f32) -> u32 {
        let steps = libm::roundf(libm::fabsf(distance_um) * self.steps_per_um);
        if steps >= u32::MAX as f32 {
            u32::MAX
        } else {
            steps as u32
        }
    }

    /// Wheel travel for a step count
    pub fn steps_to_distance(&self, steps: u64) -> f32 {
        steps as f32 / self.steps_per_um
    }

    /// Per-wheel arc length for an in-place rotation
    pub fn rotation_arc_um(&self, angle_deg: f32) -> f32 {
        self.axel_um() / 2.0 * angle_deg.to_radians()
    }

    /// Pulse rate for a wheel speed (or acceleration), at least 1
    pub fn speed_to_rate(&self, umps: f32) -> u32 {
        let rate = libm::roundf(libm::fabsf(umps) * self.steps_per_um);
        if rate < 1.0 {
            1
        } else if rate >= u32::MAX as f32 {
            u32::MAX
        } else {
            rate as u32
        }
    }
}
