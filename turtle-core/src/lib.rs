//! Board-agnostic motion core for the turtle robot firmware
//!
//! This crate contains all motion logic that does not depend on
//! specific hardware implementations:
//!
//! - Pulse emitter abstraction and PIO timing math
//! - Velocity profile planning (trapezoidal ramps)
//! - Per-wheel stepper streaming and step accounting
//! - Differential-drive kinematics and odometry
//! - Drive settings (calibration and motion limits)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod drive;
pub mod error;
pub mod motion;
pub mod pulse;
pub mod stepper;
pub mod traits;

pub use error::{ConfigError, DriveError, EmitterError, StepperError};
