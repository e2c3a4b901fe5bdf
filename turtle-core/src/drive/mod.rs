//! Differential drive
//!
//! Kinematics, odometry and the two-wheel motion engine.

pub mod diffdrive;
pub mod kinematics;
pub mod pose;

pub use diffdrive::{DiffDrive, DriveConfig};
pub use kinematics::{Kinematics, STEPS_PER_REV};
pub use pose::{Pose, PoseReport};
