//! Motion planning and command types
//!
//! Velocity profiles for pulse trains, and the command/reply interface
//! between the command dispatch layer and the motion task.

pub mod command;
pub mod profile;

pub use command::{MotionCommand, MotionReply};
pub use profile::{VelocityProfile, VelocitySegment, MAX_SEGMENTS, RAMP_LEVELS};
