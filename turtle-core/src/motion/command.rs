//! Motion task command interface
//!
//! The dispatch layer converts user units (millimetres) into micrometres
//! and sends one of these commands to the motion task. Every command gets
//! exactly one reply.

use crate::config::DriveSettings;
use crate::drive::PoseReport;

/// Command sent to the motion task
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionCommand {
    /// Drive forward by a distance (µm)
    Forward(u32),
    /// Drive backward by a distance (µm)
    Backward(u32),
    /// Turn counter-clockwise in place (degrees)
    Left(f32),
    /// Turn clockwise in place (degrees)
    Right(f32),
    /// Trace an arc, curving left for positive extent
    Circle { radius_um: u32, extent_deg: f32 },
    /// Turn to an absolute heading (degrees)
    SetHeading(f32),
    /// Drive to an x coordinate, keeping y (µm)
    SetX(i64),
    /// Drive to a y coordinate, keeping x (µm)
    SetY(i64),
    /// Drive to a point (µm)
    SetPosition { x_um: i64, y_um: i64 },
    /// Turn to face a point (µm)
    Towards { x_um: i64, y_um: i64 },
    /// Make the current position the origin
    ResetOrigin,
    /// Enable or disable the motor drivers
    Enable(bool),

    /// Read the current pose
    GetPose,
    /// Read the current heading
    GetHeading,
    /// Read the current position
    GetPosition,

    /// Set linear cruise speed (µm/s) and acceleration (µm/s²)
    SetLinearVelocity { speed_umps: u32, accel_umpss: u32 },
    /// Set rotational wheel cruise speed (µm/s) and acceleration (µm/s²)
    SetRotationalVelocity { speed_umps: u32, accel_umpss: u32 },
    /// Read linear velocity limits
    GetLinearVelocity,
    /// Read rotational velocity limits
    GetRotationalVelocity,

    /// Set effective wheel diameter (µm)
    SetWheelCalibration(u32),
    /// Set wheel contact point distance (µm)
    SetAxelCalibration(u32),
    /// Read wheel diameter calibration
    GetWheelCalibration,
    /// Read axel distance calibration
    GetAxelCalibration,

    /// Replace the drive settings with the persisted record
    LoadSettings,
    /// Persist the current drive settings
    SaveSettings,
    /// Restore default drive settings
    ResetSettings,
}

/// Successful reply from the motion task
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionReply {
    /// Pose after the motion completed (or current pose)
    Pose(PoseReport),
    /// Heading in degrees, two decimals
    Heading(f32),
    /// Position in millimetres, two decimals
    Position { x_mm: f32, y_mm: f32 },
    /// Velocity limits
    Velocity { speed_umps: u32, accel_umpss: u32 },
    /// A single calibration value (µm)
    Calibration(u32),
    /// Drive settings now in effect
    Settings(DriveSettings),
    /// Command applied, nothing to report
    Done,
}
