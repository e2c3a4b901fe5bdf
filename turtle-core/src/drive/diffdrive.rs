//! Differential-drive motion engine
//!
//! Turns robot-level motions into per-wheel step profiles and integrates
//! the executed steps of both wheels into a pose.
//!
//! # Lifecycle
//!
//! A motion operation arms both steppers and returns at once. The caller
//! then either awaits [`DiffDrive::wait_idle`] or calls
//! [`DiffDrive::poll`] periodically until [`DiffDrive::is_moving`] is
//! false. Motion and setting operations are rejected with
//! [`DriveError::Busy`] while a motion is in progress.

use embassy_futures::select::{select, Either};
use embedded_hal::digital::{OutputPin, PinState};

use super::kinematics::Kinematics;
use super::pose::{bearing_deg, shortest_turn, Pose, PoseReport};
use crate::config::{Calibration, DriveSettings, MotionLimits};
use crate::error::DriveError;
use crate::motion::{MotionCommand, MotionReply, VelocityProfile};
use crate::stepper::{Direction, Stepper};
use crate::traits::PulseEmitter;

/// Fixed drive hardware parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveConfig {
    /// Steps per wheel revolution, including microstepping
    pub steps_per_rev: u32,
    /// Driver enable input is active low
    pub enable_inverted: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            steps_per_rev: super::kinematics::STEPS_PER_REV,
            enable_inverted: true,
        }
    }
}

/// Second leg of a two-leg command, started when the first completes
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueuedDrive {
    distance_um: f32,
}

/// One wheel's share of a motion
#[derive(Debug, Clone, Copy)]
struct WheelMove {
    direction: Direction,
    distance_um: f32,
    speed_umps: f32,
    accel_umpss: f32,
}

/// One wheel's share of the odometry for the motion in progress
#[derive(Debug, Clone, Copy)]
struct WheelProgress {
    /// Executed step count when the motion started
    start: u64,
    /// Steps armed for this motion
    steps: u32,
    sign: f32,
    /// Steps already folded into the pose
    credited: f32,
}

impl WheelProgress {
    fn idle(start: u64) -> Self {
        Self {
            start,
            steps: 0,
            sign: 1.0,
            credited: 0.0,
        }
    }

    fn arm(&mut self, steps: u32, direction: Direction) {
        self.steps = steps;
        self.sign = direction.sign();
    }

    /// Share of the armed steps executed so far, in `[0, 1]`
    fn fraction(&self, done: u64) -> f32 {
        if self.steps == 0 {
            1.0
        } else {
            (done as f32 / self.steps as f32).min(1.0)
        }
    }
}

/// Odometry bookkeeping for the motion in progress
///
/// While either wheel is moving, both are credited only up to the share
/// of the motion they have jointly completed, so the pose follows the
/// commanded arc however the two channels' notifications interleave.
#[derive(Debug, Clone, Copy)]
struct Progress {
    left: WheelProgress,
    right: WheelProgress,
    /// Wheel travel per step for this motion (µm)
    um_per_step: f32,
}

/// Two-wheel drive with odometry
pub struct DiffDrive<L, R, D> {
    left: Stepper<L, D>,
    right: Stepper<R, D>,
    enable_pin: D,
    config: DriveConfig,
    enabled: bool,
    kinematics: Kinematics,
    limits: MotionLimits,
    pose: Pose,
    progress: Progress,
    queued: Option<QueuedDrive>,
}

impl<L, R, D> DiffDrive<L, R, D>
where
    L: PulseEmitter,
    R: PulseEmitter,
    D: OutputPin,
{
    /// Create a drive with the motor drivers disabled
    pub fn new(
        left: Stepper<L, D>,
        right: Stepper<R, D>,
        enable_pin: D,
        config: DriveConfig,
        settings: &DriveSettings,
    ) -> Result<Self, DriveError> {
        settings.validate()?;
        let kinematics = Kinematics::new(config.steps_per_rev, settings.calibration)?;

        let progress = Progress {
            left: WheelProgress::idle(left.executed_steps()),
            right: WheelProgress::idle(right.executed_steps()),
            um_per_step: 1.0 / kinematics.steps_per_um(),
        };

        let mut drive = Self {
            left,
            right,
            enable_pin,
            config,
            enabled: true,
            kinematics,
            limits: settings.limits,
            pose: Pose::default(),
            progress,
            queued: None,
        };
        drive.write_enable(false)?;
        Ok(drive)
    }

    // ---- State ----

    /// Check if a motion (or a queued second leg) is in progress
    pub fn is_moving(&self) -> bool {
        self.left.is_busy() || self.right.is_busy() || self.queued.is_some()
    }

    /// Service both wheels, update odometry and start any queued leg
    ///
    /// Call periodically when not using [`DiffDrive::wait_idle`].
    pub fn poll(&mut self) -> Result<(), DriveError> {
        let left = self.left.service();
        let right = self.right.service();
        self.integrate();
        if let Err(e) = left.and(right) {
            self.queued = None;
            return Err(e.into());
        }

        if !self.left.is_busy() && !self.right.is_busy() {
            if let Some(leg) = self.queued.take() {
                self.start_drive(leg.distance_um, Direction::Forward)?;
            }
        }
        Ok(())
    }

    /// Wait until the current motion completes
    ///
    /// Wakes on each wheel's ready notification; returns the final pose.
    pub async fn wait_idle(&mut self) -> Result<PoseReport, DriveError> {
        loop {
            self.poll()?;
            if !self.is_moving() {
                return Ok(self.pose.report());
            }

            let result = match select(self.left.next_ready(), self.right.next_ready()).await {
                Either::First(result) | Either::Second(result) => result,
            };
            if let Err(e) = result {
                self.integrate();
                self.queued = None;
                return Err(e.into());
            }
        }
    }

    /// Fold the executed steps of both wheels into the pose
    fn integrate(&mut self) {
        let progress = self.progress;
        let left_done = self.left.steps_since(progress.left.start);
        let right_done = self.right.steps_since(progress.right.start);

        let (left_target, right_target) = if self.left.is_busy() || self.right.is_busy() {
            let joint = progress
                .left
                .fraction(left_done)
                .min(progress.right.fraction(right_done));
            (
                joint * progress.left.steps as f32,
                joint * progress.right.steps as f32,
            )
        } else {
            // Motion over: credit everything each wheel executed
            (left_done as f32, right_done as f32)
        };

        let left_steps = left_target - progress.left.credited;
        let right_steps = right_target - progress.right.credited;
        if left_steps == 0.0 && right_steps == 0.0 {
            return;
        }
        self.progress.left.credited = left_target;
        self.progress.right.credited = right_target;

        let left_um = left_steps * progress.um_per_step * progress.left.sign;
        let right_um = right_steps * progress.um_per_step * progress.right.sign;
        self.pose.integrate(left_um, right_um, self.kinematics.axel_um());
    }

    /// Reject the request while moving, after catching up on odometry
    fn ensure_idle(&mut self) -> Result<(), DriveError> {
        self.poll()?;
        if self.is_moving() {
            return Err(DriveError::Busy);
        }
        Ok(())
    }

    // ---- Motion ----

    /// Drive forward in a straight line
    pub fn drive_forward(&mut self, distance_um: u32) -> Result<(), DriveError> {
        self.ensure_idle()?;
        self.start_drive(distance_um as f32, Direction::Forward)
    }

    /// Drive backward in a straight line
    pub fn drive_backward(&mut self, distance_um: u32) -> Result<(), DriveError> {
        self.ensure_idle()?;
        self.start_drive(distance_um as f32, Direction::Reverse)
    }

    /// Turn counter-clockwise in place
    pub fn turn_left(&mut self, angle_deg: f32) -> Result<(), DriveError> {
        self.ensure_idle()?;
        self.start_turn(-angle_deg)
    }

    /// Turn clockwise in place
    pub fn turn_right(&mut self, angle_deg: f32) -> Result<(), DriveError> {
        self.ensure_idle()?;
        self.start_turn(angle_deg)
    }

    /// Trace an arc of a circle
    ///
    /// Positive extent curves left (centre on the left) driving forward;
    /// negative extent drives the same circle backward. When the radius is
    /// under half the axel the inner wheel runs in reverse.
    pub fn circle(&mut self, radius_um: u32, extent_deg: f32) -> Result<(), DriveError> {
        self.ensure_idle()?;
        if radius_um == 0 {
            return Err(DriveError::Degenerate);
        }
        if extent_deg == 0.0 {
            return Ok(());
        }

        let direction = if extent_deg > 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        let theta = libm::fabsf(extent_deg).to_radians();
        let radius = radius_um as f32;
        let half_axel = self.kinematics.axel_um() / 2.0;
        let inner = radius - half_axel;
        let outer = radius + half_axel;

        let inner_direction = if inner < 0.0 {
            direction.opposite()
        } else {
            direction
        };

        let speed = self.limits.linear_target_speed_umps as f32;
        let accel = self.limits.linear_accel_umpss as f32;
        let inner_scale = libm::fabsf(inner) / radius;
        let outer_scale = outer / radius;

        self.run_wheels(
            WheelMove {
                direction: inner_direction,
                distance_um: libm::fabsf(inner) * theta,
                speed_umps: speed * inner_scale,
                accel_umpss: accel * inner_scale,
            },
            WheelMove {
                direction,
                distance_um: outer * theta,
                speed_umps: speed * outer_scale,
                accel_umpss: accel * outer_scale,
            },
        )
    }

    /// Turn to an absolute heading by the shortest way
    pub fn set_heading(&mut self, heading_deg: f32) -> Result<(), DriveError> {
        self.ensure_idle()?;
        let delta = shortest_turn(self.pose.heading_deg(), heading_deg);
        self.start_turn(delta)
    }

    /// Drive to an x coordinate, keeping y
    pub fn set_cartesian_x(&mut self, x_um: i64) -> Result<(), DriveError> {
        let y_um = self.pose.y_um();
        self.set_cartesian_position(x_um, y_um)
    }

    /// Drive to a y coordinate, keeping x
    pub fn set_cartesian_y(&mut self, y_um: i64) -> Result<(), DriveError> {
        let x_um = self.pose.x_um();
        self.set_cartesian_position(x_um, y_um)
    }

    /// Turn towards a point, then drive to it
    ///
    /// The drive leg is queued and starts once the turn completes.
    pub fn set_cartesian_position(&mut self, x_um: i64, y_um: i64) -> Result<(), DriveError> {
        self.ensure_idle()?;
        let dx = (x_um - self.pose.x_um()) as f32;
        let dy = (y_um - self.pose.y_um()) as f32;
        let distance = libm::sqrtf(dx * dx + dy * dy);
        if self.kinematics.distance_to_steps(distance) == 0 {
            return Ok(());
        }

        let delta = shortest_turn(self.pose.heading_deg(), bearing_deg(dx, dy));
        self.start_turn(delta)?;
        if self.left.is_busy() || self.right.is_busy() {
            self.queued = Some(QueuedDrive {
                distance_um: distance,
            });
            Ok(())
        } else {
            self.start_drive(distance, Direction::Forward)
        }
    }

    /// Turn to face a point
    pub fn turn_towards_cartesian_point(&mut self, x_um: i64, y_um: i64) -> Result<(), DriveError> {
        self.ensure_idle()?;
        if x_um == self.pose.x_um() && y_um == self.pose.y_um() {
            return Err(DriveError::Degenerate);
        }
        let dx = (x_um - self.pose.x_um()) as f32;
        let dy = (y_um - self.pose.y_um()) as f32;
        let delta = shortest_turn(self.pose.heading_deg(), bearing_deg(dx, dy));
        self.start_turn(delta)
    }

    /// Make the current position the origin, keeping the heading
    pub fn reset_origin(&mut self) -> Result<(), DriveError> {
        self.ensure_idle()?;
        self.pose.reset_origin();
        Ok(())
    }

    fn start_drive(&mut self, distance_um: f32, direction: Direction) -> Result<(), DriveError> {
        let wheel = WheelMove {
            direction,
            distance_um,
            speed_umps: self.limits.linear_target_speed_umps as f32,
            accel_umpss: self.limits.linear_accel_umpss as f32,
        };
        self.run_wheels(wheel, wheel)
    }

    /// Rotate in place; positive angles are clockwise
    fn start_turn(&mut self, angle_deg: f32) -> Result<(), DriveError> {
        let (left, right) = if angle_deg >= 0.0 {
            (Direction::Forward, Direction::Reverse)
        } else {
            (Direction::Reverse, Direction::Forward)
        };
        let wheel = WheelMove {
            direction: left,
            distance_um: libm::fabsf(self.kinematics.rotation_arc_um(angle_deg)),
            speed_umps: self.limits.rotational_target_speed_umps as f32,
            accel_umpss: self.limits.rotational_accel_umpss as f32,
        };
        self.run_wheels(wheel, WheelMove { direction: right, ..wheel })
    }

    /// Plan and start both wheels
    ///
    /// Both profiles are planned and both direction outputs set before
    /// either wheel is armed. If the right wheel then fails to arm, the
    /// left one runs its profile out and the drive stays Moving until it
    /// has.
    fn run_wheels(&mut self, left: WheelMove, right: WheelMove) -> Result<(), DriveError> {
        let left_profile = self.plan_wheel(&left);
        let right_profile = self.plan_wheel(&right);

        self.left.set_direction(left.direction)?;
        self.right.set_direction(right.direction)?;

        let mut progress = Progress {
            left: WheelProgress::idle(self.left.executed_steps()),
            right: WheelProgress::idle(self.right.executed_steps()),
            um_per_step: 1.0 / self.kinematics.steps_per_um(),
        };

        let left_steps = left_profile.total_pulses();
        self.left.run(left.direction, left_profile)?;
        progress.left.arm(left_steps, left.direction);
        self.progress = progress;

        let right_steps = right_profile.total_pulses();
        self.right.run(right.direction, right_profile)?;
        self.progress.right.arm(right_steps, right.direction);
        Ok(())
    }

    fn plan_wheel(&self, wheel: &WheelMove) -> VelocityProfile {
        VelocityProfile::plan(
            self.kinematics.distance_to_steps(wheel.distance_um),
            self.kinematics.speed_to_rate(wheel.speed_umps),
            self.kinematics.speed_to_rate(wheel.accel_umpss),
        )
    }

    // ---- Pose ----

    /// Position in micrometres
    pub fn get_cartesian_position(&self) -> (i64, i64) {
        (self.pose.x_um(), self.pose.y_um())
    }

    /// Heading in degrees, `[0, 360)`
    pub fn get_heading(&self) -> f32 {
        self.pose.heading_deg()
    }

    /// Pose rounded for reporting
    pub fn pose_report(&self) -> PoseReport {
        self.pose.report()
    }

    // ---- Motor enable ----

    /// Enable or disable the motor drivers
    ///
    /// Enabling also resets the origin to the current position.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), DriveError> {
        self.ensure_idle()?;
        self.write_enable(enabled)?;
        if enabled {
            self.pose.reset_origin();
        }
        Ok(())
    }

    fn write_enable(&mut self, enabled: bool) -> Result<(), DriveError> {
        let high = enabled != self.config.enable_inverted;
        self.enable_pin
            .set_state(PinState::from(high))
            .map_err(|_| DriveError::Pin)?;
        self.enabled = enabled;
        Ok(())
    }

    /// Whether the motor drivers are enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ---- Settings ----

    /// Calibration in effect for new motions
    pub fn calibration(&self) -> Calibration {
        self.kinematics.calibration()
    }

    /// Motion limits in effect for new motions
    pub fn limits(&self) -> MotionLimits {
        self.limits
    }

    /// Current settings as a persistable record
    pub fn settings(&self) -> DriveSettings {
        DriveSettings::new(self.calibration(), self.limits)
    }

    /// Replace calibration and limits
    pub fn apply_settings(&mut self, settings: &DriveSettings) -> Result<(), DriveError> {
        self.ensure_idle()?;
        settings.validate()?;
        self.kinematics = Kinematics::new(self.config.steps_per_rev, settings.calibration)?;
        self.limits = settings.limits;
        Ok(())
    }

    fn apply_calibration(&mut self, calibration: Calibration) -> Result<(), DriveError> {
        self.ensure_idle()?;
        self.kinematics = Kinematics::new(self.config.steps_per_rev, calibration)?;
        Ok(())
    }

    fn apply_limits(&mut self, limits: MotionLimits) -> Result<(), DriveError> {
        self.ensure_idle()?;
        limits.validate()?;
        self.limits = limits;
        Ok(())
    }

    /// Set the effective wheel diameter
    pub fn set_wheel_calibration(&mut self, wheel_diameter_um: u32) -> Result<(), DriveError> {
        self.apply_calibration(Calibration {
            wheel_diameter_um,
            ..self.calibration()
        })
    }

    /// Set the distance between the wheel contact points
    pub fn set_axel_calibration(&mut self, axel_distance_um: u32) -> Result<(), DriveError> {
        self.apply_calibration(Calibration {
            axel_distance_um,
            ..self.calibration()
        })
    }

    /// Set the linear cruise speed (µm/s) and acceleration (µm/s²)
    pub fn set_linear_velocity(&mut self, speed_umps: u32, accel_umpss: u32) -> Result<(), DriveError> {
        self.apply_limits(MotionLimits {
            linear_target_speed_umps: speed_umps,
            linear_accel_umpss: accel_umpss,
            ..self.limits
        })
    }

    /// Set the wheel cruise speed (µm/s) and acceleration (µm/s²) for turns
    pub fn set_rotational_velocity(
        &mut self,
        speed_umps: u32,
        accel_umpss: u32,
    ) -> Result<(), DriveError> {
        self.apply_limits(MotionLimits {
            rotational_target_speed_umps: speed_umps,
            rotational_accel_umpss: accel_umpss,
            ..self.limits
        })
    }

    /// Linear cruise speed (µm/s) and acceleration (µm/s²)
    pub fn linear_velocity(&self) -> (u32, u32) {
        (self.limits.linear_target_speed_umps, self.limits.linear_accel_umpss)
    }

    /// Rotational cruise speed (µm/s) and acceleration (µm/s²)
    pub fn rotational_velocity(&self) -> (u32, u32) {
        (
            self.limits.rotational_target_speed_umps,
            self.limits.rotational_accel_umpss,
        )
    }

    // ---- Wheels ----

    /// Left wheel stepper
    pub fn left(&self) -> &Stepper<L, D> {
        &self.left
    }

    /// Right wheel stepper
    pub fn right(&self) -> &Stepper<R, D> {
        &self.right
    }

    // ---- Commands ----

    /// Execute a command, waiting for any motion to complete
    ///
    /// Storage commands only touch the in-memory settings here: load and
    /// save reply with the current settings and leave the flash access to
    /// the caller.
    pub async fn execute(&mut self, command: MotionCommand) -> Result<MotionReply, DriveError> {
        match command {
            MotionCommand::Forward(d) => self.drive_forward(d)?,
            MotionCommand::Backward(d) => self.drive_backward(d)?,
            MotionCommand::Left(a) => self.turn_left(a)?,
            MotionCommand::Right(a) => self.turn_right(a)?,
            MotionCommand::Circle {
                radius_um,
                extent_deg,
            } => self.circle(radius_um, extent_deg)?,
            MotionCommand::SetHeading(h) => self.set_heading(h)?,
            MotionCommand::SetX(x) => self.set_cartesian_x(x)?,
            MotionCommand::SetY(y) => self.set_cartesian_y(y)?,
            MotionCommand::SetPosition { x_um, y_um } => self.set_cartesian_position(x_um, y_um)?,
            MotionCommand::Towards { x_um, y_um } => {
                self.turn_towards_cartesian_point(x_um, y_um)?
            }
            MotionCommand::ResetOrigin => {
                self.reset_origin()?;
                return Ok(MotionReply::Done);
            }
            MotionCommand::Enable(enabled) => {
                self.set_enabled(enabled)?;
                return Ok(MotionReply::Done);
            }
            MotionCommand::GetPose => return Ok(MotionReply::Pose(self.pose_report())),
            MotionCommand::GetHeading => {
                return Ok(MotionReply::Heading(self.pose_report().heading_deg))
            }
            MotionCommand::GetPosition => {
                let report = self.pose_report();
                return Ok(MotionReply::Position {
                    x_mm: report.x_mm,
                    y_mm: report.y_mm,
                });
            }
            MotionCommand::SetLinearVelocity {
                speed_umps,
                accel_umpss,
            } => {
                self.set_linear_velocity(speed_umps, accel_umpss)?;
                return Ok(MotionReply::Done);
            }
            MotionCommand::SetRotationalVelocity {
                speed_umps,
                accel_umpss,
            } => {
                self.set_rotational_velocity(speed_umps, accel_umpss)?;
                return Ok(MotionReply::Done);
            }
            MotionCommand::GetLinearVelocity => {
                let (speed_umps, accel_umpss) = self.linear_velocity();
                return Ok(MotionReply::Velocity {
                    speed_umps,
                    accel_umpss,
                });
            }
            MotionCommand::GetRotationalVelocity => {
                let (speed_umps, accel_umpss) = self.rotational_velocity();
                return Ok(MotionReply::Velocity {
                    speed_umps,
                    accel_umpss,
                });
            }
            MotionCommand::SetWheelCalibration(um) => {
                self.set_wheel_calibration(um)?;
                return Ok(MotionReply::Done);
            }
            MotionCommand::SetAxelCalibration(um) => {
                self.set_axel_calibration(um)?;
                return Ok(MotionReply::Done);
            }
            MotionCommand::GetWheelCalibration => {
                return Ok(MotionReply::Calibration(self.calibration().wheel_diameter_um))
            }
            MotionCommand::GetAxelCalibration => {
                return Ok(MotionReply::Calibration(self.calibration().axel_distance_um))
            }
            MotionCommand::LoadSettings | MotionCommand::SaveSettings => {
                return Ok(MotionReply::Settings(self.settings()))
            }
            MotionCommand::ResetSettings => {
                self.apply_settings(&DriveSettings::default())?;
                return Ok(MotionReply::Settings(self.settings()));
            }
        }

        self.wait_idle().await.map(MotionReply::Pose)
    }
}
