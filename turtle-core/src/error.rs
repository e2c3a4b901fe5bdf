//! Error types for each layer of the motion core

/// Start-up configuration errors
///
/// These are fatal: the composition root halts if any occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Requested PIO block or state machine does not exist
    InvalidChannel { block: u8, state_machine: u8 },
    /// Wheel diameter or axel distance is zero
    InvalidCalibration,
    /// A speed or acceleration limit is zero
    InvalidVelocity,
}

/// Pulse emitter errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EmitterError {
    /// The hardware queue could not accept the command
    FifoFull,
}

/// Per-wheel stepper errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperError {
    /// A profile is already running on this wheel
    Busy,
    /// The emitter rejected a command
    Emitter(EmitterError),
    /// Writing the direction output failed
    DirectionPin,
}

impl From<EmitterError> for StepperError {
    fn from(e: EmitterError) -> Self {
        StepperError::Emitter(e)
    }
}

/// Differential-drive errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveError {
    /// A motion is in progress; retry once idle
    Busy,
    /// Calibration value is zero
    InvalidCalibration,
    /// Speed or acceleration is zero
    InvalidVelocity,
    /// Geometry is undefined for the request (e.g. zero radius)
    Degenerate,
    /// The pulse emitter rejected a command
    Emitter(EmitterError),
    /// Writing a direction or enable output failed
    Pin,
}

impl From<StepperError> for DriveError {
    fn from(e: StepperError) -> Self {
        match e {
            StepperError::Busy => DriveError::Busy,
            StepperError::Emitter(e) => DriveError::Emitter(e),
            StepperError::DirectionPin => DriveError::Pin,
        }
    }
}

impl From<EmitterError> for DriveError {
    fn from(e: EmitterError) -> Self {
        DriveError::Emitter(e)
    }
}

impl From<ConfigError> for DriveError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidVelocity => DriveError::InvalidVelocity,
            _ => DriveError::InvalidCalibration,
        }
    }
}
