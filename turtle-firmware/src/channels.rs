//! Inter-task communication channels
//!
//! The command dispatch layer (wireless transport, shell) sends
//! `MotionCommand`s and receives exactly one `MotionResult` per command.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use turtle_core::motion::{MotionCommand, MotionReply};
use turtle_core::DriveError;

use crate::config::PersistenceError;

/// Channel capacity for motion commands
const COMMAND_CHANNEL_SIZE: usize = 4;

/// Channel capacity for motion results
const RESULT_CHANNEL_SIZE: usize = 4;

/// Reasons a command failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Rejected or failed by the drive
    Drive(DriveError),
    /// Settings could not be loaded or saved
    Storage(PersistenceError),
}

impl From<DriveError> for CommandError {
    fn from(e: DriveError) -> Self {
        CommandError::Drive(e)
    }
}

impl From<PersistenceError> for CommandError {
    fn from(e: PersistenceError) -> Self {
        CommandError::Storage(e)
    }
}

/// Outcome of one motion command
pub type MotionResult = Result<MotionReply, CommandError>;

/// Commands for the motion task
pub static MOTION_COMMANDS: Channel<CriticalSectionRawMutex, MotionCommand, COMMAND_CHANNEL_SIZE> =
    Channel::new();

/// Results from the motion task, in command order
pub static MOTION_RESULTS: Channel<CriticalSectionRawMutex, MotionResult, RESULT_CHANNEL_SIZE> =
    Channel::new();
