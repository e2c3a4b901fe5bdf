//! Pulse emitter trait
//!
//! A pulse emitter owns one hardware pulse channel. It is double-buffered:
//! after accepting a command it signals "ready" as soon as the channel has
//! latched that command, while the pulses are still being emitted. The
//! owner arms the next command from that notification so a multi-segment
//! ramp streams without gaps.
//!
//! Each emitter has exactly one owner, so the notification is a single
//! slot (the PIO IRQ flag on RP2040) rather than a subscriber list.

use crate::error::EmitterError;
use crate::pulse::{ChannelId, PulseCommand};

/// Trait for hardware pulse channels
pub trait PulseEmitter {
    /// Channel this emitter drives
    fn channel(&self) -> ChannelId;

    /// Queue a command for emission
    ///
    /// Non-blocking. Exactly `command.count` pulses are emitted at
    /// `command.rate_pps` once the channel latches the command. A terminal
    /// command (count 0) emits nothing and latches immediately.
    fn arm(&mut self, command: PulseCommand) -> Result<(), EmitterError>;

    /// Consume one ready notification if the channel has latched a command
    ///
    /// Used by callers that poll on a timer instead of awaiting.
    fn take_ready(&mut self) -> bool;

    /// Wait until the channel latches a command, consuming the notification
    ///
    /// Must be cancel-safe: dropping the future before it resolves must
    /// not lose a notification.
    fn wait_ready(&mut self) -> impl core::future::Future<Output = ()>;
}
