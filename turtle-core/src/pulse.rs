//! Pulse-level commands and PIO timing math
//!
//! A pulse channel runs a small PIO program that pulls a pulse count and a
//! delay value from its TX FIFO, raises its IRQ flag, then emits the pulses.
//! Each pulse spends `delay` loop iterations high and `delay` low, plus a
//! fixed per-pulse overhead.

use crate::error::ConfigError;

/// PIO state machine clock for pulse channels
pub const PIO_CLOCK_HZ: u32 = 2_500_000;

/// Fixed per-pulse loop overhead of the pulse program, in PIO clock ticks
pub const DELAY_LOOP_OVERHEAD: u32 = 8;

/// Hardware pulse rate ceiling
pub const MAX_RATE_PPS: u32 = 250_000;

/// Number of PIO blocks on the chip
pub const PIO_BLOCKS: u8 = 2;

/// State machines per PIO block
pub const STATE_MACHINES_PER_BLOCK: u8 = 4;

/// Clamp a requested rate into `1..=MAX_RATE_PPS`
///
/// Rates above the ceiling are corrected rather than rejected.
pub fn clamp_rate(rate_pps: u32) -> u32 {
    if rate_pps > MAX_RATE_PPS {
        #[cfg(feature = "defmt")]
        defmt::debug!("Pulse rate {} pps above ceiling, limiting to {}", rate_pps, MAX_RATE_PPS);
        return MAX_RATE_PPS;
    }
    rate_pps.max(1)
}

/// Convert a pulse rate to the PIO delay loop count
///
/// `delay = floor((F / rate) / 2 - V / 2)`, evaluated in integers as
/// `(F - V * rate) / (2 * rate)`. Never negative.
pub fn rate_to_delay(rate_pps: u32) -> u32 {
    let rate = clamp_rate(rate_pps) as u64;
    let clock = PIO_CLOCK_HZ as u64;
    let overhead = DELAY_LOOP_OVERHEAD as u64 * rate;

    (clock.saturating_sub(overhead) / (2 * rate)) as u32
}

/// One emitter-level instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseCommand {
    /// Pulse rate, already clamped to the hardware ceiling
    pub rate_pps: u32,
    /// Number of pulses to emit (0 = terminal command)
    pub count: u32,
}

impl PulseCommand {
    /// Terminal command: no pulses, raises the ready notification at once
    pub const TERMINAL: Self = Self { rate_pps: 1, count: 0 };

    /// Create a command, clamping the rate
    pub fn new(rate_pps: u32, count: u32) -> Self {
        Self {
            rate_pps: clamp_rate(rate_pps),
            count,
        }
    }

    /// Whether this is the terminal (zero-count) command
    pub fn is_terminal(&self) -> bool {
        self.count == 0
    }

    /// PIO delay loop count for this command's rate
    pub fn delay(&self) -> u32 {
        rate_to_delay(self.rate_pps)
    }
}

/// A validated hardware pulse channel (PIO block and state machine)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId {
    block: u8,
    state_machine: u8,
}

impl ChannelId {
    /// Validate a channel identifier
    pub fn new(block: u8, state_machine: u8) -> Result<Self, ConfigError> {
        if block >= PIO_BLOCKS || state_machine >= STATE_MACHINES_PER_BLOCK {
            return Err(ConfigError::InvalidChannel {
                block,
                state_machine,
            });
        }
        Ok(Self {
            block,
            state_machine,
        })
    }

    /// PIO block number
    pub fn block(&self) -> u8 {
        self.block
    }

    /// State machine number within the block
    pub fn state_machine(&self) -> u8 {
        self.state_machine
    }

    /// Flat channel index (block 0 is 0-3, block 1 is 4-7)
    pub fn index(&self) -> u8 {
        self.block * STATE_MACHINES_PER_BLOCK + self.state_machine
    }
}
