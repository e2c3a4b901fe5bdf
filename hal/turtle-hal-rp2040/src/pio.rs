//! PIO pulse program
//!
//! Each wheel gets its own state machine; all state machines in a block
//! share one copy of the program. The program pulls a pulse count and a
//! delay from the TX FIFO, raises its relative IRQ flag to say it has
//! latched the command, then emits the pulses with `delay` loop
//! iterations high and `delay` low. A count of zero skips straight back
//! to the next pull.
//!
//! The state machines run at [`PIO_CLOCK_HZ`] so that the delay formula
//! in `turtle_core::pulse` holds.

use embassy_rp::pio::{Common, Instance, LoadedProgram};
use fixed::types::U24F8;

pub use turtle_core::pulse::PIO_CLOCK_HZ;

/// System clock frequency (RP2040 default)
pub const SYS_CLK_HZ: u32 = 125_000_000;

/// Clock divider bringing `sys_clk_hz` down to `target_hz`
///
/// The divider is 16.8 fixed point; out-of-range requests saturate.
pub fn clock_divider(sys_clk_hz: u32, target_hz: u32) -> U24F8 {
    if target_hz == 0 {
        return U24F8::from_bits(0xFFFF_FF00);
    }
    let bits = (sys_clk_hz as u64 * 256) / target_hz as u64;
    // Hardware minimum divider is 1.0
    let bits = bits.clamp(256, 0xFFFF_FF00) as u32;
    U24F8::from_bits(bits)
}

/// The pulse program loaded into one PIO block
pub struct PulseProgram<'d, PIO: Instance> {
    program: LoadedProgram<'d, PIO>,
}

impl<'d, PIO: Instance> PulseProgram<'d, PIO> {
    /// Load the program into a PIO block's instruction memory
    pub fn load(common: &mut Common<'d, PIO>) -> Self {
        let prg = pio::pio_asm!(
            ".wrap_target",
            "pull block",         // pulse count
            "mov x, osr",
            "pull block",         // delay; stays in OSR for reloading Y
            "mov y, osr",
            "irq 0 rel",          // command latched
            "step:",
            "jmp !x finished",
            "set pins, 1",
            "ondelay:",
            "jmp y-- ondelay",
            "mov y, osr",
            "set pins, 0",
            "offdelay:",
            "jmp y-- offdelay",
            "mov y, osr",
            "jmp x-- step",
            "finished:",
            "set pins, 0",
            ".wrap"
        );

        Self {
            program: common.load_program(&prg.program),
        }
    }

    pub fn program(&self) -> &LoadedProgram<'d, PIO> {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clock_divider() {
        // 125MHz / 2.5MHz = 50
        assert_eq!(clock_divider(SYS_CLK_HZ, PIO_CLOCK_HZ), U24F8::from_num(50));
    }

    #[test]
    fn test_fractional_divider() {
        // 133MHz / 2.5MHz = 53.2 -> 53 + 51/256
        let div = clock_divider(133_000_000, PIO_CLOCK_HZ);
        assert_eq!(div.to_bits(), 53 * 256 + 51);
    }

    #[test]
    fn test_divider_saturates() {
        assert_eq!(clock_divider(SYS_CLK_HZ, 0).to_bits(), 0xFFFF_FF00);
        assert_eq!(clock_divider(SYS_CLK_HZ, 1_000_000_000), U24F8::from_num(1));
    }
}
