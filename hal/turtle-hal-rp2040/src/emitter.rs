//! PIO pulse emitter
//!
//! One state machine running the pulse program drives one step output.
//! The state machine's relative IRQ flag is the ready notification: the
//! program raises it each time it latches a command, and the flag stays
//! set until the owner consumes it.

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::pio::{
    Common, Config, Direction as PioDirection, Instance, Irq, Pin, PioPin, StateMachine,
};
use embassy_rp::Peri;
use turtle_core::error::{ConfigError, EmitterError};
use turtle_core::pulse::{ChannelId, PulseCommand, PIO_CLOCK_HZ};
use turtle_core::traits::PulseEmitter;

use crate::pio::{clock_divider, PulseProgram};

/// TX FIFO depth in words
const TX_FIFO_WORDS: u8 = 4;

/// Words per pulse command (count, delay)
const COMMAND_WORDS: u8 = 2;

/// Step pulse channel on one PIO state machine
///
/// `SM` selects both the state machine and its IRQ flag, since the
/// program raises its flag relative to the state machine number.
pub struct PioPulseEmitter<'d, PIO: Instance, const SM: usize> {
    channel: ChannelId,
    sm: StateMachine<'d, PIO, SM>,
    irq: Irq<'d, PIO, SM>,
    _step_pin: Pin<'d, PIO>,
}

impl<'d, PIO: Instance, const SM: usize> PioPulseEmitter<'d, PIO, SM> {
    /// Configure a state machine to run the pulse program and start it
    ///
    /// Fails if `channel` does not name this state machine.
    pub fn new(
        common: &mut Common<'d, PIO>,
        program: &PulseProgram<'d, PIO>,
        mut sm: StateMachine<'d, PIO, SM>,
        irq: Irq<'d, PIO, SM>,
        step_pin: Peri<'d, impl PioPin>,
        channel: ChannelId,
    ) -> Result<Self, ConfigError> {
        if channel.state_machine() as usize != SM {
            return Err(ConfigError::InvalidChannel {
                block: channel.block(),
                state_machine: channel.state_machine(),
            });
        }

        let step_pin = common.make_pio_pin(step_pin);

        let mut cfg = Config::default();
        cfg.use_program(program.program(), &[]);
        cfg.set_set_pins(&[&step_pin]);
        cfg.clock_divider = clock_divider(clk_sys_freq(), PIO_CLOCK_HZ);

        sm.set_config(&cfg);
        sm.set_pin_dirs(PioDirection::Out, &[&step_pin]);
        sm.set_enable(true);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Pulse channel ready on PIO{} SM{}",
            channel.block(),
            channel.state_machine()
        );

        Ok(Self {
            channel,
            sm,
            irq,
            _step_pin: step_pin,
        })
    }
}

impl<'d, PIO: Instance, const SM: usize> PulseEmitter for PioPulseEmitter<'d, PIO, SM> {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn arm(&mut self, command: PulseCommand) -> Result<(), EmitterError> {
        let tx = self.sm.tx();
        if tx.level() > TX_FIFO_WORDS - COMMAND_WORDS {
            return Err(EmitterError::FifoFull);
        }
        if !(tx.try_push(command.count) && tx.try_push(command.delay())) {
            return Err(EmitterError::FifoFull);
        }
        Ok(())
    }

    fn take_ready(&mut self) -> bool {
        // The IRQ future clears the flag only when it completes
        embassy_futures::poll_once(self.irq.wait()).is_ready()
    }

    async fn wait_ready(&mut self) {
        self.irq.wait().await
    }
}
