//! Turtle robot motion firmware
//!
//! Composition root: builds the pulse emitters, steppers and drive for the
//! two wheels, loads the drive settings from flash and hands everything
//! to the motion task.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::Pio;
use {defmt_rtt as _, panic_probe as _};

use turtle_core::drive::{DiffDrive, DriveConfig};
use turtle_core::pulse::ChannelId;
use turtle_core::stepper::Stepper;
use turtle_hal_rp2040::flash::Rp2040FlashStorage;
use turtle_hal_rp2040::{PioPulseEmitter, PulseProgram};

mod board;
mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => embassy_rp::pio::InterruptHandler<PIO0>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Turtle firmware starting...");

    let p = embassy_rp::init(Default::default());

    // Drive settings
    let mut storage = Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0);
    let settings = config::load_settings(&mut storage).await;

    // Driver mode pins stay configured for the life of the firmware
    let (m0, m1, m2) = board::MICROSTEP_MODE;
    let _mode_pins = (
        Output::new(p.PIN_12, Level::from(m0)),
        Output::new(p.PIN_13, Level::from(m1)),
        Output::new(p.PIN_14, Level::from(m2)),
    );

    // Pulse channels: one program, one state machine per wheel
    let Pio {
        mut common,
        irq0,
        irq1,
        sm0,
        sm1,
        ..
    } = Pio::new(p.PIO0, Irqs);
    let program = PulseProgram::load(&mut common);

    let left_channel = unwrap!(ChannelId::new(board::PULSE_PIO_BLOCK, board::LEFT_STATE_MACHINE));
    let right_channel = unwrap!(ChannelId::new(board::PULSE_PIO_BLOCK, board::RIGHT_STATE_MACHINE));

    let left_emitter = unwrap!(PioPulseEmitter::new(
        &mut common,
        &program,
        sm0,
        irq0,
        p.PIN_2,
        left_channel,
    ));
    let right_emitter = unwrap!(PioPulseEmitter::new(
        &mut common,
        &program,
        sm1,
        irq1,
        p.PIN_3,
        right_channel,
    ));
    info!("Pulse channels initialized");

    // Steppers and drive
    let left = unwrap!(Stepper::new(
        left_emitter,
        Output::new(p.PIN_4, Level::Low),
        board::LEFT_INVERTED,
    ));
    let right = unwrap!(Stepper::new(
        right_emitter,
        Output::new(p.PIN_5, Level::Low),
        board::RIGHT_INVERTED,
    ));

    let drive_config = DriveConfig {
        steps_per_rev: board::STEPS_PER_REV,
        enable_inverted: board::ENABLE_INVERTED,
    };
    let enable = Output::new(p.PIN_6, Level::High);
    let drive = unwrap!(DiffDrive::new(left, right, enable, drive_config, &settings));
    info!(
        "Drive ready: {} steps/rev, {} steps/mm",
        board::STEPS_PER_REV,
        turtle_core::drive::Kinematics::new(board::STEPS_PER_REV, settings.calibration)
            .map(|k| k.steps_per_um() * 1000.0)
            .unwrap_or(0.0)
    );

    spawner.spawn(tasks::motion_task(drive, storage)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
