//! Motion task
//!
//! Owns the drive and the settings storage. Executes one command at a
//! time: motions run to completion (woken by the wheels' PIO
//! interrupts) before the result is sent back.

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::PIO0;

use turtle_core::drive::DiffDrive;
use turtle_core::motion::{MotionCommand, MotionReply};
use turtle_hal_rp2040::flash::Rp2040FlashStorage;
use turtle_hal_rp2040::PioPulseEmitter;

use crate::channels::{MotionResult, MOTION_COMMANDS, MOTION_RESULTS};
use crate::config::{save_settings, try_load_settings};

/// The turtle's drive: left wheel on SM0, right wheel on SM1
pub type Drive = DiffDrive<
    PioPulseEmitter<'static, PIO0, 0>,
    PioPulseEmitter<'static, PIO0, 1>,
    Output<'static>,
>;

#[embassy_executor::task]
pub async fn motion_task(mut drive: Drive, mut storage: Rp2040FlashStorage<'static>) {
    info!("Motion task started");

    loop {
        let command = MOTION_COMMANDS.receive().await;
        debug!("Motion command: {:?}", command);

        let result = handle_command(&mut drive, &mut storage, command).await;
        match &result {
            Ok(MotionReply::Pose(pose)) => debug!(
                "Pose: x={} mm, y={} mm, heading={} deg",
                pose.x_mm, pose.y_mm, pose.heading_deg
            ),
            Ok(_) => {}
            Err(e) => warn!("Command {:?} failed: {:?}", command, e),
        }

        MOTION_RESULTS.send(result).await;
    }
}

async fn handle_command(
    drive: &mut Drive,
    storage: &mut Rp2040FlashStorage<'static>,
    command: MotionCommand,
) -> MotionResult {
    match command {
        MotionCommand::LoadSettings => {
            let settings = try_load_settings(storage).await?;
            drive.apply_settings(&settings)?;
            info!("Drive settings loaded");
            Ok(MotionReply::Settings(settings))
        }
        MotionCommand::SaveSettings => {
            let settings = drive.settings();
            save_settings(storage, &settings).await?;
            Ok(MotionReply::Settings(settings))
        }
        MotionCommand::Enable(enabled) => {
            let reply = drive.execute(command).await?;
            info!("Motors {}", if enabled { "enabled" } else { "disabled" });
            Ok(reply)
        }
        other => Ok(drive.execute(other).await?),
    }
}
