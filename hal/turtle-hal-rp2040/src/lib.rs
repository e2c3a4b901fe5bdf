//! RP2040-specific HAL for the turtle robot firmware
//!
//! - PIO pulse program and the `PioPulseEmitter` step channel
//!   (implements `turtle_core::traits::PulseEmitter`)
//! - Flash storage driver (implements `turtle_hal::FlashStorage`)

#![no_std]

pub mod emitter;
pub mod flash;
pub mod pio;

pub use emitter::PioPulseEmitter;
pub use flash::Rp2040FlashStorage;
pub use pio::PulseProgram;
pub use turtle_hal::{FlashStorage as FlashStorageTrait, StorageKey};
