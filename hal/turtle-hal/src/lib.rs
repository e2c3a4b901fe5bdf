//! Turtle Hardware Abstraction Layer
//!
//! Traits implemented by chip-specific HALs so the firmware's
//! persistence code does not depend on one flash driver.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  turtle-firmware                        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  turtle-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │  turtle-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! Pulse channels are abstracted by `turtle_core::traits::PulseEmitter`
//! and digital outputs by `embedded_hal::digital::OutputPin`.

#![no_std]
#![deny(unsafe_code)]

pub mod flash;

pub use flash::{FlashError, FlashStorage, StorageKey};
