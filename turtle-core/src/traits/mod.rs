//! Hardware abstraction traits
//!
//! These traits define the interface between the motion logic
//! and hardware-specific implementations.

pub mod emitter;

pub use emitter::PulseEmitter;
