//! Turtle board wiring
//!
//! GPIO assignments (the pins themselves are taken by type in `main`):
//!
//! | Signal            | GPIO |
//! |-------------------|------|
//! | Left motor STEP   | 2    |
//! | Right motor STEP  | 3    |
//! | Left motor DIR    | 4    |
//! | Right motor DIR   | 5    |
//! | DRV8825 /ENABLE   | 6    |
//! | DRV8825 M0/M1/M2  | 12-14 |

/// PIO block driving both wheels
pub const PULSE_PIO_BLOCK: u8 = 0;

/// State machine for the left wheel (also selects IRQ flag 0)
pub const LEFT_STATE_MACHINE: u8 = 0;

/// State machine for the right wheel (also selects IRQ flag 1)
pub const RIGHT_STATE_MACHINE: u8 = 1;

/// The left motor is mounted mirrored
pub const LEFT_INVERTED: bool = true;
pub const RIGHT_INVERTED: bool = false;

/// DRV8825 enable input is active low
pub const ENABLE_INVERTED: bool = true;

/// 200-step motors at quarter stepping
pub const STEPS_PER_REV: u32 = 800;

/// DRV8825 mode pin levels (M0, M1, M2) for quarter stepping
pub const MICROSTEP_MODE: (bool, bool, bool) = (false, true, false);
