#![cfg_attr(not(test), no_std)]

//! Interrupt-driven timer, button and stopwatch core for a wrist watch.
//!
//! One free-running 16-bit counter clocked at 32768 Hz is multiplexed into
//! four logical timers through its compare channels:
//!
//! | Channel | Owner                                        |
//! |---------|----------------------------------------------|
//! | 0       | 1 Hz time base ([`timebase`])                |
//! | 1       | ~100 Hz stopwatch sub-tick ([`stopwatch`])   |
//! | 2       | configurable periodic callback ([`timer`])   |
//! | 3       | one-shot foreground delay ([`timer`])        |
//!
//! This channel assignment is the crate's only wire format and must be kept
//! by any board binding.
//!
//! Hardware is reached exclusively through the traits in [`hw`]; interrupt
//! and foreground context communicate through the single-producer /
//! single-consumer flag registers in [`flags`]. There are no queues and no
//! allocation: a flag holds only the latest state, so a slow consumer loses
//! intermediate transitions but never the final one.

// This mod must come first so its macros are visible to the others.
#[macro_use]
mod fmt;

pub mod button;
pub mod buzzer;
pub mod flags;
pub mod hw;
pub mod sensor;
pub mod stopwatch;
pub mod timebase;
pub mod timer;

/// Counts of the low-frequency clock per second (one tick is ~30.5 µs).
pub const TICKS_PER_SECOND: u16 = 32768;

/// Convert milliseconds to 32768 Hz timer ticks, rounding down.
pub const fn ms_to_ticks(ms: u16) -> u16 {
    ((ms as u32 * TICKS_PER_SECOND as u32) / 1000) as u16
}
