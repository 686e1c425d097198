//! The periodic callback (channel 2), the one-shot delay (channel 3) and the
//! demux for their shared interrupt vector.
//!
//! Channels 1–3 raise one vector; the board's handler decodes the cause into
//! a [`TimerVector`] and hands it to [`service`]. Channel 0 has its own
//! vector, serviced by [`crate::timebase::Timebase::on_tick`].

use crate::buzzer::Buzzer;
use crate::flags::{self, SharedFlags};
use crate::hw::{Button, ButtonPort, BuzzerPin, Channel, Display, TimerDevice, Wake};
use crate::stopwatch::Stopwatch;

/// Interrupt-context handlers the periodic channel can drive.
///
/// A closed set instead of a function pointer: dispatch in interrupt context
/// stays a jump table over known code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeriodicHandler {
    /// Advance the buzzer pulse train.
    BuzzerStep,
    /// Re-emit up/down presses while those buttons are held.
    ButtonRepeat,
}

/// Re-arming periodic callback on channel 2.
pub struct Periodic {
    period: u16,
    handler: PeriodicHandler,
    active: bool,
}

impl Periodic {
    pub const fn new() -> Self {
        Periodic {
            period: 0,
            handler: PeriodicHandler::BuzzerStep,
            active: false,
        }
    }

    /// Arm for now + `period` and select the handler run on each fire.
    pub fn start<T: TimerDevice>(&mut self, timer: &mut T, period: u16, handler: PeriodicHandler) {
        self.period = period;
        self.handler = handler;
        self.active = true;

        let deadline = timer.count_stable().wrapping_add(period);
        timer.set_compare(Channel::Periodic, deadline);
        timer.clear_pending(Channel::Periodic);
        timer.enable_irq(Channel::Periodic);
    }

    /// Disarm. The stored handler is preserved for a later `start`.
    pub fn stop<T: TimerDevice>(&mut self, timer: &mut T) {
        timer.disable_irq(Channel::Periodic);
        self.active = false;
    }

    /// Change the period taking effect at the next re-arm. Used by handlers
    /// that alternate cadences.
    pub fn set_period(&mut self, period: u16) {
        self.period = period;
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    pub fn handler(&self) -> PeriodicHandler {
        self.handler
    }

    pub fn is_running(&self) -> bool {
        self.active
    }
}

impl Default for Periodic {
    fn default() -> Self {
        Periodic::new()
    }
}

/// Blocking foreground delay on channel 3.
///
/// Arms the channel for now + `ticks`, then sleeps until the deadline
/// interrupt raises the elapsed flag. Each wake runs `wake.on_wake()` for
/// watchdog service and partial display refresh before the flag is checked
/// inside a critical section, so the interrupt cannot slip between the check
/// and the next sleep.
///
/// A new call supersedes a pending one by re-arming the same channel. If the
/// timer is not running the call returns immediately, without sleeping and
/// without touching the elapsed flag.
pub fn delay<T, W>(timer: &mut T, flags: &SharedFlags, wake: &mut W, ticks: u16)
where
    T: TimerDevice,
    W: Wake,
{
    // A stopped counter would never reach the compare value.
    if !timer.is_running() {
        return;
    }

    timer.disable_irq(Channel::Delay);
    flags.sys.clear(flags::sys::DELAY_OVER);

    let deadline = timer.count_stable().wrapping_add(ticks);
    timer.set_compare(Channel::Delay, deadline);
    timer.clear_pending(Channel::Delay);
    timer.enable_irq(Channel::Delay);

    loop {
        wake.sleep();
        wake.on_wake();
        if critical_section::with(|_| flags.sys.test(flags::sys::DELAY_OVER)) {
            break;
        }
    }
}

/// Cause decode for the shared channel 1–3 vector.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerVector {
    Stopwatch,
    Periodic,
    Delay,
}

/// Shared-vector interrupt service.
///
/// Per fire, strictly: mask, clear pending, re-arm, unmask, then run the
/// handler — a slow handler can therefore never cause a missed reload. The
/// periodic channel re-arms from a fresh counter sample rather than the stale
/// deadline, so handler latency does not accumulate as drift.
pub fn service<B>(
    vector: TimerVector,
    board: &mut B,
    flags: &SharedFlags,
    periodic: &mut Periodic,
    stopwatch: &mut Stopwatch,
    buzzer: &mut Buzzer,
) where
    B: TimerDevice + ButtonPort + Display + BuzzerPin,
{
    match vector {
        TimerVector::Stopwatch => {
            board.disable_irq(Channel::Stopwatch);
            TimerDevice::clear_pending(board, Channel::Stopwatch);
            stopwatch.advance_compare(board);
            board.enable_irq(Channel::Stopwatch);
            stopwatch.tick(board, flags, periodic, buzzer);
        }
        TimerVector::Periodic => {
            board.disable_irq(Channel::Periodic);
            TimerDevice::clear_pending(board, Channel::Periodic);
            let deadline = board.count_stable().wrapping_add(periodic.period());
            board.set_compare(Channel::Periodic, deadline);
            board.enable_irq(Channel::Periodic);
            match periodic.handler() {
                PeriodicHandler::BuzzerStep => buzzer.step(board, periodic),
                PeriodicHandler::ButtonRepeat => button_repeat(board, flags),
            }
        }
        TimerVector::Delay => {
            board.disable_irq(Channel::Delay);
            TimerDevice::clear_pending(board, Channel::Delay);
            flags.sys.set(flags::sys::DELAY_OVER);
        }
    }
}

/// Auto-repeat: while up/down stay held, keep re-raising their press flags.
/// Only active while the menu has value-setting repeat enabled.
fn button_repeat<P: ButtonPort>(port: &mut P, flags: &SharedFlags) {
    if !flags.sys.test(flags::sys::UP_DOWN_REPEAT) {
        return;
    }
    if port.is_pressed(Button::Up) {
        flags.button.set(flags::button::UP);
    }
    if port.is_pressed(Button::Down) {
        flags.button.set(flags::button::DOWN);
    }
}
