//! The 1 Hz time base on channel 0.
//!
//! Beyond keeping the second boundary, the tick runs everything that wants a
//! coarse clock: long-press promotion, the button-lock gesture, the message
//! display lifecycle, the backlight timeout and the measurement inactivity
//! countdown.

use crate::button::ButtonInput;
use crate::flags::{self, SharedFlags};
use crate::hw::{Button, ButtonPort, Channel, Display, Edge, MotionSensor, TimerDevice};
use crate::sensor::Accel;
use crate::TICKS_PER_SECOND;

/// Seconds a star/num hold must exceed to count as a long press.
pub const LONG_PRESS_SECS: u8 = 3;
/// Seconds the num+down chord must exceed to toggle the button lock.
pub const LOCK_GESTURE_SECS: u8 = 3;
/// Seconds the backlight stays lit after the backlight button.
pub const BACKLIGHT_TIME_ON: u8 = 5;
/// Seconds a message stays on the display before it is erased.
pub const MESSAGE_WINDOW_SECS: u8 = 3;

/// State owned by the 1 Hz tick.
pub struct Timebase {
    lock_hold: u8,
    message_window: u8,
}

impl Timebase {
    pub const fn new() -> Self {
        Timebase {
            lock_hold: 0,
            message_window: 0,
        }
    }

    /// Arm channel 0 one second from now.
    pub fn start<T: TimerDevice>(&mut self, timer: &mut T) {
        let deadline = timer.count_stable().wrapping_add(TICKS_PER_SECOND);
        timer.set_compare(Channel::ClockTick, deadline);
        timer.clear_pending(Channel::ClockTick);
        timer.enable_irq(Channel::ClockTick);
    }

    /// One second elapsed, from the channel 0 interrupt.
    pub fn on_tick<B, S>(
        &mut self,
        board: &mut B,
        flags: &SharedFlags,
        buttons: &mut ButtonInput,
        accel: &mut Accel<S>,
    ) where
        B: TimerDevice + ButtonPort + Display,
        S: MotionSensor,
    {
        // Re-arm from the previous deadline: the 1 Hz base must not
        // accumulate interrupt latency.
        let deadline = board
            .compare(Channel::ClockTick)
            .wrapping_add(TICKS_PER_SECOND);
        board.set_compare(Channel::ClockTick, deadline);
        TimerDevice::clear_pending(board, Channel::ClockTick);

        if accel.is_measuring() {
            if accel.countdown() == 0 {
                accel.stop_measurement(board);
            } else if board.sensor_ready() {
                // Data-ready level poll, in case the edge was missed.
                flags.request.set(flags::request::ACCEL_MEASUREMENT);
            }
        }

        // Messages become visible on the second change, stay for their
        // window, then erasure hands the display back to the regular
        // content.
        if flags.message.take(flags::message::PREPARE) {
            flags.message.set(flags::message::SHOW);
            self.message_window = MESSAGE_WINDOW_SECS;
        } else if flags.message.take(flags::message::ERASE) {
            flags.message.clear_all();
            flags.display.set(flags::display::FULL_UPDATE);
            self.message_window = 0;
        } else if self.message_window > 0 {
            self.message_window -= 1;
            if self.message_window == 0 {
                flags.message.set(flags::message::ERASE);
            }
        }

        if buttons.backlight_on {
            buttons.backlight_elapsed += 1;
            if buttons.backlight_elapsed >= BACKLIGHT_TIME_ON {
                board.set_backlight(false);
                buttons.backlight_on = false;
                buttons.backlight_elapsed = 0;
            }
        }

        if board.is_pressed(Button::Num) && board.is_pressed(Button::Down) {
            self.hold_lock_gesture(flags);
            // The chord must not also read as individual holds.
            buttons.reset_holds();
        } else {
            self.lock_hold = 0;
            self.promote_long_presses(board, flags, buttons);
        }
    }

    fn hold_lock_gesture(&mut self, flags: &SharedFlags) {
        self.lock_hold += 1;
        if self.lock_hold <= LOCK_GESTURE_SECS {
            return;
        }
        self.lock_hold = 0;

        let message = if flags.buttons_locked() {
            flags.sys.clear(flags::sys::LOCK_BUTTONS);
            debug!("buttons unlocked");
            flags::message::TYPE_UNLOCKED
        } else {
            flags.sys.set(flags::sys::LOCK_BUTTONS);
            debug!("buttons locked");
            flags::message::TYPE_LOCKED
        };
        flags.message.set(flags::message::PREPARE | message);
    }

    /// Promote a continuous star/num hold to a long press: raise the long
    /// flag, withdraw the short one and restore the line's default edge
    /// sense in case the debounce pass left it inverted.
    fn promote_long_presses<B>(&self, board: &mut B, flags: &SharedFlags, buttons: &mut ButtonInput)
    where
        B: TimerDevice + ButtonPort,
    {
        for button in Button::MONITORED {
            let Some(hold) = buttons.hold_mut(button) else {
                continue;
            };
            if !board.is_pressed(button) {
                *hold = 0;
                continue;
            }
            *hold += 1;
            if *hold <= LONG_PRESS_SECS {
                continue;
            }
            *hold = 0;

            if let Some(long) = flags::long_mask(button) {
                flags.button.set(long);
            }
            flags.button.clear(flags::short_mask(button));
            board.set_edge_sense(button, Edge::Press);
            debug!("long press promoted");
        }
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Timebase::new()
    }
}
