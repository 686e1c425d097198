//! Button edge classification and debounce.
//!
//! The port interrupt hands the captured edge set to [`ButtonInput::on_edge`].
//! The pass masks the port, waits out the bounce with the one-shot delay,
//! then re-polls the lines: a line still pressed is a real press. A line
//! already released gets its edge sense inverted so the trailing edge of the
//! burst comes back as one more interrupt, which is then accepted as the
//! press; a lone spike never produces that trailing edge and is dropped.

use crate::flags::{self, SharedFlags};
use crate::hw::{
    Button, ButtonPort, Display, Edge, TimerDevice, Wake, ALL_BUTTONS_MASK, SENSOR_DRDY_MASK,
};
use crate::ms_to_ticks;
use crate::stopwatch::Stopwatch;
use crate::timer;

/// Settle time before the lines are re-polled.
pub const DEBOUNCE_MS: u16 = 5;

/// Foreground-side button state: long-press hold counters and the backlight
/// timeout, both advanced by the 1 Hz tick.
pub struct ButtonInput {
    star_hold: u8,
    num_hold: u8,
    pub(crate) backlight_on: bool,
    pub(crate) backlight_elapsed: u8,
}

impl ButtonInput {
    pub const fn new() -> Self {
        ButtonInput {
            star_hold: 0,
            num_hold: 0,
            backlight_on: false,
            backlight_elapsed: 0,
        }
    }

    pub(crate) fn hold_mut(&mut self, button: Button) -> Option<&mut u8> {
        match button {
            Button::Star => Some(&mut self.star_hold),
            Button::Num => Some(&mut self.num_hold),
            _ => None,
        }
    }

    pub(crate) fn reset_holds(&mut self) {
        self.star_hold = 0;
        self.num_hold = 0;
    }

    /// Port interrupt service: debounce and classify the captured edges.
    ///
    /// An unconsumed long press suspends classification so the release edge
    /// of the long hold cannot read as a fresh short press. The captured
    /// enable mask is restored on every path.
    pub fn on_edge<B, W>(
        &mut self,
        board: &mut B,
        flags: &SharedFlags,
        stopwatch: &mut Stopwatch,
        wake: &mut W,
    ) where
        B: TimerDevice + ButtonPort + Display,
        W: Wake,
    {
        let enabled = board.enabled();
        let pending = board.pending() & enabled;

        if !flags.button.test(flags::button::ANY_LONG) && pending & ALL_BUTTONS_MASK != 0 {
            // Anything unconsumed from the previous pass is stale now.
            flags.button.clear(flags::button::ALL_SHORT);

            critical_section::with(|_| board.set_enabled(0));
            timer::delay(board, flags, wake, ms_to_ticks(DEBOUNCE_MS));

            let mut click = false;
            for button in Button::ALL {
                if pending & button.mask() == 0 {
                    continue;
                }
                if board.is_pressed(button) {
                    click |= self.classify_press(board, flags, stopwatch, button);
                } else if board.edge_sense(button) == Edge::Release {
                    // Trailing edge of a bounce burst: the press was real.
                    board.set_edge_sense(button, Edge::Press);
                    click |= self.classify_press(board, flags, stopwatch, button);
                } else {
                    // Released again already: wait for the trailing edge.
                    board.set_edge_sense(button, Edge::Release);
                }
            }

            if click && !flags.sys.take(flags::sys::MASK_BUZZER) {
                flags.request.set(flags::request::BUZZER);
            }
        }

        if pending & SENSOR_DRDY_MASK != 0 {
            flags.request.set(flags::request::ACCEL_MEASUREMENT);
        }

        critical_section::with(|_| {
            ButtonPort::clear_pending(board);
            board.set_enabled(enabled);
        });
    }

    /// A confirmed press. Returns whether it earns the acknowledgment click.
    fn classify_press<B>(
        &mut self,
        board: &mut B,
        flags: &SharedFlags,
        stopwatch: &mut Stopwatch,
        button: Button,
    ) -> bool
    where
        B: TimerDevice + ButtonPort + Display,
    {
        if flags.buttons_locked() && button != Button::Backlight {
            // Remind instead of acting.
            flags.message.set(flags::message::PREPARE | flags::message::TYPE_LOCKED);
            return false;
        }

        match button {
            // Stop a visible running stopwatch right here, without the trip
            // through the menu loop.
            Button::Down if stopwatch.is_visible_running() => {
                stopwatch.stop(board, flags);
                true
            }
            Button::Backlight => {
                board.set_backlight(true);
                self.backlight_on = true;
                self.backlight_elapsed = 0;
                flags.button.set(flags::button::BACKLIGHT);
                false
            }
            _ => {
                flags.button.set(flags::short_mask(button));
                true
            }
        }
    }
}

impl Default for ButtonInput {
    fn default() -> Self {
        ButtonInput::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mock::{FlagWake, MockBoard, NoSleep};

    #[test_log::test]
    fn clean_press_sets_flag_and_clicks() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        board.press(Button::Star);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);

        assert!(flags.is_short_press(Button::Star));
        assert!(flags.request.test(flags::request::BUZZER));
        // Debounce actually slept once.
        assert_eq!(wake.slept, 1);
        // Captured interrupt state cleared, enable mask restored.
        assert_eq!(board.port_pending, 0);
        assert_eq!(board.port_enabled, ALL_BUTTONS_MASK | SENSOR_DRDY_MASK);
    }

    #[test]
    fn spike_is_dropped_but_trailing_edge_recovers_a_real_press() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        // The line is already back up when the debounced poll runs.
        board.press(Button::Num);
        board.release(Button::Num);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);
        assert!(!flags.is_short_press(Button::Num));
        assert_eq!(board.edge_sense(Button::Num), Edge::Release);

        // The trailing edge comes back as one more interrupt and is accepted.
        board.port_pending |= Button::Num.mask();
        input.on_edge(board, &flags, &mut sw, &mut wake);
        assert!(flags.is_short_press(Button::Num));
        assert_eq!(board.edge_sense(Button::Num), Edge::Press);
    }

    #[test]
    fn unconsumed_long_press_suspends_classification() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        flags.button.set(flags::button::NUM_LONG);
        board.press(Button::Star);
        // NoSleep proves the pass never reaches the debounce delay.
        input.on_edge(board, &flags, &mut sw, &mut NoSleep);

        assert!(!flags.is_short_press(Button::Star));
        assert_eq!(board.port_pending, 0);
        assert_eq!(board.port_enabled, ALL_BUTTONS_MASK | SENSOR_DRDY_MASK);
    }

    #[test]
    fn stale_short_flags_are_block_cleared() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        flags.button.set(flags::button::UP);
        board.press(Button::Star);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);

        assert!(!flags.is_short_press(Button::Up));
        assert!(flags.is_short_press(Button::Star));
    }

    #[test]
    fn down_stops_a_visible_running_stopwatch_directly() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        sw.set_visible(true);
        sw.start(board);
        board.press(Button::Down);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);

        assert!(!sw.is_running());
        // Handled in place: no down event reaches the menu.
        assert!(!flags.is_short_press(Button::Down));
        assert!(flags.request.test(flags::request::BUZZER));
    }

    #[test]
    fn down_reaches_the_menu_when_stopwatch_not_visible() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        sw.start(board);
        board.press(Button::Down);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);

        assert!(sw.is_running());
        assert!(flags.is_short_press(Button::Down));
    }

    #[test]
    fn locked_buttons_show_the_reminder_instead() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        flags.sys.set(flags::sys::LOCK_BUTTONS);
        sw.set_visible(true);
        sw.start(board);
        board.press(Button::Down);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);

        assert!(sw.is_running());
        assert!(!flags.is_short_press(Button::Down));
        assert!(!flags.request.test(flags::request::BUZZER));
        assert!(flags.message.test(flags::message::PREPARE));
        assert!(flags.message.test(flags::message::TYPE_LOCKED));
    }

    #[test]
    fn backlight_works_while_locked_and_never_clicks() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        flags.sys.set(flags::sys::LOCK_BUTTONS);
        board.press(Button::Backlight);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);

        assert!(board.backlight);
        assert!(input.backlight_on);
        assert!(flags.button.test(flags::button::BACKLIGHT));
        assert!(!flags.request.test(flags::request::BUZZER));
    }

    #[test]
    fn masked_buzzer_is_consumed_by_one_click() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        flags.sys.set(flags::sys::MASK_BUZZER);
        board.press(Button::Up);
        let mut wake = FlagWake::new(&flags);
        input.on_edge(board, &flags, &mut sw, &mut wake);
        assert!(!flags.request.test(flags::request::BUZZER));

        board.press(Button::Up);
        input.on_edge(board, &flags, &mut sw, &mut wake);
        assert!(flags.request.test(flags::request::BUZZER));
    }

    #[test]
    fn sensor_data_ready_skips_the_debounce() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        board.port_pending = SENSOR_DRDY_MASK;
        input.on_edge(board, &flags, &mut sw, &mut NoSleep);

        assert!(flags.request.test(flags::request::ACCEL_MEASUREMENT));
        assert_eq!(board.port_pending, 0);
    }

    #[test]
    fn disabled_lines_are_ignored() {
        let board = &mut MockBoard::new();
        let flags = SharedFlags::new();
        let mut input = ButtonInput::new();
        let mut sw = Stopwatch::new();

        board.set_enabled(SENSOR_DRDY_MASK);
        board.press(Button::Star);
        input.on_edge(board, &flags, &mut sw, &mut NoSleep);

        assert!(!flags.is_short_press(Button::Star));
        assert_eq!(board.port_enabled, SENSOR_DRDY_MASK);
    }
}
