//! Drift-corrected stopwatch clock on channel 1.
//!
//! The nominal sub-tick reload (328 ticks) does not divide the 32768 Hz
//! clock: 100 reloads overshoot a second by 32 ticks. The reload is therefore
//! shortened by fixed constants when the previous sub-tick crossed a 1/10 s
//! boundary (−3) or a 1 s boundary (−5), which makes 100 sub-ticks sum to
//! exactly one second.
//!
//! Elapsed time is kept as a fixed-width ASCII digit sequence with per-digit
//! carry/borrow rather than an integer, so a redraw only has to touch the
//! digits that changed.

use crate::buzzer::{self, Buzzer};
use crate::flags::{self, SharedFlags};
use crate::hw::{BuzzerPin, Channel, Display, Line, Symbol, TimerDevice};
use crate::ms_to_ticks;
use crate::timer::Periodic;

/// Nominal compare reload for one 1/100 s sub-tick (32768 / 100, rounded up).
pub const SUBTICK: u16 = 328;
/// Reload reduction after a 1/10 s boundary.
const TENTH_CORRECTION: u16 = 3;
/// Reload reduction after a 1 s boundary.
const SECOND_CORRECTION: u16 = 5;
/// Hundredths-only redraws happen every 18th sub-tick to keep the display
/// bus quiet.
const HUNDREDTHS_REDRAW_PERIOD: u8 = 18;

/// Pulse count and on-time of the countdown expiry alert.
const EXPIRY_PULSES: u8 = 5;
const EXPIRY_ON_TICKS: u16 = ms_to_ticks(200);

/// Digit positions in the display sequence.
const HOUR_TENS: usize = 0;
const HOUR_UNITS: usize = 1;
const MINUTE_TENS: usize = 2;
const MINUTE_UNITS: usize = 3;
const SECOND_TENS: usize = 4;
const SECOND_UNITS: usize = 5;
const TENTHS: usize = 6;
const HUNDREDTHS: usize = 7;
pub const DIGIT_COUNT: usize = 8;

/// Highest ASCII digit per position; tens of minutes and seconds are base 6.
const DIGIT_MAX: [u8; DIGIT_COUNT] = [b'9', b'9', b'5', b'9', b'5', b'9', b'9', b'9'];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Stopped,
    Running,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    CountUp,
    CountDown,
}

pub struct Stopwatch {
    state: State,
    mode: Mode,
    digits: [u8; DIGIT_COUNT],
    /// The previous sub-tick crossed a 1/10 s boundary; the next reload
    /// carries the correction.
    tenth_boundary: bool,
    second_boundary: bool,
    /// Leftmost digit changed since the last redraw; `DIGIT_COUNT` = clean.
    dirty_from: usize,
    hundredths_throttle: u8,
    /// 30 s / 20 s / 10 s countdown alerts, each fired at most once per run.
    alerts_fired: [bool; 3],
    /// The stopwatch view owns the display. Set by the menu layer.
    visible: bool,
}

impl Stopwatch {
    pub const fn new() -> Self {
        Stopwatch {
            state: State::Stopped,
            mode: Mode::CountUp,
            digits: *b"00000000",
            tenth_boundary: false,
            second_boundary: false,
            dirty_from: DIGIT_COUNT,
            hundredths_throttle: 0,
            alerts_fired: [false; 3],
            visible: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Operating and owning the display: the condition for partial refresh
    /// and for the down-button interrupt fast path.
    pub fn is_visible_running(&self) -> bool {
        self.visible && self.state == State::Running
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// The digit sequence `HHMMSSth` (hours, minutes, seconds, tenths,
    /// hundredths).
    pub fn text(&self) -> &[u8; DIGIT_COUNT] {
        &self.digits
    }

    /// Start counting: arm channel 1 one sub-tick from now.
    pub fn start<B: TimerDevice + Display>(&mut self, board: &mut B) {
        self.state = State::Running;

        let now = board.count_stable();
        board.set_compare(Channel::Stopwatch, now);
        self.advance_compare(board);
        board.clear_pending(Channel::Stopwatch);
        board.enable_irq(Channel::Stopwatch);

        board.symbol(Symbol::StopwatchIcon, true);
        debug!("stopwatch started");
    }

    /// Stop counting. Does not reset the count.
    pub fn stop<B: TimerDevice + Display>(&mut self, board: &mut B, flags: &SharedFlags) {
        board.disable_irq(Channel::Stopwatch);
        self.state = State::Stopped;
        board.symbol(Symbol::StopwatchIcon, false);

        // Redraw the whole line once the foreground gets to it.
        self.dirty_from = 0;
        flags.display.set(flags::display::UPDATE_STOPWATCH);
        debug!("stopwatch stopped");
    }

    /// Clear the count and all per-run state. Leaves the mode unchanged.
    pub fn reset(&mut self) {
        self.digits = *b"00000000";
        self.tenth_boundary = false;
        self.second_boundary = false;
        self.alerts_fired = [false; 3];
        self.hundredths_throttle = 0;
        self.dirty_from = 0;
        self.state = State::Stopped;
    }

    /// Preset `minutes:seconds` and switch to countdown mode.
    pub fn load(&mut self, minutes: u8, seconds: u8) {
        self.reset();
        self.mode = Mode::CountDown;
        let m = minutes.min(59);
        let s = seconds.min(59);
        self.digits[MINUTE_TENS] = b'0' + m / 10;
        self.digits[MINUTE_UNITS] = b'0' + m % 10;
        self.digits[SECOND_TENS] = b'0' + s / 10;
        self.digits[SECOND_UNITS] = b'0' + s % 10;
    }

    /// Program the next sub-tick deadline, applying the correction owed from
    /// boundaries the previous sub-tick crossed.
    pub fn advance_compare<T: TimerDevice>(&mut self, timer: &mut T) {
        let mut value = timer.compare(Channel::Stopwatch).wrapping_add(SUBTICK);
        if self.second_boundary {
            value = value.wrapping_sub(SECOND_CORRECTION);
            self.second_boundary = false;
            self.tenth_boundary = false;
        } else if self.tenth_boundary {
            value = value.wrapping_sub(TENTH_CORRECTION);
            self.tenth_boundary = false;
        }
        timer.set_compare(Channel::Stopwatch, value);
    }

    /// One 1/100 s sub-tick, from the channel 1 interrupt.
    pub fn tick<B>(
        &mut self,
        board: &mut B,
        flags: &SharedFlags,
        periodic: &mut Periodic,
        buzzer: &mut Buzzer,
    ) where
        B: TimerDevice + Display + BuzzerPin,
    {
        match self.mode {
            Mode::CountUp => self.count_up(),
            Mode::CountDown => self.count_down(board, flags, periodic, buzzer),
        }
        flags.display.set(flags::display::UPDATE_STOPWATCH);
    }

    fn throttle_hundredths(&mut self) {
        self.hundredths_throttle += 1;
        if self.hundredths_throttle >= HUNDREDTHS_REDRAW_PERIOD {
            self.hundredths_throttle = 0;
            self.mark_dirty(HUNDREDTHS);
        }
    }

    fn count_up(&mut self) {
        self.throttle_hundredths();

        let mut pos = HUNDREDTHS;
        loop {
            self.digits[pos] += 1;
            if self.digits[pos] <= DIGIT_MAX[pos] {
                break;
            }
            self.digits[pos] = b'0';
            if pos == HUNDREDTHS {
                self.tenth_boundary = true;
            } else if pos == TENTHS {
                self.second_boundary = true;
            }
            if pos == HOUR_TENS {
                // 100 hours: wrap silently.
                break;
            }
            pos -= 1;
            self.mark_dirty(pos);
        }
    }

    fn count_down<B>(
        &mut self,
        board: &mut B,
        flags: &SharedFlags,
        periodic: &mut Periodic,
        buzzer: &mut Buzzer,
    ) where
        B: TimerDevice + Display + BuzzerPin,
    {
        self.throttle_hundredths();

        self.digits[HUNDREDTHS] -= 1;
        if self.digits[HUNDREDTHS] >= b'0' {
            return;
        }
        self.digits[HUNDREDTHS] = b'9';
        self.digits[TENTHS] -= 1;
        self.tenth_boundary = true;
        self.mark_dirty(TENTHS);
        if self.digits[TENTHS] >= b'0' {
            return;
        }

        // A whole second elapsed.
        self.second_boundary = true;
        self.alert_on_second(board, periodic, buzzer);

        if &self.digits[..=SECOND_UNITS] == b"000000" {
            // Countdown expired.
            buzzer.start(board, periodic, EXPIRY_PULSES, EXPIRY_ON_TICKS, buzzer::OFF_TICKS);
            self.stop(board, flags);
            self.reset();
            return;
        }

        self.digits[TENTHS] = b'9';
        self.digits[SECOND_UNITS] -= 1;
        self.mark_dirty(SECOND_UNITS);
        if self.digits[SECOND_UNITS] >= b'0' {
            return;
        }
        self.digits[SECOND_UNITS] = b'9';
        self.digits[SECOND_TENS] -= 1;
        self.mark_dirty(SECOND_TENS);
        if self.digits[SECOND_TENS] >= b'0' {
            return;
        }
        self.digits[SECOND_TENS] = b'5';
        self.digits[MINUTE_UNITS] -= 1;
        self.mark_dirty(MINUTE_UNITS);
        if self.digits[MINUTE_UNITS] >= b'0' {
            return;
        }
        self.digits[MINUTE_UNITS] = b'9';
        self.digits[MINUTE_TENS] -= 1;
        self.mark_dirty(MINUTE_TENS);
        if self.digits[MINUTE_TENS] >= b'0' {
            return;
        }
        self.digits[MINUTE_TENS] = b'5';
        self.digits[HOUR_UNITS] -= 1;
        self.mark_dirty(HOUR_UNITS);
        if self.digits[HOUR_UNITS] >= b'0' {
            return;
        }
        self.digits[HOUR_UNITS] = b'9';
        self.digits[HOUR_TENS] -= 1;
        self.mark_dirty(HOUR_TENS);
    }

    /// Fire the 30/20/10 s alert as the countdown leaves that whole second.
    fn alert_on_second<B>(&mut self, board: &mut B, periodic: &mut Periodic, buzzer: &mut Buzzer)
    where
        B: TimerDevice + BuzzerPin,
    {
        if &self.digits[..=MINUTE_UNITS] != b"0000" {
            return;
        }
        let alert = match (self.digits[SECOND_TENS], self.digits[SECOND_UNITS]) {
            (b'3', b'0') => 0,
            (b'2', b'0') => 1,
            (b'1', b'0') => 2,
            _ => return,
        };
        if self.alerts_fired[alert] {
            return;
        }
        self.alerts_fired[alert] = true;

        let pulses = [3, 2, 1][alert];
        buzzer.start(board, periodic, pulses, buzzer::ON_TICKS, buzzer::OFF_TICKS);
    }

    fn mark_dirty(&mut self, pos: usize) {
        if pos < self.dirty_from {
            self.dirty_from = pos;
        }
    }

    /// Redraw only the digits changed since the last redraw. Consumes the
    /// stopwatch display flag.
    pub fn render_partial<D: Display>(&mut self, display: &mut D, flags: &SharedFlags) {
        if !flags.display.take(flags::display::UPDATE_STOPWATCH) {
            return;
        }
        if self.dirty_from >= DIGIT_COUNT {
            return;
        }
        for pos in self.dirty_from..DIGIT_COUNT {
            display.char_at(Line::Line2, pos, self.digits[pos]);
        }
        self.dirty_from = DIGIT_COUNT;
    }

    /// Redraw the whole line.
    pub fn render_full<D: Display>(&mut self, display: &mut D) {
        display.chars(Line::Line2, &self.digits);
        self.dirty_from = DIGIT_COUNT;
    }

    #[cfg(test)]
    pub(crate) fn set_digits(&mut self, digits: [u8; DIGIT_COUNT]) {
        self.digits = digits;
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Stopwatch::new()
    }
}
