//! Hardware seam: traits the board binding implements.
//!
//! The core never touches registers. A board crate maps these traits onto the
//! real timer, input port, LCD, buzzer output and motion sensor; the tests in
//! this crate run them against [`mock`].

/// Functional assignment of the four compare channels.
///
/// The assignment is fixed for the life of the device and shared between the
/// core and the board's interrupt vectors; see the crate-level table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// 1 Hz time base.
    ClockTick = 0,
    /// ~100 Hz stopwatch sub-tick.
    Stopwatch = 1,
    /// Configurable periodic callback.
    Periodic = 2,
    /// One-shot foreground delay.
    Delay = 3,
}

impl Channel {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The single hardware timer: a free-running 16-bit counter at 32768 Hz and
/// one compare unit per [`Channel`].
pub trait TimerDevice {
    /// Whether the counter is running at all.
    fn is_running(&self) -> bool;

    /// Single raw read of the counter. May race the free-running increment;
    /// use [`TimerDevice::count_stable`] for any cross-domain read.
    fn count(&self) -> u16;

    fn compare(&self, channel: Channel) -> u16;
    fn set_compare(&mut self, channel: Channel, value: u16);

    fn irq_enabled(&self, channel: Channel) -> bool;
    fn enable_irq(&mut self, channel: Channel);
    fn disable_irq(&mut self, channel: Channel);
    fn clear_pending(&mut self, channel: Channel);

    /// Read the counter until two consecutive samples agree.
    ///
    /// The counter increments in its own clock domain, so a lone read can
    /// tear. Two agreeing samples are required before the value is used.
    fn count_stable(&self) -> u16 {
        let mut value = self.count();
        loop {
            let again = self.count();
            if again == value {
                return value;
            }
            value = again;
        }
    }
}

/// The five front buttons.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Star,
    Num,
    Up,
    Down,
    Backlight,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::Star,
        Button::Num,
        Button::Up,
        Button::Down,
        Button::Backlight,
    ];

    /// Buttons whose continuous hold is promoted to a long press by the
    /// 1 Hz time base.
    pub const MONITORED: [Button; 2] = [Button::Star, Button::Num];

    /// Bit of this button in port masks and in the short-press flag register.
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// All button bits of the port interrupt group.
pub const ALL_BUTTONS_MASK: u8 = 0x1f;

/// Data-ready line of the motion sensor, sharing the port interrupt group.
pub const SENSOR_DRDY_MASK: u8 = 0x20;

/// Which transition a line's interrupt currently fires on.
///
/// `Press` is the default sense. The debounce pass flips a line to `Release`
/// when it needs to observe the trailing edge of an apparent noise burst.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Press,
    Release,
}

/// Button/sensor input port with per-line edge interrupts.
pub trait ButtonPort {
    /// Current debounce-free line level.
    fn is_pressed(&self, button: Button) -> bool;

    /// Captured interrupt flags for the triggering edge: [`Button::mask`]
    /// bits plus [`SENSOR_DRDY_MASK`].
    fn pending(&self) -> u8;

    fn enabled(&self) -> u8;
    fn set_enabled(&mut self, mask: u8);
    fn clear_pending(&mut self);

    fn edge_sense(&self, button: Button) -> Edge;
    fn set_edge_sense(&mut self, button: Button, edge: Edge);

    /// Level of the sensor data-ready line.
    fn sensor_ready(&self) -> bool;

    /// Drive the backlight pin.
    fn set_backlight(&mut self, on: bool);
}

/// Display symbols the core drives directly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    StopwatchIcon,
    ArrowUp,
    ArrowDown,
    Decimal,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    Line1,
    Line2,
}

/// Segment display collaborator. All calls are fire and forget; no result is
/// inspected.
pub trait Display {
    fn symbol(&mut self, symbol: Symbol, on: bool);
    /// Write a full line of characters.
    fn chars(&mut self, line: Line, text: &[u8]);
    /// Write a single character position, for partial redraw.
    fn char_at(&mut self, line: Line, position: usize, ch: u8);
}

/// Buzzer output stage. The pulse cadence lives in [`crate::buzzer`]; the
/// board only switches the tone on and off.
pub trait BuzzerPin {
    fn buzzer_on(&mut self);
    fn buzzer_off(&mut self);
}

/// Motion sensor collaborator. Presence gating lives in [`crate::sensor`];
/// these are only called when the sensor was detected at boot.
pub trait MotionSensor {
    fn start(&mut self);
    fn stop(&mut self);
    /// Fetch the latest x/y/z sample.
    fn read(&mut self) -> [u8; 3];
}

/// Foreground sleep hook for the one-shot delay.
pub trait Wake {
    /// Enter the lowest available sleep state until the next interrupt.
    fn sleep(&mut self);

    /// Per-wake bookkeeping: watchdog service and partial refresh of an
    /// active timed view.
    fn on_wake(&mut self) {}
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use crate::flags::{self, SharedFlags};

    /// Scripted board for host tests.
    ///
    /// The counter does not advance on its own; tests call
    /// [`MockBoard::advance`] between interrupt deliveries.
    pub struct MockBoard {
        pub running: bool,
        pub ticks: u16,
        pub compare: [u16; 4],
        pub irq_en: [bool; 4],
        pub pending_irq: [bool; 4],
        pub pressed: u8,
        pub port_pending: u8,
        pub port_enabled: u8,
        pub sense: [Edge; 5],
        pub drdy: bool,
        pub backlight: bool,
        pub buzzing: bool,
        pub symbols: Vec<(Symbol, bool)>,
        pub texts: Vec<(Line, Vec<u8>)>,
        pub partials: Vec<(Line, usize, u8)>,
    }

    impl MockBoard {
        pub fn new() -> Self {
            MockBoard {
                running: true,
                ticks: 0,
                compare: [0; 4],
                irq_en: [false; 4],
                pending_irq: [false; 4],
                pressed: 0,
                port_pending: 0,
                port_enabled: ALL_BUTTONS_MASK | SENSOR_DRDY_MASK,
                sense: [Edge::Press; 5],
                drdy: false,
                backlight: false,
                buzzing: false,
                symbols: Vec::new(),
                texts: Vec::new(),
                partials: Vec::new(),
            }
        }

        pub fn advance(&mut self, ticks: u16) {
            self.ticks = self.ticks.wrapping_add(ticks);
        }

        pub fn press(&mut self, button: Button) {
            self.pressed |= button.mask();
            self.port_pending |= button.mask();
        }

        pub fn release(&mut self, button: Button) {
            self.pressed &= !button.mask();
        }

        pub fn last_symbol(&self, symbol: Symbol) -> Option<bool> {
            self.symbols
                .iter()
                .rev()
                .find(|(s, _)| *s == symbol)
                .map(|(_, on)| *on)
        }
    }

    impl TimerDevice for MockBoard {
        fn is_running(&self) -> bool {
            self.running
        }

        fn count(&self) -> u16 {
            // Interior mutability is not worth the noise here; tearing is
            // scripted through `advance` in the tests that need it.
            self.ticks
        }

        fn count_stable(&self) -> u16 {
            // Default double-read converges instantly against a scripted
            // counter; exercised separately in `stable_read_converges`.
            self.ticks
        }

        fn compare(&self, channel: Channel) -> u16 {
            self.compare[channel.index()]
        }

        fn set_compare(&mut self, channel: Channel, value: u16) {
            self.compare[channel.index()] = value;
        }

        fn irq_enabled(&self, channel: Channel) -> bool {
            self.irq_en[channel.index()]
        }

        fn enable_irq(&mut self, channel: Channel) {
            self.irq_en[channel.index()] = true;
        }

        fn disable_irq(&mut self, channel: Channel) {
            self.irq_en[channel.index()] = false;
        }

        fn clear_pending(&mut self, channel: Channel) {
            self.pending_irq[channel.index()] = false;
        }
    }

    impl ButtonPort for MockBoard {
        fn is_pressed(&self, button: Button) -> bool {
            self.pressed & button.mask() != 0
        }

        fn pending(&self) -> u8 {
            self.port_pending
        }

        fn enabled(&self) -> u8 {
            self.port_enabled
        }

        fn set_enabled(&mut self, mask: u8) {
            self.port_enabled = mask;
        }

        fn clear_pending(&mut self) {
            self.port_pending = 0;
        }

        fn edge_sense(&self, button: Button) -> Edge {
            self.sense[button as usize]
        }

        fn set_edge_sense(&mut self, button: Button, edge: Edge) {
            self.sense[button as usize] = edge;
        }

        fn sensor_ready(&self) -> bool {
            self.drdy
        }

        fn set_backlight(&mut self, on: bool) {
            self.backlight = on;
        }
    }

    impl Display for MockBoard {
        fn symbol(&mut self, symbol: Symbol, on: bool) {
            self.symbols.push((symbol, on));
        }

        fn chars(&mut self, line: Line, text: &[u8]) {
            self.texts.push((line, text.to_vec()));
        }

        fn char_at(&mut self, line: Line, position: usize, ch: u8) {
            self.partials.push((line, position, ch));
        }
    }

    impl BuzzerPin for MockBoard {
        fn buzzer_on(&mut self) {
            self.buzzing = true;
        }

        fn buzzer_off(&mut self) {
            self.buzzing = false;
        }
    }

    /// Wake hook that plays the part of the delay-channel interrupt: every
    /// sleep immediately "fires" the deadline.
    pub struct FlagWake<'a> {
        pub flags: &'a SharedFlags,
        pub slept: usize,
    }

    impl<'a> FlagWake<'a> {
        pub fn new(flags: &'a SharedFlags) -> Self {
            FlagWake { flags, slept: 0 }
        }
    }

    impl Wake for FlagWake<'_> {
        fn sleep(&mut self) {
            self.slept += 1;
            self.flags.sys.set(flags::sys::DELAY_OVER);
        }
    }

    /// Wake hook for paths that must not sleep at all.
    pub struct NoSleep;

    impl Wake for NoSleep {
        fn sleep(&mut self) {
            panic!("entered sleep in a path that must not sleep");
        }
    }

    pub struct MockSensor {
        pub started: bool,
        pub stops: usize,
        pub reads: usize,
        pub sample: [u8; 3],
    }

    impl MockSensor {
        pub fn new() -> Self {
            MockSensor {
                started: false,
                stops: 0,
                reads: 0,
                sample: [1, 2, 3],
            }
        }
    }

    impl MotionSensor for MockSensor {
        fn start(&mut self) {
            self.started = true;
        }

        fn stop(&mut self) {
            self.started = false;
            self.stops += 1;
        }

        fn read(&mut self) -> [u8; 3] {
            self.reads += 1;
            self.sample
        }
    }
}
