//! Shared flag registers: the central interrupt/foreground surface.
//!
//! Every bit has exactly one producer and one consumer, so there are no
//! read-modify-write races by construction; the registers still guard each
//! access with a critical section because producer and consumer live in
//! different contexts. Flags are cleared by the consumer, never the producer,
//! with one exception: the block-clear of the transient press bits at the
//! start of each debounce pass ([`button::ALL_SHORT`]).

use core::cell::Cell;

use critical_section::Mutex;

use crate::hw::Button;

/// One register of independent boolean bits.
pub struct FlagRegister {
    bits: Mutex<Cell<u16>>,
}

impl FlagRegister {
    pub const fn new() -> Self {
        FlagRegister {
            bits: Mutex::new(Cell::new(0)),
        }
    }

    /// Producer side: raise the bits in `mask`.
    pub fn set(&self, mask: u16) {
        critical_section::with(|cs| {
            let bits = self.bits.borrow(cs);
            bits.set(bits.get() | mask);
        });
    }

    pub fn clear(&self, mask: u16) {
        critical_section::with(|cs| {
            let bits = self.bits.borrow(cs);
            bits.set(bits.get() & !mask);
        });
    }

    /// True if any bit in `mask` is raised. Does not clear.
    pub fn test(&self, mask: u16) -> bool {
        critical_section::with(|cs| self.bits.borrow(cs).get() & mask != 0)
    }

    /// Consumer side: test-and-clear in one critical section.
    pub fn take(&self, mask: u16) -> bool {
        critical_section::with(|cs| {
            let bits = self.bits.borrow(cs);
            let hit = bits.get() & mask != 0;
            bits.set(bits.get() & !mask);
            hit
        })
    }

    pub fn any(&self) -> bool {
        critical_section::with(|cs| self.bits.borrow(cs).get() != 0)
    }

    pub fn clear_all(&self) {
        critical_section::with(|cs| self.bits.borrow(cs).set(0));
    }

    pub fn snapshot(&self) -> u16 {
        critical_section::with(|cs| self.bits.borrow(cs).get())
    }
}

/// System state bits.
pub mod sys {
    /// Buttons are globally locked. State bit, toggled only by the
    /// lock-gesture code in the 1 Hz tick.
    pub const LOCK_BUTTONS: u16 = 1 << 0;
    /// Suppress the acknowledgment click for the next button event.
    /// Producer: menu logic. Consumer: debounce pass.
    pub const MASK_BUZZER: u16 = 1 << 1;
    /// Generate virtual up/down presses while those buttons are held.
    /// Producer: menu logic. Consumer: periodic button-repeat handler.
    pub const UP_DOWN_REPEAT: u16 = 1 << 2;
    /// One-shot delay deadline reached. Producer: delay-channel interrupt.
    /// Consumer: the next `delay` call, which clears it on entry.
    pub const DELAY_OVER: u16 = 1 << 3;
}

/// Foreground work requests.
pub mod request {
    /// Fetch a sample from the motion sensor. Producers: data-ready edge,
    /// 1 Hz measurement countdown. Consumer: `Accel::service_request`.
    pub const ACCEL_MEASUREMENT: u16 = 1 << 0;
    /// Sound the button acknowledgment click. Producer: debounce pass.
    /// Consumer: foreground buzzer dispatch.
    pub const BUZZER: u16 = 1 << 1;
}

/// Message display lifecycle. `PREPARE` is promoted to `SHOW` on the next
/// 1 Hz tick so messages appear synchronously with the second change.
pub mod message {
    pub const PREPARE: u16 = 1 << 0;
    pub const SHOW: u16 = 1 << 1;
    pub const ERASE: u16 = 1 << 2;
    /// Message content selectors for the display layer.
    pub const TYPE_LOCKED: u16 = 1 << 3;
    pub const TYPE_UNLOCKED: u16 = 1 << 4;
}

/// Display update requests. Producers: interrupt context. Consumer: the
/// foreground display pass.
pub mod display {
    pub const FULL_UPDATE: u16 = 1 << 0;
    pub const UPDATE_STOPWATCH: u16 = 1 << 1;
}

/// Button events. Short-press bit positions match [`Button::mask`].
/// Producers: debounce pass (short), 1 Hz tick (long). Consumer: menu logic,
/// which must clear explicitly via [`SharedFlags::clear_press`].
pub mod button {
    pub const STAR: u16 = 1 << 0;
    pub const NUM: u16 = 1 << 1;
    pub const UP: u16 = 1 << 2;
    pub const DOWN: u16 = 1 << 3;
    pub const BACKLIGHT: u16 = 1 << 4;
    pub const STAR_LONG: u16 = 1 << 5;
    pub const NUM_LONG: u16 = 1 << 6;

    /// All transient short-press bits, block-cleared per debounce pass.
    pub const ALL_SHORT: u16 = STAR | NUM | UP | DOWN | BACKLIGHT;
    /// An unconsumed long press suspends edge classification.
    pub const ANY_LONG: u16 = STAR_LONG | NUM_LONG;
}

/// Short-press flag bit of a button.
pub const fn short_mask(b: Button) -> u16 {
    b.mask() as u16
}

/// Long-press flag bit of a button, if it is long-press capable.
pub const fn long_mask(b: Button) -> Option<u16> {
    match b {
        Button::Star => Some(button::STAR_LONG),
        Button::Num => Some(button::NUM_LONG),
        _ => None,
    }
}

/// The process-wide flag registers.
pub struct SharedFlags {
    pub sys: FlagRegister,
    pub request: FlagRegister,
    pub message: FlagRegister,
    pub display: FlagRegister,
    pub button: FlagRegister,
}

impl SharedFlags {
    pub const fn new() -> Self {
        SharedFlags {
            sys: FlagRegister::new(),
            request: FlagRegister::new(),
            message: FlagRegister::new(),
            display: FlagRegister::new(),
            button: FlagRegister::new(),
        }
    }

    pub fn buttons_locked(&self) -> bool {
        self.sys.test(sys::LOCK_BUTTONS)
    }

    /// Pending short press for `b`. The caller clears with
    /// [`SharedFlags::clear_press`]; querying does not clear.
    pub fn is_short_press(&self, b: Button) -> bool {
        self.button.test(short_mask(b))
    }

    pub fn is_long_press(&self, b: Button) -> bool {
        match long_mask(b) {
            Some(mask) => self.button.test(mask),
            None => false,
        }
    }

    /// Consume both the short and long event of a button.
    pub fn clear_press(&self, b: Button) {
        let mut mask = short_mask(b);
        if let Some(long) = long_mask(b) {
            mask |= long;
        }
        self.button.clear(mask);
    }
}

impl Default for SharedFlags {
    fn default() -> Self {
        SharedFlags::new()
    }
}
