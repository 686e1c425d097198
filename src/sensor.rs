//! Motion sensor measurement sessions.
//!
//! The sensor is optional hardware: on boards without one the session
//! entry point shows an error indicator and changes nothing else. Samples are
//! never fetched in interrupt context; the data-ready edge and the 1 Hz
//! countdown only raise a request flag that the foreground serves.

use crate::flags::{self, SharedFlags};
use crate::hw::{Display, Line, MotionSensor, Symbol};

/// A measurement session ends itself after this many seconds without user
/// interaction.
pub const MEASUREMENT_TIMEOUT_SECS: u8 = 60;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelMode {
    Off,
    Measuring,
}

/// Acceleration view over an optional [`MotionSensor`].
pub struct Accel<S: MotionSensor> {
    device: Option<S>,
    mode: AccelMode,
    timeout: u8,
    data: [u8; 3],
}

impl<S: MotionSensor> Accel<S> {
    pub const fn new(device: Option<S>) -> Self {
        Accel {
            device,
            mode: AccelMode::Off,
            timeout: 0,
            data: [0; 3],
        }
    }

    pub fn is_present(&self) -> bool {
        self.device.is_some()
    }

    pub fn is_measuring(&self) -> bool {
        self.mode == AccelMode::Measuring
    }

    /// Latest fetched x/y/z sample.
    pub fn data(&self) -> [u8; 3] {
        self.data
    }

    /// Begin a measurement session. Without a sensor fitted this only shows
    /// the error indicator.
    pub fn start_measurement<D: Display>(&mut self, display: &mut D) {
        let Some(device) = self.device.as_mut() else {
            display.chars(Line::Line1, b"ERR ");
            return;
        };

        device.start();
        self.mode = AccelMode::Measuring;
        self.timeout = MEASUREMENT_TIMEOUT_SECS;
        display.symbol(Symbol::Decimal, true);
        debug!("accel measurement started");
    }

    /// End the session and quiesce the display.
    pub fn stop_measurement<D: Display>(&mut self, display: &mut D) {
        if let Some(device) = self.device.as_mut() {
            device.stop();
        }
        self.mode = AccelMode::Off;
        self.timeout = 0;
        display.chars(Line::Line1, b"----");
        display.symbol(Symbol::ArrowUp, false);
        display.symbol(Symbol::ArrowDown, false);
        display.symbol(Symbol::Decimal, false);
        debug!("accel measurement stopped");
    }

    /// 1 Hz inactivity countdown. Returns the seconds remaining.
    pub(crate) fn countdown(&mut self) -> u8 {
        self.timeout = self.timeout.saturating_sub(1);
        self.timeout
    }

    /// Foreground service: fetch a sample if one was requested.
    pub fn service_request(&mut self, flags: &SharedFlags) {
        if !flags.request.take(flags::request::ACCEL_MEASUREMENT) {
            return;
        }
        if self.mode != AccelMode::Measuring {
            return;
        }
        if let Some(device) = self.device.as_mut() {
            self.data = device.read();
        }
    }
}
