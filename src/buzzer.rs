//! Buzzer pulse trains, cadenced by the periodic callback channel.
//!
//! The foreground (or an alert inside the stopwatch interrupt) starts a train
//! of N pulses; every subsequent phase change happens in the periodic
//! handler, so nothing blocks while the train plays out.

use crate::hw::{BuzzerPin, TimerDevice};
use crate::ms_to_ticks;
use crate::timer::{Periodic, PeriodicHandler};

/// Default cadence of the button acknowledgment click.
pub const ON_TICKS: u16 = ms_to_ticks(20);
pub const OFF_TICKS: u16 = ms_to_ticks(200);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    Idle,
    On,
    Off,
}

/// Pulse train state machine.
pub struct Buzzer {
    phase: Phase,
    pulses: u8,
    on_ticks: u16,
    off_ticks: u16,
}

impl Buzzer {
    pub const fn new() -> Self {
        Buzzer {
            phase: Phase::Idle,
            pulses: 0,
            on_ticks: ON_TICKS,
            off_ticks: OFF_TICKS,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Pulses left in the current train, the one sounding included.
    pub fn pulses_remaining(&self) -> u8 {
        self.pulses
    }

    /// Begin a train of `pulses` pulses. A train already playing keeps the
    /// channel; the new request is dropped.
    pub fn start<B>(
        &mut self,
        board: &mut B,
        periodic: &mut Periodic,
        pulses: u8,
        on_ticks: u16,
        off_ticks: u16,
    ) where
        B: TimerDevice + BuzzerPin,
    {
        if self.phase != Phase::Idle || pulses == 0 {
            return;
        }
        self.pulses = pulses;
        self.on_ticks = on_ticks;
        self.off_ticks = off_ticks;

        self.phase = Phase::On;
        board.buzzer_on();
        periodic.start(board, on_ticks, PeriodicHandler::BuzzerStep);
    }

    /// One phase change, from the periodic handler.
    pub fn step<B>(&mut self, board: &mut B, periodic: &mut Periodic)
    where
        B: TimerDevice + BuzzerPin,
    {
        match self.phase {
            Phase::On => {
                board.buzzer_off();
                self.pulses -= 1;
                if self.pulses == 0 {
                    self.stop(board, periodic);
                } else {
                    self.phase = Phase::Off;
                    periodic.set_period(self.off_ticks);
                }
            }
            Phase::Off => {
                board.buzzer_on();
                self.phase = Phase::On;
                periodic.set_period(self.on_ticks);
            }
            // Stray fire after a stop; the channel is already quiet.
            Phase::Idle => {}
        }
    }

    /// Silence immediately and release the periodic channel.
    pub fn stop<B>(&mut self, board: &mut B, periodic: &mut Periodic)
    where
        B: TimerDevice + BuzzerPin,
    {
        periodic.stop(board);
        board.buzzer_off();
        self.phase = Phase::Idle;
        self.pulses = 0;
    }
}

impl Default for Buzzer {
    fn default() -> Self {
        Buzzer::new()
    }
}
