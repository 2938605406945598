//! Pulse wave generator (2A03, MMC5)

use super::HALF_FRAME_CYCLES;
use crate::constants::{DUTY_TABLE, LENGTH_TABLE};
use crate::sound::{EdgeClock, SoundGenerator, SoundOutput};

/// Pulse wave generator
///
/// Mirrors the register fields of one 2A03 pulse voice. The sweep unit and
/// length counter are clocked by an internal half-frame sequencer.
#[derive(Debug, Clone)]
pub struct PulseSound {
    /// Duty selector (0-3), first index of [`DUTY_TABLE`]
    pub duty_length: u8,
    /// Length counter halt / envelope loop
    pub looping: bool,
    /// Constant volume flag
    pub envelope_fix: bool,
    /// Constant volume (0-15)
    pub fixed_volume: u8,
    /// Sweep unit enable
    pub sweep_enabled: bool,
    /// Sweep divider period (1-8)
    pub sweep_period: u8,
    /// Sweep negate flag (true lowers the period, raising the pitch)
    pub sweep_mode: bool,
    /// Sweep shift count (0-7)
    pub sweep_shift: u8,
    /// Set when the sweep fields were rewritten; reloads the divider
    pub sweep_updated: bool,
    /// Timer period (0-2047)
    pub period: u16,
    /// Length counter value
    pub length_counter: u8,
    /// Channel enable ($4015 bit)
    pub enabled: bool,
    /// First pulse voice (uses ones' complement negation in the sweep unit)
    pub ones_complement: bool,

    clock: EdgeClock,
    timer: u32,
    step: usize,
    half_frame: u32,
    sweep_divider: u8,
}

impl PulseSound {
    /// Create a silent pulse generator
    pub fn new() -> Self {
        let mut pulse = Self {
            duty_length: 0,
            looping: false,
            envelope_fix: false,
            fixed_volume: 0,
            sweep_enabled: false,
            sweep_period: 1,
            sweep_mode: false,
            sweep_shift: 0,
            sweep_updated: false,
            period: 0,
            length_counter: 0,
            enabled: true,
            ones_complement: false,
            clock: EdgeClock::default(),
            timer: 1,
            step: 0,
            half_frame: HALF_FRAME_CYCLES,
            sweep_divider: 1,
        };
        pulse.reset();
        pulse
    }

    /// Create the first 2A03 pulse voice
    pub fn first() -> Self {
        let mut pulse = Self::new();
        pulse.ones_complement = true;
        pulse
    }

    /// Period the sweep unit is heading for
    fn sweep_target(&self) -> i32 {
        let period = self.period as i32;
        let change = period >> self.sweep_shift;
        if self.sweep_mode {
            period - change - if self.ones_complement { 1 } else { 0 }
        } else {
            period + change
        }
    }

    /// Whether the sweep unit currently silences the voice
    fn is_muted(&self) -> bool {
        self.period < 8 || (!self.sweep_mode && self.sweep_target() > 0x7FF)
    }

    fn clock_half_frame(&mut self) {
        if self.sweep_updated {
            self.sweep_updated = false;
            self.sweep_divider = self.sweep_period;
        } else if self.sweep_divider > 1 {
            self.sweep_divider -= 1;
        } else {
            self.sweep_divider = self.sweep_period;
            if self.sweep_enabled && self.sweep_shift > 0 && !self.is_muted() {
                self.period = self.sweep_target().clamp(0, 0x7FF) as u16;
            }
        }

        if !self.looping && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }

    fn output(&self) -> i32 {
        if !self.enabled || self.length_counter == 0 || self.is_muted() {
            return 0;
        }
        let duty = (self.duty_length & 0x03) as usize;
        if DUTY_TABLE[duty][self.step] {
            self.fixed_volume as i32
        } else {
            0
        }
    }
}

impl Default for PulseSound {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundGenerator for PulseSound {
    fn reset(&mut self) {
        self.duty_length = 0;
        self.fixed_volume = 0;
        self.looping = false;
        self.envelope_fix = false;

        self.sweep_enabled = false;
        self.sweep_period = 1;
        self.sweep_mode = false;
        self.sweep_shift = 0;
        self.sweep_updated = false;

        self.period = 0;
        self.length_counter = LENGTH_TABLE[0];
        self.enabled = true;

        self.clock.reset();
        self.timer = 1;
        self.step = 0;
        self.half_frame = HALF_FRAME_CYCLES;
        self.sweep_divider = 1;
    }

    fn process(&mut self, cycles: u32, out: &mut dyn SoundOutput) {
        let mut remain = cycles;
        while remain > 0 {
            let muted = self.is_muted();
            let mut run = remain.min(self.half_frame);
            if !muted {
                run = run.min(self.timer);
            }

            self.clock.time += run;
            remain -= run;
            self.half_frame -= run;

            if !muted {
                self.timer -= run;
                if self.timer == 0 {
                    self.timer = self.period as u32 + 1;
                    self.step = (self.step + 1) & 0x0F;
                }
            }
            if self.half_frame == 0 {
                self.half_frame = HALF_FRAME_CYCLES;
                self.clock_half_frame();
            }

            let level = self.output();
            self.clock.emit(level, out);
        }
    }

    fn end_frame(&mut self) {
        self.clock.time = 0;
    }

    fn level(&self) -> i32 {
        self.clock.last
    }
}
