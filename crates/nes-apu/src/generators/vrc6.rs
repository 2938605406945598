//! Konami VRC6 generators

use crate::sound::{EdgeClock, SoundGenerator, SoundOutput};

/// VRC6 pulse generator
///
/// Sixteen-step pulse whose high portion lasts `duty + 1` steps.
#[derive(Debug, Clone)]
pub struct Vrc6PulseSound {
    /// Timer period (0-4095)
    pub period: u16,
    /// Volume (0-15)
    pub volume: u8,
    /// Duty (0-7)
    pub duty: u8,
    /// Gate (channel enable)
    pub gate: bool,

    clock: EdgeClock,
    timer: u32,
    step: u8,
}

impl Vrc6PulseSound {
    /// Create a gated-off VRC6 pulse generator
    pub fn new() -> Self {
        Self {
            period: 0,
            volume: 0,
            duty: 0,
            gate: false,
            clock: EdgeClock::default(),
            timer: 1,
            step: 0,
        }
    }

    fn output(&self) -> i32 {
        if self.gate && self.step <= (self.duty & 0x07) {
            self.volume as i32
        } else {
            0
        }
    }
}

impl Default for Vrc6PulseSound {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundGenerator for Vrc6PulseSound {
    fn reset(&mut self) {
        self.period = 0;
        self.volume = 0;
        self.duty = 0;
        self.gate = false;
        self.clock.reset();
        self.timer = 1;
        self.step = 0;
    }

    fn process(&mut self, cycles: u32, out: &mut dyn SoundOutput) {
        if !self.gate {
            self.clock.emit(0, out);
            self.clock.time += cycles;
            return;
        }

        let mut remain = cycles;
        while remain > 0 {
            let run = remain.min(self.timer);
            self.clock.time += run;
            remain -= run;
            self.timer -= run;

            if self.timer == 0 {
                self.timer = self.period as u32 + 1;
                self.step = (self.step + 1) & 0x0F;
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

/// VRC6 sawtooth generator
///
/// An accumulator gains `rate` on every second timer step and is cleared on
/// the fourteenth step; the top five bits are the output level (0-31).
#[derive(Debug, Clone)]
pub struct SawtoothSound {
    /// Timer period (0-4095)
    pub period: u16,
    /// Accumulator rate (0-63)
    pub rate: u8,
    /// Gate (channel enable)
    pub gate: bool,

    clock: EdgeClock,
    timer: u32,
    step: u8,
    accumulator: u8,
}

impl SawtoothSound {
    /// Create a gated-off sawtooth generator
    pub fn new() -> Self {
        Self {
            period: 0,
            rate: 0,
            gate: false,
            clock: EdgeClock::default(),
            timer: 1,
            step: 0,
            accumulator: 0,
        }
    }

    fn clock_step(&mut self) {
        self.step += 1;
        if self.step >= 14 {
            self.step = 0;
            self.accumulator = 0;
        } else if self.step & 1 == 0 {
            self.accumulator = self.accumulator.wrapping_add(self.rate & 0x3F);
        }
    }

    fn output(&self) -> i32 {
        if self.gate {
            (self.accumulator >> 3) as i32
        } else {
            0
        }
    }
}

impl Default for SawtoothSound {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundGenerator for SawtoothSound {
    fn reset(&mut self) {
        self.period = 0;
        self.rate = 0;
        self.gate = false;
        self.clock.reset();
        self.timer = 1;
        self.step = 0;
        self.accumulator = 0;
    }

    fn process(&mut self, cycles: u32, out: &mut dyn SoundOutput) {
        if !self.gate {
            self.clock.emit(0, out);
            self.clock.time += cycles;
            return;
        }

        let mut remain = cycles;
        while remain > 0 {
            let run = remain.min(self.timer);
            self.clock.time += run;
            remain -= run;
            self.timer -= run;

            if self.timer == 0 {
                self.timer = self.period as u32 + 1;
                self.clock_step();
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
