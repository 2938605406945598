//! Triangle wave generator (2A03)

use crate::constants::TRIANGLE_TABLE;
use crate::sound::{EdgeClock, SoundGenerator, SoundOutput};

/// Triangle wave generator
///
/// The triangle has no volume control. When the gate is closed the sequencer
/// freezes at its current step, exactly like the linear counter running out.
#[derive(Debug, Clone)]
pub struct TriangleSound {
    /// Timer period (0-2047)
    pub period: u16,
    /// Gate: linear counter loaded and channel enabled
    pub enabled: bool,

    clock: EdgeClock,
    timer: u32,
    step: usize,
}

impl TriangleSound {
    /// Create a gated-off triangle generator
    pub fn new() -> Self {
        Self {
            period: 0,
            enabled: false,
            clock: EdgeClock::default(),
            timer: 1,
            step: 0,
        }
    }

    fn output(&self) -> i32 {
        TRIANGLE_TABLE[self.step] as i32
    }

    /// Ultrasonic periods are not stepped (avoids audible aliasing)
    fn is_frozen(&self) -> bool {
        !self.enabled || self.period < 2
    }
}

impl Default for TriangleSound {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundGenerator for TriangleSound {
    fn reset(&mut self) {
        self.period = 0;
        self.enabled = false;
        self.clock.reset();
        self.timer = 1;
        self.step = 0;
    }

    fn process(&mut self, cycles: u32, out: &mut dyn SoundOutput) {
        if self.is_frozen() {
            let level = self.output();
            self.clock.emit(level, out);
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
                self.step = (self.step + 1) & 0x1F;
                let level = self.output();
                self.clock.emit(level, out);
            }
        }
    }

    fn end_frame(&mut self) {
        self.clock.time = 0;
    }

    fn level(&self) -> i32 {
        self.clock.last
    }
}
