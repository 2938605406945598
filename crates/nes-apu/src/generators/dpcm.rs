//! Delta modulation sample generator (2A03 DMC)

use std::sync::Arc;

use crate::constants::DPCM_RATE_TABLE;
use crate::sound::{EdgeClock, SoundGenerator, SoundOutput};

/// DPCM generator
///
/// Plays 1-bit delta encoded samples. Each bit moves the 7-bit output level up
/// or down by two. Sample data is shared, never copied.
#[derive(Debug, Clone)]
pub struct DpcmSound {
    /// Rate index into [`DPCM_RATE_TABLE`] (0-15)
    pub rate_index: u8,
    /// Restart the sample when it runs out
    pub looping: bool,

    sample: Option<Arc<[u8]>>,
    start: usize,
    position: usize,
    bit: u8,
    dac: u8,
    playing: bool,
    clock: EdgeClock,
    timer: u32,
}

impl DpcmSound {
    /// Create an idle DPCM generator
    pub fn new() -> Self {
        Self {
            rate_index: 0,
            looping: false,
            sample: None,
            start: 0,
            position: 0,
            bit: 0,
            dac: 0,
            playing: false,
            clock: EdgeClock::default(),
            timer: 1,
        }
    }

    /// Start playing a sample
    ///
    /// # Arguments
    ///
    /// * `data` - Delta encoded sample bytes
    /// * `offset` - Start offset in bytes; an offset past the end plays nothing
    pub fn start(&mut self, data: Arc<[u8]>, offset: usize) {
        self.start = offset.min(data.len());
        self.position = self.start;
        self.bit = 0;
        self.playing = self.start < data.len();
        self.sample = Some(data);
        self.timer = DPCM_RATE_TABLE[(self.rate_index & 0x0F) as usize] as u32;
    }

    /// Stop the sample; the output level is kept
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Load the 7-bit output level directly (Zxx)
    pub fn set_dac(&mut self, value: u8) {
        self.dac = value & 0x7F;
    }

    /// Current 7-bit output level
    pub fn dac(&self) -> u8 {
        self.dac
    }

    /// Whether a sample is running
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn clock_bit(&mut self) {
        let Some(data) = self.sample.as_ref() else {
            self.playing = false;
            return;
        };
        let Some(&byte) = data.get(self.position) else {
            self.playing = false;
            return;
        };

        if (byte >> self.bit) & 1 != 0 {
            if self.dac <= 125 {
                self.dac += 2;
            }
        } else if self.dac >= 2 {
            self.dac -= 2;
        }

        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.position += 1;
            if self.position >= data.len() {
                if self.looping {
                    self.position = self.start;
                } else {
                    self.playing = false;
                }
            }
        }
    }
}

impl Default for DpcmSound {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundGenerator for DpcmSound {
    fn reset(&mut self) {
        self.rate_index = 0;
        self.looping = false;
        self.sample = None;
        self.start = 0;
        self.position = 0;
        self.bit = 0;
        self.dac = 0;
        self.playing = false;
        self.clock.reset();
        self.timer = 1;
    }

    fn process(&mut self, cycles: u32, out: &mut dyn SoundOutput) {
        let level = self.dac as i32;
        self.clock.emit(level, out);

        if !self.playing {
            self.clock.time += cycles;
            return;
        }

        let period = DPCM_RATE_TABLE[(self.rate_index & 0x0F) as usize] as u32;
        let mut remain = cycles;
        while remain > 0 {
            let run = remain.min(self.timer);
            self.clock.time += run;
            remain -= run;
            self.timer -= run;

            if self.timer == 0 {
                self.timer = period;
                if self.playing {
                    self.clock_bit();
                    let level = self.dac as i32;
                    self.clock.emit(level, out);
                }
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
