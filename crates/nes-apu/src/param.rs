//! Per-frame rendering parameters shared by the replayer and the mixers

use crate::constants::{
    BASE_FREQ_NTSC, BASE_FREQ_PAL, DEFAULT_SAMPLE_RATE, FRAME_RATE_NTSC, FRAME_RATE_PAL,
};

/// Clock and sample bookkeeping for one rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParameter {
    /// Output sample rate (Hz)
    pub sample_rate: u32,
    /// Musical frame rate (Hz)
    pub frame_rate: u32,
    /// CPU clock (Hz)
    pub freq_per_sec: u32,
    /// CPU cycles per frame
    pub freq_per_frame: u32,
    /// Output samples (per track) in the frame being rendered
    pub sample_in_cur_frame: usize,
}

impl FrameParameter {
    /// Build parameters for a clock and frame rate
    ///
    /// A zero frame rate is treated as one.
    pub fn new(sample_rate: u32, frame_rate: u32, freq_per_sec: u32) -> Self {
        let frame_rate = frame_rate.max(1);
        Self {
            sample_rate,
            frame_rate,
            freq_per_sec,
            freq_per_frame: freq_per_sec / frame_rate,
            sample_in_cur_frame: (sample_rate / frame_rate) as usize,
        }
    }

    /// NTSC clock at 60 Hz
    pub fn ntsc(sample_rate: u32) -> Self {
        Self::new(sample_rate, FRAME_RATE_NTSC, BASE_FREQ_NTSC)
    }

    /// PAL clock at 50 Hz
    pub fn pal(sample_rate: u32) -> Self {
        Self::new(sample_rate, FRAME_RATE_PAL, BASE_FREQ_PAL)
    }

    /// Change the frame rate, keeping the clock
    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.frame_rate = frame_rate.max(1);
        self.freq_per_frame = self.freq_per_sec / self.frame_rate;
    }
}

impl Default for FrameParameter {
    fn default() -> Self {
        Self::ntsc(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntsc_cycles_per_frame() {
        let param = FrameParameter::ntsc(48_000);
        assert_eq!(param.freq_per_frame, 29_829);
        assert_eq!(param.sample_in_cur_frame, 800);
    }

    #[test]
    fn test_custom_frame_rate() {
        let mut param = FrameParameter::pal(44_100);
        param.set_frame_rate(100);
        assert_eq!(param.freq_per_frame, BASE_FREQ_PAL / 100);

        param.set_frame_rate(0);
        assert_eq!(param.frame_rate, 1);
    }
}
