//! Per-chip channel group

use super::channel::XgmAudioChannel;
use crate::channel::ChipType;
use crate::mixer::interceptor::{
    run_chain, Amplifier, Interceptor, LowPassFilter, SoundInterceptor,
};

/// Scale from loudness curve output to the pre-headroom sample range
pub(crate) const XGM_GAIN: f64 = 128.0;

/// All channels of one chip, summed and shaped together
#[derive(Debug, Clone)]
pub(crate) struct XgmMultiMixer {
    pub chip: ChipType,
    /// Ids into the mixer's channel arena
    pub channels: Vec<usize>,
    interceptors: Vec<Interceptor>,
}

impl XgmMultiMixer {
    pub fn new(chip: ChipType, sample_rate: u32) -> Self {
        let mut filter = LowPassFilter::new(4700, 0);
        filter.set_rate(sample_rate);
        let mut amp = Amplifier::new();
        amp.set_compress(100, -1);
        Self {
            chip,
            channels: Vec::new(),
            interceptors: vec![Interceptor::LowPass(filter), Interceptor::Amplifier(amp)],
        }
    }

    /// One sample of this chip
    pub fn render(
        &mut self,
        arena: &mut [XgmAudioChannel],
        from: u32,
        to: u32,
        time: u32,
    ) -> i32 {
        let sum: f64 = self
            .channels
            .iter()
            .filter_map(|&id| arena.get_mut(id).map(|ch| ch.render(from, to)))
            .sum();
        run_chain(&mut self.interceptors, (sum * XGM_GAIN).round() as i32, time)
    }

    pub fn reset(&mut self) {
        for stage in &mut self.interceptors {
            stage.reset();
        }
    }
}
