//! Mixing strategies
//!
//! A mixer owns one channel per allocated voice. Generators write level
//! changes into their channel through [`MixerOutput`]; once per frame the
//! mixer turns them into PCM.
//!
//! Frame protocol:
//! 1. [`SoundMixer::ready_buffer`] sizes the frame
//! 2. generators run and report edges
//! 3. [`SoundMixer::finish_buffer`] renders the frame
//! 4. [`SoundMixer::read_buffer`] hands out the samples

mod blip;
mod config;
pub mod curves;
pub mod interceptor;
mod xgm;

pub use blip::BlipSoundMixer;
pub use config::{BlipConfig, MixerConfig, MixerKind, XgmConfig};
pub use interceptor::{Interceptor, InterceptorKind, SoundInterceptor};
pub use xgm::XgmSoundMixer;

use crate::channel::ChannelCode;
use crate::param::FrameParameter;
use crate::sound::SoundOutput;
use crate::Result;

/// Common interface of both mixing strategies
pub trait SoundMixer: Send {
    /// Get the channel id for a voice, creating the channel if needed
    fn allocate_channel(&mut self, code: ChannelCode) -> usize;

    /// Drop every channel
    fn detach_all(&mut self);

    /// Set a channel's gain (1.0 = nominal)
    fn set_level(&mut self, id: usize, level: f32);

    /// Record a raw generator level for a channel at a cycle offset
    fn mix(&mut self, id: usize, value: i32, time: u32);

    /// Clear all audio history
    fn reset(&mut self);

    /// Prepare for a frame of `param.sample_in_cur_frame` samples
    fn ready_buffer(&mut self, param: &FrameParameter);

    /// Render the frame; returns samples per track
    fn finish_buffer(&mut self, param: &FrameParameter) -> usize;

    /// Copy the rendered frame out, interleaved by track
    ///
    /// Returns the number of values written. Whatever does not fit is
    /// discarded by the next [`SoundMixer::ready_buffer`], apart from a
    /// rounding surplus of a sample or two that the band-limited mixer plays
    /// at the start of the next frame.
    fn read_buffer(&mut self, buf: &mut [i16]) -> usize;

    /// Output tracks
    fn track_count(&self) -> usize;

    /// Switch a post-processing stage on or off on every track
    ///
    /// Returns `false` when the mixer has no stage of that kind.
    fn set_interceptor_enabled(&mut self, kind: InterceptorKind, enabled: bool) -> bool;
}

/// Routes a generator's edges into one mixer channel
pub struct MixerOutput<'a> {
    mixer: &'a mut dyn SoundMixer,
    id: usize,
}

impl<'a> MixerOutput<'a> {
    /// Bind a mixer channel
    pub fn new(mixer: &'a mut dyn SoundMixer, id: usize) -> Self {
        Self { mixer, id }
    }
}

impl SoundOutput for MixerOutput<'_> {
    #[inline]
    fn mix(&mut self, value: i32, time: u32) {
        self.mixer.mix(self.id, value, time);
    }
}

/// Build the mixer selected by `config`
///
/// # Errors
///
/// Returns an error when the configuration is invalid or the frame
/// parameters have a zero sample rate.
pub fn create_mixer(config: &MixerConfig, param: &FrameParameter) -> Result<Box<dyn SoundMixer>> {
    config.validate()?;
    if param.sample_rate == 0 {
        return Err(crate::MixerError::InvalidSampleRate(param.sample_rate));
    }
    log::debug!(
        "creating {:?} mixer: {} Hz, {} track(s)",
        config.kind,
        param.sample_rate,
        config.track_count
    );
    Ok(match config.kind {
        MixerKind::Blip => Box::new(BlipSoundMixer::new(config, param)?),
        MixerKind::Xgm => Box::new(XgmSoundMixer::new(config, param)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{PulseSound, TriangleSound};
    use crate::SoundGenerator;

    fn render_frames(kind: MixerKind, frames: usize) -> Vec<i16> {
        let config = MixerConfig {
            kind,
            ..MixerConfig::default()
        };
        let param = FrameParameter::ntsc(48_000);
        let mut mixer = create_mixer(&config, &param).unwrap();
        let pulse_id = mixer.allocate_channel(ChannelCode::Pulse1);
        let tri_id = mixer.allocate_channel(ChannelCode::Triangle);

        let mut pulse = PulseSound::first();
        pulse.period = 253;
        pulse.fixed_volume = 12;
        pulse.duty_length = 2;
        pulse.looping = true;
        let mut tri = TriangleSound::new();
        tri.period = 400;
        tri.enabled = true;

        let mut out = Vec::new();
        for _ in 0..frames {
            mixer.ready_buffer(&param);
            pulse.process(param.freq_per_frame, &mut MixerOutput::new(mixer.as_mut(), pulse_id));
            tri.process(param.freq_per_frame, &mut MixerOutput::new(mixer.as_mut(), tri_id));
            pulse.end_frame();
            tri.end_frame();
            let produced = mixer.finish_buffer(&param);
            let mut pcm = vec![0i16; produced];
            let read = mixer.read_buffer(&mut pcm);
            pcm.truncate(read);
            out.extend(pcm);
        }
        out
    }

    #[test]
    fn test_both_strategies_produce_a_frame_per_call() {
        for kind in [MixerKind::Blip, MixerKind::Xgm] {
            let pcm = render_frames(kind, 10);
            let per_frame = pcm.len() as f64 / 10.0;
            assert!((per_frame - 800.0).abs() <= 1.0, "{kind:?}: {per_frame}");
            assert!(pcm.iter().any(|&s| s != 0), "{kind:?} produced silence");
        }
    }

    #[test]
    fn test_same_input_same_output() {
        assert_eq!(render_frames(MixerKind::Xgm, 4), render_frames(MixerKind::Xgm, 4));
        assert_eq!(render_frames(MixerKind::Blip, 4), render_frames(MixerKind::Blip, 4));
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let param = FrameParameter::ntsc(48_000);
        let mut mixer = create_mixer(&MixerConfig::default(), &param).unwrap();
        let a = mixer.allocate_channel(ChannelCode::Noise);
        let b = mixer.allocate_channel(ChannelCode::Noise);
        let c = mixer.allocate_channel(ChannelCode::Dpcm);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let param = FrameParameter::ntsc(48_000);
        let config = MixerConfig {
            track_count: 0,
            ..MixerConfig::default()
        };
        assert!(create_mixer(&config, &param).is_err());

        let param = FrameParameter::new(0, 60, 1_789_773);
        assert!(create_mixer(&MixerConfig::default(), &param).is_err());
    }
}
