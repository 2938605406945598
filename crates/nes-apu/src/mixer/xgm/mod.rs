//! Per-sample mixing strategy
//!
//! Signal path:
//!
//! ```text
//! generator -> XgmAudioChannel -> XgmMultiMixer (one per chip) -> track chain -> PCM
//! ```
//!
//! Each output sample averages every channel over the CPU cycles it covers,
//! sums the chips and runs the result through the interceptor chain of every
//! output track. Slower than the band-limited mixer but every sample can be
//! processed.

mod channel;
mod multi;

use channel::XgmAudioChannel;
use multi::XgmMultiMixer;

use super::config::MixerConfig;
use super::interceptor::{
    run_chain, set_kind_enabled, Compressor, DcFilter, EchoUnit, Interceptor, InterceptorKind,
    LowPassFilter, SoundInterceptor,
};
use super::SoundMixer;
use crate::channel::ChannelCode;
use crate::cycle_counter::CycleCounter;
use crate::param::FrameParameter;
use crate::{MixerError, Result};

/// Per-sample mixer with per-track interceptor chains
pub struct XgmSoundMixer {
    channels: Vec<XgmAudioChannel>,
    multis: Vec<XgmMultiMixer>,
    /// One chain per output track
    tracks: Vec<Vec<Interceptor>>,
    counter: CycleCounter,
    /// Interleaved output of the last rendered frame
    samples: Vec<i16>,
    produced: usize,
    sample_rate: u32,
    config: MixerConfig,
}

impl XgmSoundMixer {
    /// Build a per-sample mixer
    ///
    /// # Errors
    ///
    /// Returns an error if the track count is zero or the sample rate is zero.
    pub fn new(config: &MixerConfig, param: &FrameParameter) -> Result<Self> {
        config.validate()?;
        if param.sample_rate == 0 {
            return Err(MixerError::InvalidSampleRate(param.sample_rate));
        }

        let tracks = (0..config.track_count)
            .map(|_| Self::track_chain(config, param.sample_rate))
            .collect();
        Ok(Self {
            channels: Vec::new(),
            multis: Vec::new(),
            tracks,
            counter: CycleCounter::new(),
            samples: Vec::new(),
            produced: 0,
            sample_rate: param.sample_rate,
            config: config.clone(),
        })
    }

    /// Echo, DC filter, low-pass, compressor
    fn track_chain(config: &MixerConfig, sample_rate: u32) -> Vec<Interceptor> {
        let mut chain = vec![
            Interceptor::Echo(EchoUnit::new()),
            Interceptor::DcFilter(DcFilter::new(270, 164)),
            Interceptor::LowPass(LowPassFilter::new(4700, 112)),
            Interceptor::Compressor(Compressor::new(1.0, 1.0, 1.0)),
        ];
        for stage in &mut chain {
            stage.set_rate(sample_rate);
            let enabled = match stage.kind() {
                InterceptorKind::Echo => config.xgm.echo,
                InterceptorKind::DcFilter => config.xgm.dc_filter,
                InterceptorKind::LowPass => config.xgm.low_pass,
                InterceptorKind::Compressor => config.xgm.compressor,
                InterceptorKind::Amplifier => true,
            };
            stage.set_enabled(enabled);
        }
        chain
    }

    /// Change the number of output tracks
    ///
    /// Every track chain is rebuilt from the configuration; earlier toggles
    /// are lost.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::InvalidTrackCount`] for zero.
    pub fn set_track_count(&mut self, track_count: usize) -> Result<()> {
        if track_count == 0 {
            return Err(MixerError::InvalidTrackCount(track_count));
        }
        self.config.track_count = track_count;
        self.tracks = (0..track_count)
            .map(|_| Self::track_chain(&self.config, self.sample_rate))
            .collect();
        self.samples.clear();
        self.produced = 0;
        Ok(())
    }

    /// Attach an extra stage at the end of one track's chain
    ///
    /// Returns `false` if the track does not exist.
    pub fn attach_interceptor(&mut self, track: usize, mut interceptor: Interceptor) -> bool {
        let Some(chain) = self.tracks.get_mut(track) else {
            return false;
        };
        interceptor.set_rate(self.sample_rate);
        chain.push(interceptor);
        true
    }

    fn allocate_samples(&mut self, frames: usize) {
        let needed = frames * self.tracks.len();
        if self.samples.len() < needed || self.samples.len() - needed > 32 {
            self.samples = vec![0; (frames + 16) * self.tracks.len()];
        }
    }

    fn set_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate || sample_rate == 0 {
            return;
        }
        self.sample_rate = sample_rate;
        for stage in self.tracks.iter_mut().flatten() {
            stage.set_rate(sample_rate);
        }
        let chips: Vec<_> = self.multis.iter().map(|m| m.chip).collect();
        for (multi, chip) in self.multis.iter_mut().zip(chips) {
            let channels = std::mem::take(&mut multi.channels);
            *multi = XgmMultiMixer::new(chip, sample_rate);
            multi.channels = channels;
        }
    }
}

impl SoundMixer for XgmSoundMixer {
    fn allocate_channel(&mut self, code: ChannelCode) -> usize {
        if let Some(id) = self.channels.iter().position(|c| c.code == code) {
            return id;
        }

        let id = self.channels.len();
        self.channels
            .push(XgmAudioChannel::new(code, self.config.level_of(code)));

        let chip = code.chip();
        match self.multis.iter_mut().find(|m| m.chip == chip) {
            Some(multi) => multi.channels.push(id),
            None => {
                let mut multi = XgmMultiMixer::new(chip, self.sample_rate);
                multi.channels.push(id);
                self.multis.push(multi);
                log::debug!("xgm chip group {:?} created", chip);
            }
        }
        log::debug!("xgm channel {} allocated for {}", id, code);
        id
    }

    fn detach_all(&mut self) {
        self.channels.clear();
        self.multis.clear();
    }

    fn set_level(&mut self, id: usize, level: f32) {
        if let Some(channel) = self.channels.get_mut(id) {
            channel.level = level.max(0.0);
        }
    }

    #[inline]
    fn mix(&mut self, id: usize, value: i32, time: u32) {
        if let Some(channel) = self.channels.get_mut(id) {
            channel.mix(value, time);
        }
    }

    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        for multi in &mut self.multis {
            multi.reset();
        }
        for stage in self.tracks.iter_mut().flatten() {
            stage.reset();
        }
        self.samples.fill(0);
        self.produced = 0;
    }

    fn ready_buffer(&mut self, param: &FrameParameter) {
        self.set_rate(param.sample_rate);
        self.allocate_samples(param.sample_in_cur_frame);
        for channel in &mut self.channels {
            channel.check_capacity(param.freq_per_frame);
        }
    }

    fn finish_buffer(&mut self, param: &FrameParameter) -> usize {
        let frames = param.sample_in_cur_frame;
        self.allocate_samples(frames);
        self.counter.set_param(param.freq_per_frame, frames as u32);
        for channel in &mut self.channels {
            channel.before_render();
        }

        let track_count = self.tracks.len();
        let mut to = 0;
        for i in 0..frames {
            let from = to;
            let delta = self.counter.tick();
            to = self.counter.cycle_count();
            // A span ending on the frame boundary reads up to the last cycle
            let span_end = if to == 0 { param.freq_per_frame } else { to };

            let mut value = 0i32;
            for multi in &mut self.multis {
                value += multi.render(&mut self.channels, from, span_end, delta);
            }

            for (t, chain) in self.tracks.iter_mut().enumerate() {
                let out = run_chain(chain, value, delta) >> 1;
                self.samples[i * track_count + t] =
                    out.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            }
        }

        for channel in &mut self.channels {
            channel.after_render();
        }
        self.produced = frames;
        frames
    }

    fn read_buffer(&mut self, buf: &mut [i16]) -> usize {
        let len = buf.len().min(self.produced * self.tracks.len());
        buf[..len].copy_from_slice(&self.samples[..len]);
        self.samples.fill(0);
        self.produced = 0;
        len
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn set_interceptor_enabled(&mut self, kind: InterceptorKind, enabled: bool) -> bool {
        let mut found = false;
        for chain in &mut self.tracks {
            found |= set_kind_enabled(chain, kind, enabled);
        }
        if found {
            log::debug!("xgm interceptor {:?} enabled={}", kind, enabled);
        }
        found
    }
}

impl std::fmt::Debug for XgmSoundMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XgmSoundMixer")
            .field("channels", &self.channels.len())
            .field("chips", &self.multis.len())
            .field("tracks", &self.tracks.len())
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::XgmConfig;

    fn dry_config(track_count: usize) -> MixerConfig {
        MixerConfig {
            kind: crate::mixer::MixerKind::Xgm,
            track_count,
            xgm: XgmConfig {
                echo: false,
                dc_filter: false,
                low_pass: false,
                compressor: false,
            },
            ..MixerConfig::default()
        }
    }

    fn one_frame(mixer: &mut XgmSoundMixer, param: &FrameParameter, edges: &[(usize, i32, u32)]) -> Vec<i16> {
        mixer.ready_buffer(param);
        for &(id, value, time) in edges {
            mixer.mix(id, value, time);
        }
        let n = mixer.finish_buffer(param);
        let mut pcm = vec![0i16; n * mixer.track_count()];
        let read = mixer.read_buffer(&mut pcm);
        pcm.truncate(read);
        pcm
    }

    #[test]
    fn test_dry_output_is_halved_curve() {
        let param = FrameParameter::ntsc(48_000);
        let mut mixer = XgmSoundMixer::new(&dry_config(1), &param).unwrap();
        let id = mixer.allocate_channel(ChannelCode::Pulse1);

        let pcm = one_frame(&mut mixer, &param, &[(id, 15, 0)]);
        assert_eq!(pcm.len(), 800);
        let expected = ((crate::mixer::curves::pulse_2a03(15.0) * multi::XGM_GAIN).round() as i32) >> 1;
        assert!(pcm.iter().all(|&s| s as i32 == expected));
    }

    #[test]
    fn test_output_is_clamped() {
        let param = FrameParameter::ntsc(48_000);
        let mut mixer = XgmSoundMixer::new(&dry_config(1), &param).unwrap();
        mixer.allocate_channel(ChannelCode::Pulse1);
        mixer.set_level(0, 1000.0);

        let pcm = one_frame(&mut mixer, &param, &[(0, 15, 0)]);
        // The chip amplifier clips at full scale before the final halving
        assert!(pcm.iter().all(|&s| s == (32_767 >> 1) as i16));
    }

    #[test]
    fn test_tracks_interleave() {
        let param = FrameParameter::ntsc(48_000);
        let mut mixer = XgmSoundMixer::new(&dry_config(3), &param).unwrap();
        let id = mixer.allocate_channel(ChannelCode::Noise);

        let pcm = one_frame(&mut mixer, &param, &[(id, 9, 5000)]);
        assert_eq!(pcm.len(), 800 * 3);
        assert!(pcm.chunks(3).all(|c| c[0] == c[1] && c[1] == c[2]));
        assert!(pcm.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_interceptor_toggle() {
        let param = FrameParameter::ntsc(48_000);
        let mut mixer = XgmSoundMixer::new(&MixerConfig::default(), &param).unwrap();
        assert!(mixer.set_interceptor_enabled(InterceptorKind::Echo, false));
        assert!(!mixer.set_interceptor_enabled(InterceptorKind::Amplifier, false));
        assert!(mixer.tracks[0]
            .iter()
            .filter(|s| s.kind() == InterceptorKind::Echo)
            .all(|s| !s.is_enabled()));
    }

    #[test]
    fn test_track_count_change() {
        let param = FrameParameter::ntsc(48_000);
        let mut mixer = XgmSoundMixer::new(&dry_config(1), &param).unwrap();
        assert!(mixer.set_track_count(0).is_err());
        mixer.set_track_count(2).unwrap();
        assert_eq!(mixer.track_count(), 2);
    }

    #[test]
    fn test_sample_array_reallocation() {
        let mut param = FrameParameter::ntsc(48_000);
        let mut mixer = XgmSoundMixer::new(&dry_config(1), &param).unwrap();
        mixer.ready_buffer(&param);
        assert_eq!(mixer.samples.len(), 816);

        // Slightly smaller frames keep the array
        param.sample_in_cur_frame = 790;
        mixer.ready_buffer(&param);
        assert_eq!(mixer.samples.len(), 816);

        // Much smaller frames shrink it
        param.sample_in_cur_frame = 400;
        mixer.ready_buffer(&param);
        assert_eq!(mixer.samples.len(), 416);
    }
}
