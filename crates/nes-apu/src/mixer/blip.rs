//! Band-limited mixing strategy

use blip_buf::BlipBuf;

use super::config::MixerConfig;
use super::curves::{curve_for, LoudnessCurve};
use super::interceptor::InterceptorKind;
use super::SoundMixer;
use crate::channel::ChannelCode;
use crate::param::FrameParameter;
use crate::{MixerError, Result};

/// Scale from loudness curve output to 16-bit amplitude
const BLIP_GAIN: f64 = 64.0;

/// Extra capacity so a slightly long frame never overflows the buffer
const BUFFER_MARGIN: u32 = 64;

/// Unread samples kept for the next frame
///
/// The buffer's rate factor is rounded up, so a frame can end one sample
/// past the requested count; that sample opens the next frame.
const MAX_CARRY: usize = 2;

#[derive(Debug, Clone)]
struct BlipChannel {
    code: ChannelCode,
    curve: LoudnessCurve,
    level: f32,
    /// Amplitude currently present in the buffer
    amplitude: i32,
}

impl BlipChannel {
    fn amplitude_of(&self, value: i32) -> i32 {
        ((self.curve)(value as f64) * BLIP_GAIN * self.level as f64).round() as i32
    }
}

/// One-pole high-pass run on the samples as they are read out
#[derive(Debug, Clone)]
struct BassFilter {
    coefficient: i64,
    last_in: i64,
    out: i64,
}

impl BassFilter {
    const SHIFT: u32 = 16;

    fn new(freq: u32, sample_rate: u32) -> Self {
        let coefficient = if freq == 0 || sample_rate == 0 {
            0
        } else {
            let r = (-2.0 * std::f64::consts::PI * freq as f64 / sample_rate as f64).exp();
            (r * (1i64 << Self::SHIFT) as f64) as i64
        };
        Self {
            coefficient,
            last_in: 0,
            out: 0,
        }
    }

    #[inline]
    fn apply(&mut self, sample: i16) -> i16 {
        if self.coefficient == 0 {
            return sample;
        }
        let x = sample as i64;
        self.out = x - self.last_in + ((self.out * self.coefficient) >> Self::SHIFT);
        self.last_in = x;
        self.out.clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    fn reset(&mut self) {
        self.last_in = 0;
        self.out = 0;
    }
}

/// Band-limited mixer
///
/// Every level change becomes an amplitude step in a shared `blip_buf`
/// buffer, which band-limits the steps into samples at frame end. Fast, but
/// offers no per-sample processing. Extra tracks repeat the mono mix.
pub struct BlipSoundMixer {
    buffer: BlipBuf,
    capacity: u32,
    buffer_frames: u32,
    bass_freq: u32,
    bass_rate: u32,
    bass: BassFilter,
    channels: Vec<BlipChannel>,
    config: MixerConfig,
    track_count: usize,
    /// (cycles, samples) the buffer rates were last set for
    rates: (u32, usize),
    scratch: Vec<i16>,
}

impl BlipSoundMixer {
    /// Build a band-limited mixer
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the sample rate is
    /// zero.
    pub fn new(config: &MixerConfig, param: &FrameParameter) -> Result<Self> {
        config.validate()?;
        if param.sample_rate == 0 {
            return Err(MixerError::InvalidSampleRate(param.sample_rate));
        }

        let buffer_frames = config.blip.buffer_frames;
        let capacity = Self::capacity_for(param.sample_in_cur_frame, buffer_frames);
        let mut mixer = Self {
            buffer: BlipBuf::new(capacity),
            capacity,
            buffer_frames,
            bass_freq: config.blip.bass_freq,
            bass_rate: param.sample_rate,
            bass: BassFilter::new(config.blip.bass_freq, param.sample_rate),
            channels: Vec::new(),
            config: config.clone(),
            track_count: config.track_count,
            rates: (0, 0),
            scratch: Vec::new(),
        };
        mixer.apply_rates(param);
        Ok(mixer)
    }

    fn capacity_for(samples_per_frame: usize, frames: u32) -> u32 {
        (samples_per_frame as u32).max(1) * frames.max(1) + BUFFER_MARGIN
    }

    /// Map one frame of cycles onto one frame of samples
    fn apply_rates(&mut self, param: &FrameParameter) {
        let rates = (param.freq_per_frame, param.sample_in_cur_frame);
        if rates == self.rates || rates.0 == 0 || rates.1 == 0 {
            return;
        }
        self.buffer.set_rates(rates.0 as f64, rates.1 as f64);
        self.rates = rates;
    }
}

impl SoundMixer for BlipSoundMixer {
    fn allocate_channel(&mut self, code: ChannelCode) -> usize {
        if let Some(id) = self.channels.iter().position(|c| c.code == code) {
            return id;
        }
        self.channels.push(BlipChannel {
            code,
            curve: curve_for(code),
            level: self.config.level_of(code),
            amplitude: 0,
        });
        log::debug!("blip channel {} allocated for {}", self.channels.len() - 1, code);
        self.channels.len() - 1
    }

    fn detach_all(&mut self) {
        self.channels.clear();
    }

    fn set_level(&mut self, id: usize, level: f32) {
        if let Some(channel) = self.channels.get_mut(id) {
            channel.level = level.max(0.0);
        }
    }

    fn mix(&mut self, id: usize, value: i32, time: u32) {
        let Some(channel) = self.channels.get_mut(id) else {
            return;
        };
        let amplitude = channel.amplitude_of(value);
        let delta = amplitude - channel.amplitude;
        if delta != 0 {
            channel.amplitude = amplitude;
            self.buffer.add_delta(time, delta);
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.bass.reset();
        for channel in &mut self.channels {
            channel.amplitude = 0;
        }
    }

    fn ready_buffer(&mut self, param: &FrameParameter) {
        let needed = Self::capacity_for(param.sample_in_cur_frame, self.buffer_frames);
        if needed > self.capacity {
            // Steps already in the old buffer are lost; start channels from silence
            self.buffer = BlipBuf::new(needed);
            self.capacity = needed;
            self.rates = (0, 0);
            for channel in &mut self.channels {
                channel.amplitude = 0;
            }
        }
        if param.sample_rate != self.bass_rate {
            self.bass = BassFilter::new(self.bass_freq, param.sample_rate);
            self.bass_rate = param.sample_rate;
        }

        // Drop what a caller left unread, keeping the rounding carry
        let leftover = self.buffer.samples_avail() as usize;
        if leftover > MAX_CARRY {
            let drop = leftover - MAX_CARRY;
            self.scratch.resize(drop, 0);
            self.buffer.read_samples(&mut self.scratch[..drop], false);
        }
        self.apply_rates(param);
    }

    fn finish_buffer(&mut self, param: &FrameParameter) -> usize {
        self.buffer.end_frame(param.freq_per_frame);
        self.buffer.samples_avail() as usize
    }

    fn read_buffer(&mut self, buf: &mut [i16]) -> usize {
        let available = self.buffer.samples_avail() as usize;
        let tracks = self.track_count.max(1);
        let frames = available.min(buf.len() / tracks);

        // Samples past `frames` stay buffered; `ready_buffer` trims them
        self.scratch.resize(frames, 0);
        let read = self.buffer.read_samples(&mut self.scratch[..frames], false);

        for (i, &sample) in self.scratch[..read].iter().enumerate() {
            buf[i * tracks..(i + 1) * tracks].fill(self.bass.apply(sample));
        }
        read * tracks
    }

    fn track_count(&self) -> usize {
        self.track_count
    }

    fn set_interceptor_enabled(&mut self, _kind: InterceptorKind, _enabled: bool) -> bool {
        false
    }
}

impl std::fmt::Debug for BlipSoundMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlipSoundMixer")
            .field("capacity", &self.capacity)
            .field("channels", &self.channels.len())
            .field("track_count", &self.track_count)
            .finish_non_exhaustive()
    }
}
