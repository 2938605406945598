//! NES 2A03 and expansion chip sound generators
//!
//! The sound side of a FamiTracker replayer: one generator per hardware voice,
//! driven by synthesis parameters and elapsed CPU cycles, plus two mixing
//! strategies that turn generator output into 16-bit PCM.
//!
//! # Features
//! - 2A03 pulse (with sweep unit), triangle, noise and DPCM generators
//! - VRC6 pulse and sawtooth, MMC5 pulse generators
//! - Band-limited mixer built on `blip_buf`
//! - Per-sample mixer with an interceptor chain (echo, DC filter, low-pass,
//!   compressor, amplifier) and multi-track output
//!
//! # Generator contract
//! Every generator implements [`SoundGenerator`]: parameters are plain public
//! fields, [`SoundGenerator::process`] advances the oscillator by a number of
//! CPU cycles and reports level changes to a [`SoundOutput`], and
//! [`SoundGenerator::end_frame`] rewinds the frame-local clock.
//!
//! # Quick start
//! ```
//! use nes_apu::{ChannelCode, FrameParameter, SoundGenerator};
//! use nes_apu::generators::PulseSound;
//! use nes_apu::mixer::{MixerConfig, SoundMixer, create_mixer, MixerOutput};
//!
//! let mut param = FrameParameter::ntsc(48_000);
//! param.sample_in_cur_frame = 800;
//!
//! let mut mixer = create_mixer(&MixerConfig::default(), &param).unwrap();
//! let id = mixer.allocate_channel(ChannelCode::Pulse1);
//!
//! let mut pulse = PulseSound::new();
//! pulse.period = 253;
//! pulse.fixed_volume = 15;
//! pulse.duty_length = 2;
//!
//! mixer.ready_buffer(&param);
//! pulse.process(param.freq_per_frame, &mut MixerOutput::new(mixer.as_mut(), id));
//! pulse.end_frame();
//! let produced = mixer.finish_buffer(&param);
//!
//! let mut pcm = vec![0i16; produced];
//! mixer.read_buffer(&mut pcm);
//! ```

#![warn(missing_docs)]

pub mod channel;
pub mod constants;
pub mod cycle_counter;
pub mod generators;
pub mod mixer;
pub mod param;
pub mod sound;

/// Error types for mixer setup and configuration
///
/// Rendering itself never fails; only building or reconfiguring a mixer can.
#[derive(thiserror::Error, Debug)]
pub enum MixerError {
    /// Track (output channel) count must be at least one
    #[error("Invalid track count: {0}")]
    InvalidTrackCount(usize),

    /// Sample rate must be positive
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Frame rate must be positive
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(u32),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for MixerError {
    /// Converts a String into `MixerError::Other`.
    ///
    /// Prefer the specific variants where the failure is known.
    fn from(msg: String) -> Self {
        MixerError::Other(msg)
    }
}

impl From<&str> for MixerError {
    fn from(msg: &str) -> Self {
        MixerError::Other(msg.to_string())
    }
}

/// Result type for mixer operations
pub type Result<T> = std::result::Result<T, MixerError>;

// Public API exports
pub use channel::{ChannelCode, ChipType};
pub use cycle_counter::CycleCounter;
pub use param::FrameParameter;
pub use sound::{SoundGenerator, SoundOutput};
