//! FamiTracker module replayer
//!
//! Plays FamiTracker documents on the NES 2A03 and its expansion chips,
//! frame by frame, into 16-bit PCM.
//!
//! # Features
//!
//! - Tempo-accurate row scheduling (`speed`/`tempo` accumulator, `Bxx`,
//!   `Dxx`, `Cxx`)
//! - Effect engine: arpeggio, slides, portamento, vibrato, tremolo, volume
//!   slide, note delay and cut, sweep, duty, fine pitch, DPCM controls
//! - Instrument sequences (volume, arpeggio, pitch, hi-pitch, duty) with loop
//!   and release points
//! - 2A03, VRC6 and MMC5 voices through [`nes_apu`] generators
//! - Band-limited or per-sample mixing, playback speed factor, per-voice
//!   levels
//! - Optional WAV export (`export-wav` feature)
//!
//! # Pipeline
//!
//! Every engine frame the [`FtmRowFetcher`] decides whether a row is due and
//! publishes its effects to the [`FtmChannel`]s, the channels run their
//! effects and sequences and write the resulting parameters into their chip
//! generators, and the [`FamiTrackerRenderer`] lets the generators run for
//! one frame of CPU cycles into the mixer.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use ftm_replayer::{
//!     EffectKind, FamiTrackerRenderer, FtmAudioBuilder, FtmNote, RendererConfig,
//! };
//!
//! let builder = FtmAudioBuilder::new().title("demo");
//! let mut track = builder.new_track(32);
//! track.push_section(&[0, 0, 0, 0, 0]);
//! track.set_note(0, 0, 0, FtmNote::pitch(46).with_effect(EffectKind::Vibrato, 0x46));
//! track.set_note(0, 2, 8, FtmNote::pitch(34));
//! let audio = Arc::new(builder.track(track).build()?);
//!
//! let mut renderer = FamiTrackerRenderer::new(RendererConfig::default())?;
//! renderer.ready(audio)?;
//!
//! let mut pcm = vec![0i16; 48_000];
//! while !renderer.is_finished() {
//!     renderer.render(&mut pcm)?;
//! }
//! # Ok::<(), ftm_replayer::FtmError>(())
//! ```

#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod effect;
pub mod error;
pub mod executor;
pub mod export;
pub mod fetcher;
pub mod format;
pub mod note_table;
pub mod renderer;
pub mod sequence;

// Public API exports
pub use channel::{FtmChannel, ToneState, VoiceState};
pub use config::RendererConfig;
pub use effect::{FtmEffect, FtmEffectType, GlobalEffect};
pub use error::{FtmError, Result};
pub use executor::FamiTrackerExecutor;
pub use fetcher::FtmRowFetcher;
pub use format::{
    ArpSetting, DpcmKey, DpcmSample, EffectCommand, EffectKind, ExpansionChips, FtmAudio,
    FtmAudioBuilder, FtmInstrument, FtmNote, FtmPattern, FtmSequence, FtmTrack, NoteValue, Region,
    SequenceKind, VibratoStyle,
};
pub use note_table::PeriodTable;
pub use renderer::FamiTrackerRenderer;

pub use nes_apu::mixer::{InterceptorKind, MixerConfig, MixerKind};
pub use nes_apu::{ChannelCode, ChipType};
