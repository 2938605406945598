//! In-memory FamiTracker document
//!
//! The replayer never parses files. A loader (or test code, through
//! [`FtmAudioBuilder`]) produces an [`FtmAudio`], which is then shared
//! read-only between renderers.

mod builder;
mod instrument;
mod track;

use std::collections::BTreeMap;
use std::sync::Arc;

use bitflags::bitflags;
use nes_apu::constants::{BASE_FREQ_NTSC, BASE_FREQ_PAL, FRAME_RATE_NTSC, FRAME_RATE_PAL};
use nes_apu::{ChannelCode, ChipType};

use crate::error::{FtmError, Result};

pub use builder::FtmAudioBuilder;
pub use instrument::{ArpSetting, DpcmKey, DpcmSample, FtmInstrument, FtmSequence, SequenceKind};
pub use track::{EffectCommand, EffectKind, FtmNote, FtmPattern, FtmTrack, NoteValue, MAX_NOTE};

/// Default `Fxx` split: values at or above it set the tempo
pub const DEFAULT_SPEED_SPLIT: u32 = 21;

/// Default row speed
pub const DEFAULT_SPEED: u32 = 6;

/// Default NTSC tempo
pub const DEFAULT_TEMPO_NTSC: u32 = 150;

/// Default PAL tempo
pub const DEFAULT_TEMPO_PAL: u32 = 125;

/// Video region the module was written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// 60 Hz, 1.789773 MHz CPU clock
    #[default]
    Ntsc,
    /// 50 Hz, 1.662607 MHz CPU clock
    Pal,
}

impl Region {
    /// Native frame rate
    pub fn frame_rate(self) -> u32 {
        match self {
            Region::Ntsc => FRAME_RATE_NTSC,
            Region::Pal => FRAME_RATE_PAL,
        }
    }

    /// CPU clock (Hz)
    pub fn clock(self) -> u32 {
        match self {
            Region::Ntsc => BASE_FREQ_NTSC,
            Region::Pal => BASE_FREQ_PAL,
        }
    }

    /// Default tempo for new tracks
    pub fn default_tempo(self) -> u32 {
        match self {
            Region::Ntsc => DEFAULT_TEMPO_NTSC,
            Region::Pal => DEFAULT_TEMPO_PAL,
        }
    }
}

bitflags! {
    /// Expansion chips enabled in a module
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExpansionChips: u8 {
        /// Konami VRC6
        const VRC6 = 0x01;
        /// Konami VRC7
        const VRC7 = 0x02;
        /// Famicom Disk System
        const FDS = 0x04;
        /// Nintendo MMC5
        const MMC5 = 0x08;
        /// Namco 163
        const N163 = 0x10;
        /// Sunsoft 5B
        const S5B = 0x20;
    }
}

/// Vibrato table flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VibratoStyle {
    /// Pre-0.3.0 table (half depth, biased upward)
    Old,
    /// Current table
    #[default]
    New,
}

/// Complete FamiTracker document
#[derive(Debug, Clone)]
pub struct FtmAudio {
    /// Song title
    pub title: String,
    /// Song author
    pub author: String,
    /// Copyright line
    pub copyright: String,
    /// Video region
    pub region: Region,
    /// Custom engine rate; 0 uses the region default
    pub frame_rate: u32,
    /// Enabled expansion chips
    pub chips: ExpansionChips,
    /// N163 voices in use (1-8)
    pub namco_channels: u8,
    /// `Fxx` speed/tempo split point
    pub split: u32,
    /// Vibrato table flavour
    pub vibrato_style: VibratoStyle,
    /// Tracks (songs)
    pub tracks: Vec<FtmTrack>,
    /// Instruments by index; gaps are `None`
    pub instruments: Vec<Option<FtmInstrument>>,
    /// Sequences keyed by chip, kind and index
    pub sequences: BTreeMap<(ChipType, SequenceKind, u8), Arc<FtmSequence>>,
    /// DPCM sample bank
    pub dpcm_samples: Vec<DpcmSample>,
}

impl Default for FtmAudio {
    /// Empty NTSC document with the standard `Fxx` split
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            copyright: String::new(),
            region: Region::default(),
            frame_rate: 0,
            chips: ExpansionChips::empty(),
            namco_channels: 1,
            split: DEFAULT_SPEED_SPLIT,
            vibrato_style: VibratoStyle::default(),
            tracks: Vec::new(),
            instruments: Vec::new(),
            sequences: BTreeMap::new(),
            dpcm_samples: Vec::new(),
        }
    }
}

impl FtmAudio {
    /// Engine frame rate
    pub fn frame_rate(&self) -> u32 {
        if self.frame_rate == 0 {
            self.region.frame_rate()
        } else {
            self.frame_rate
        }
    }

    /// Whether the engine runs at the region's native rate
    pub fn is_default_frame_rate(&self) -> bool {
        self.frame_rate == 0 || self.frame_rate == self.region.frame_rate()
    }

    /// CPU clock (Hz)
    pub fn clock(&self) -> u32 {
        self.region.clock()
    }

    /// Voices of this module, in document channel order
    pub fn channel_codes(&self) -> Vec<ChannelCode> {
        let mut codes = ChannelCode::APU_2A03.to_vec();
        if self.chips.contains(ExpansionChips::VRC6) {
            codes.extend_from_slice(&ChannelCode::VRC6);
        }
        if self.chips.contains(ExpansionChips::MMC5) {
            codes.extend_from_slice(&ChannelCode::MMC5);
        }
        if self.chips.contains(ExpansionChips::N163) {
            let count = (self.namco_channels as usize).clamp(1, ChannelCode::N163.len());
            codes.extend_from_slice(&ChannelCode::N163[..count]);
        }
        if self.chips.contains(ExpansionChips::FDS) {
            codes.push(ChannelCode::Fds);
        }
        if self.chips.contains(ExpansionChips::VRC7) {
            codes.extend_from_slice(&ChannelCode::VRC7);
        }
        if self.chips.contains(ExpansionChips::S5B) {
            codes.extend_from_slice(&ChannelCode::S5B);
        }
        codes
    }

    /// Number of voices
    pub fn channel_count(&self) -> usize {
        self.channel_codes().len()
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Track by index
    pub fn track(&self, index: usize) -> Result<&FtmTrack> {
        self.tracks.get(index).ok_or(FtmError::InvalidTrack {
            index,
            available: self.tracks.len(),
        })
    }

    /// Instrument by index
    pub fn instrument(&self, index: u8) -> Option<&FtmInstrument> {
        self.instruments.get(index as usize).and_then(Option::as_ref)
    }

    /// Sequence by chip, kind and index
    pub fn sequence(&self, chip: ChipType, kind: SequenceKind, index: u8) -> Option<&Arc<FtmSequence>> {
        self.sequences.get(&(chip, kind, index))
    }

    /// Resolve every sequence slot of an instrument
    ///
    /// Slots that are empty or reference a missing sequence come back as `None`.
    pub fn instrument_sequences(&self, instrument: &FtmInstrument) -> [Option<Arc<FtmSequence>>; 5] {
        let mut slots: [Option<Arc<FtmSequence>>; 5] = Default::default();
        for kind in SequenceKind::ALL {
            if let Some(index) = instrument.sequence_index(kind) {
                slots[kind.index()] = self.sequence(instrument.chip, kind, index).cloned();
                if slots[kind.index()].is_none() {
                    log::warn!(
                        "instrument '{}' references missing {:?} sequence {}",
                        instrument.name,
                        kind,
                        index
                    );
                }
            }
        }
        slots
    }

    /// DPCM sample by index
    pub fn dpcm_sample(&self, index: usize) -> Option<&DpcmSample> {
        self.dpcm_samples.get(index)
    }

    /// Cell at `(track, section, channel, row)`
    pub fn note(&self, track: usize, section: usize, channel: usize, row: usize) -> Option<&FtmNote> {
        self.tracks.get(track)?.note(section, channel, row)
    }

    /// Check the structural consistency a renderer relies on
    ///
    /// Dangling instrument, sequence and sample references are tolerated
    /// (they degrade to "no modulation"); broken track structure is not.
    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(FtmError::InvalidDocument("document has no tracks".to_string()));
        }
        if self.split == 0 {
            return Err(FtmError::InvalidDocument("Fxx split must be positive".to_string()));
        }
        let channels = self.channel_count();
        for (index, track) in self.tracks.iter().enumerate() {
            if track.length == 0 || track.speed == 0 || track.tempo == 0 {
                return Err(FtmError::InvalidDocument(format!(
                    "track {index}: length, speed and tempo must be positive"
                )));
            }
            if track.orders.is_empty() {
                return Err(FtmError::InvalidDocument(format!(
                    "track {index}: empty order list"
                )));
            }
            if track.patterns.len() != channels {
                return Err(FtmError::InvalidDocument(format!(
                    "track {index}: {} pattern columns for {channels} channels",
                    track.patterns.len()
                )));
            }
            for (section, order) in track.orders.iter().enumerate() {
                if order.len() != channels {
                    return Err(FtmError::InvalidDocument(format!(
                        "track {index}, section {section}: order row has {} entries",
                        order.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
