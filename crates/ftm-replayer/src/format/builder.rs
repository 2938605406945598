//! Programmatic document construction

use std::sync::Arc;

use nes_apu::ChipType;

use super::{
    DpcmSample, ExpansionChips, FtmAudio, FtmInstrument, FtmSequence, FtmTrack, Region,
    SequenceKind, VibratoStyle, DEFAULT_SPEED,
};
use crate::error::Result;

/// Builder for [`FtmAudio`]
///
/// Set the chips before creating tracks: [`FtmAudioBuilder::new_track`] sizes
/// the pattern grid from the current channel count.
///
/// # Example
///
/// ```
/// use ftm_replayer::format::{FtmAudioBuilder, FtmNote};
///
/// let builder = FtmAudioBuilder::new().title("demo");
/// let mut track = builder.new_track(16);
/// track.push_section(&[0, 0, 0, 0, 0]);
/// track.set_note(0, 0, 0, FtmNote::pitch(49));
/// let audio = builder.track(track).build().unwrap();
/// assert_eq!(audio.channel_count(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct FtmAudioBuilder {
    audio: FtmAudio,
}

impl FtmAudioBuilder {
    /// Empty NTSC document
    pub fn new() -> Self {
        Self {
            audio: FtmAudio::default(),
        }
    }

    /// Song title
    pub fn title(mut self, title: &str) -> Self {
        self.audio.title = title.to_string();
        self
    }

    /// Song author
    pub fn author(mut self, author: &str) -> Self {
        self.audio.author = author.to_string();
        self
    }

    /// Copyright line
    pub fn copyright(mut self, copyright: &str) -> Self {
        self.audio.copyright = copyright.to_string();
        self
    }

    /// Video region
    pub fn region(mut self, region: Region) -> Self {
        self.audio.region = region;
        self
    }

    /// Custom engine rate (0 = region default)
    pub fn frame_rate(mut self, frame_rate: u32) -> Self {
        self.audio.frame_rate = frame_rate;
        self
    }

    /// Expansion chips
    pub fn chips(mut self, chips: ExpansionChips) -> Self {
        self.audio.chips = chips;
        self
    }

    /// N163 voice count
    pub fn namco_channels(mut self, count: u8) -> Self {
        self.audio.namco_channels = count;
        self
    }

    /// `Fxx` split point
    pub fn split(mut self, split: u32) -> Self {
        self.audio.split = split;
        self
    }

    /// Vibrato table flavour
    pub fn vibrato_style(mut self, style: VibratoStyle) -> Self {
        self.audio.vibrato_style = style;
        self
    }

    /// Register an instrument at `index`
    pub fn instrument(mut self, index: u8, instrument: FtmInstrument) -> Self {
        let index = index as usize;
        if self.audio.instruments.len() <= index {
            self.audio.instruments.resize(index + 1, None);
        }
        self.audio.instruments[index] = Some(instrument);
        self
    }

    /// Register a sequence
    pub fn sequence(mut self, chip: ChipType, kind: SequenceKind, index: u8, sequence: FtmSequence) -> Self {
        self.audio.sequences.insert((chip, kind, index), Arc::new(sequence));
        self
    }

    /// Append a DPCM sample
    pub fn dpcm_sample(mut self, name: &str, data: Vec<u8>) -> Self {
        self.audio.dpcm_samples.push(DpcmSample {
            name: name.to_string(),
            data: Arc::from(data),
        });
        self
    }

    /// Voices with the current chip selection
    pub fn channel_count(&self) -> usize {
        self.audio.channel_count()
    }

    /// Empty track with default speed and region tempo
    pub fn new_track(&self, length: usize) -> FtmTrack {
        FtmTrack::new(
            self.channel_count(),
            length,
            DEFAULT_SPEED,
            self.audio.region.default_tempo(),
        )
    }

    /// Append a track
    pub fn track(mut self, track: FtmTrack) -> Self {
        self.audio.tracks.push(track);
        self
    }

    /// Validate and return the document
    pub fn build(self) -> Result<FtmAudio> {
        self.audio.validate()?;
        Ok(self.audio)
    }
}

impl Default for FtmAudioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FtmError;

    #[test]
    fn test_build_requires_track() {
        assert!(matches!(
            FtmAudioBuilder::new().build(),
            Err(FtmError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_pal_track_defaults() {
        let builder = FtmAudioBuilder::new().region(Region::Pal);
        let track = builder.new_track(32);
        assert_eq!(track.tempo, 125);
        assert_eq!(track.speed, 6);
    }

    #[test]
    fn test_order_width_checked() {
        let builder = FtmAudioBuilder::new().chips(ExpansionChips::VRC6);
        let mut track = builder.new_track(8);
        track.orders.push(vec![0; 5]);
        assert!(builder.track(track).build().is_err());
    }

    #[test]
    fn test_instrument_gaps() {
        let audio = {
            let builder = FtmAudioBuilder::new().instrument(3, FtmInstrument::new("a", ChipType::Apu2A03));
            let mut track = builder.new_track(4);
            track.push_section(&[]);
            builder.track(track).build().unwrap()
        };
        assert!(audio.instrument(0).is_none());
        assert_eq!(audio.instrument(3).map(|i| i.name.as_str()), Some("a"));
    }
}
