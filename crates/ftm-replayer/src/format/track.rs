//! Tracks, patterns and row cells

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Highest playable note (B-7)
pub const MAX_NOTE: u8 = 96;

/// Note column of a row cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteValue {
    /// Empty note column
    #[default]
    None,
    /// Note cut (`---`)
    Halt,
    /// Note release (`===`)
    Release,
    /// Pitched note, 1 (C-0) to 96 (B-7)
    Pitch(u8),
}

impl NoteValue {
    /// Pitched note from octave and semitone (0 = C)
    ///
    /// Out-of-range values are clamped into 1..=96.
    pub fn from_octave(octave: u8, semitone: u8) -> Self {
        let value = octave as u16 * 12 + semitone.min(11) as u16 + 1;
        NoteValue::Pitch(value.clamp(1, MAX_NOTE as u16) as u8)
    }

    /// Pitch number, if any
    pub fn pitch(self) -> Option<u8> {
        match self {
            NoteValue::Pitch(value) => Some(value),
            _ => None,
        }
    }
}

/// FamiTracker effect identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum EffectKind {
    /// Empty column
    None = 0,
    /// `Fxx` speed or tempo
    Speed = 1,
    /// `Bxx` jump to section
    Jump = 2,
    /// `Dxx` skip to next section
    Skip = 3,
    /// `Cxx` halt playback
    Halt = 4,
    /// `Exx` legacy volume
    Volume = 5,
    /// `3xx` portamento
    Portamento = 6,
    /// Unused slot
    PortaOff = 7,
    /// `Hxy` sweep up
    SweepUp = 8,
    /// `Ixy` sweep down
    SweepDown = 9,
    /// `0xy` arpeggio
    Arpeggio = 10,
    /// `4xy` vibrato
    Vibrato = 11,
    /// `7xy` tremolo
    Tremolo = 12,
    /// `Pxx` fine pitch
    Pitch = 13,
    /// `Gxx` note delay
    Delay = 14,
    /// `Zxx` DPCM DAC load
    Dac = 15,
    /// `1xx` pitch slide up
    PortaUp = 16,
    /// `2xx` pitch slide down
    PortaDown = 17,
    /// `Vxx` duty / noise mode
    DutyCycle = 18,
    /// `Yxx` DPCM sample offset
    SampleOffset = 19,
    /// `Qxy` note slide up
    SlideUp = 20,
    /// `Rxy` note slide down
    SlideDown = 21,
    /// `Axy` volume slide
    VolumeSlide = 22,
    /// `Sxx` delayed note cut
    NoteCut = 23,
    /// `Xxx` DPCM retrigger
    Retrigger = 24,
    /// `Wxx` DPCM pitch
    DpcmPitch = 25,
    /// `Hxx` FDS modulation depth
    FdsModDepth = 26,
    /// `Ixx` FDS modulation speed, high part
    FdsModSpeedHi = 27,
    /// `Jxx` FDS modulation speed, low part
    FdsModSpeedLo = 28,
}

impl EffectKind {
    /// Decode a raw effect id
    pub fn from_id(id: u8) -> Option<Self> {
        Self::from_u8(id)
    }
}

/// One effect column: kind and parameter byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectCommand {
    /// Effect kind
    pub kind: EffectKind,
    /// Parameter byte
    pub param: u8,
}

impl EffectCommand {
    /// Create an effect command
    pub fn new(kind: EffectKind, param: u8) -> Self {
        Self { kind, param }
    }
}

/// Row cell of one channel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FtmNote {
    /// Note column
    pub note: NoteValue,
    /// Instrument column
    pub instrument: Option<u8>,
    /// Volume column (0-15)
    pub volume: Option<u8>,
    /// Effect columns, in column order
    pub effects: Vec<EffectCommand>,
}

impl FtmNote {
    /// Cell with a pitched note
    pub fn pitch(value: u8) -> Self {
        Self {
            note: NoteValue::Pitch(value.clamp(1, MAX_NOTE)),
            ..Self::default()
        }
    }

    /// Cell with only a note column value
    pub fn with_note(note: NoteValue) -> Self {
        Self {
            note,
            ..Self::default()
        }
    }

    /// Cell carrying a single effect
    pub fn effect(kind: EffectKind, param: u8) -> Self {
        Self::default().with_effect(kind, param)
    }

    /// Set the instrument column
    pub fn with_instrument(mut self, instrument: u8) -> Self {
        self.instrument = Some(instrument);
        self
    }

    /// Set the volume column
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume.min(15));
        self
    }

    /// Append an effect column
    pub fn with_effect(mut self, kind: EffectKind, param: u8) -> Self {
        self.effects.push(EffectCommand::new(kind, param));
        self
    }

    /// Whether the cell has nothing in it
    pub fn is_empty(&self) -> bool {
        self.note == NoteValue::None
            && self.instrument.is_none()
            && self.volume.is_none()
            && self.effects.iter().all(|e| e.kind == EffectKind::None)
    }
}

/// A pattern: one channel's rows for one section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FtmPattern {
    /// Row cells; missing or `None` rows are empty
    pub rows: Vec<Option<FtmNote>>,
}

impl FtmPattern {
    /// Cell at `row`
    pub fn note(&self, row: usize) -> Option<&FtmNote> {
        self.rows.get(row).and_then(Option::as_ref)
    }

    /// Store a cell, growing the pattern as needed
    pub fn set(&mut self, row: usize, note: FtmNote) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, None);
        }
        self.rows[row] = Some(note);
    }
}

/// A track (song): patterns per channel and the order list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtmTrack {
    /// Track name
    pub name: String,
    /// Rows per pattern
    pub length: usize,
    /// Default speed (frames per row, tempo 150)
    pub speed: u32,
    /// Default tempo
    pub tempo: u32,
    /// Patterns indexed by `[channel][pattern]`
    pub patterns: Vec<Vec<FtmPattern>>,
    /// Order list: pattern index per channel, indexed by `[section][channel]`
    pub orders: Vec<Vec<usize>>,
    /// Visible effect columns per channel
    pub effect_columns: Vec<u8>,
}

impl FtmTrack {
    /// Create an empty track for `channels` channels
    pub fn new(channels: usize, length: usize, speed: u32, tempo: u32) -> Self {
        Self {
            name: String::new(),
            length,
            speed,
            tempo,
            patterns: vec![Vec::new(); channels],
            orders: Vec::new(),
            effect_columns: vec![1; channels],
        }
    }

    /// Number of sections in the order list
    pub fn section_count(&self) -> usize {
        self.orders.len()
    }

    /// Append a section; missing channel entries use pattern 0
    pub fn push_section(&mut self, patterns: &[usize]) {
        let mut order = vec![0; self.patterns.len()];
        for (slot, &pattern) in order.iter_mut().zip(patterns) {
            *slot = pattern;
        }
        self.orders.push(order);
    }

    /// Pattern index played by `channel` in `section`
    pub fn pattern_index(&self, section: usize, channel: usize) -> Option<usize> {
        self.orders.get(section)?.get(channel).copied()
    }

    /// Mutable pattern, created (empty) if it does not exist yet
    pub fn pattern_mut(&mut self, channel: usize, index: usize) -> &mut FtmPattern {
        if self.patterns.len() <= channel {
            self.patterns.resize(channel + 1, Vec::new());
        }
        let patterns = &mut self.patterns[channel];
        if patterns.len() <= index {
            patterns.resize(index + 1, FtmPattern::default());
        }
        &mut patterns[index]
    }

    /// Cell at `(section, channel, row)`
    pub fn note(&self, section: usize, channel: usize, row: usize) -> Option<&FtmNote> {
        if row >= self.length {
            return None;
        }
        let pattern = self.pattern_index(section, channel)?;
        self.patterns.get(channel)?.get(pattern)?.note(row)
    }

    /// Write a cell into the pattern referenced at `(section, channel)`
    pub fn set_note(&mut self, section: usize, channel: usize, row: usize, note: FtmNote) {
        if let Some(pattern) = self.pattern_index(section, channel) {
            self.pattern_mut(channel, pattern).set(row, note);
        }
    }
}
