//! Instruments, envelope sequences and DPCM samples

use std::collections::BTreeMap;
use std::sync::Arc;

use nes_apu::ChipType;
use num_derive::FromPrimitive;

/// Envelope sequence kinds, in instrument slot order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
#[repr(u8)]
pub enum SequenceKind {
    /// Volume (0-15)
    Volume = 0,
    /// Arpeggio (note offsets)
    Arpeggio = 1,
    /// Relative pitch (period units)
    Pitch = 2,
    /// Relative pitch (16 period units)
    HiPitch = 3,
    /// Duty / noise mode
    Duty = 4,
}

impl SequenceKind {
    /// All kinds in slot order
    pub const ALL: [SequenceKind; 5] = [
        SequenceKind::Volume,
        SequenceKind::Arpeggio,
        SequenceKind::Pitch,
        SequenceKind::HiPitch,
        SequenceKind::Duty,
    ];

    /// Instrument slot index
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// How arpeggio sequence values are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
#[repr(u8)]
pub enum ArpSetting {
    /// Offset from the played note
    #[default]
    Absolute = 0,
    /// Replace the note (0 = C-0)
    Fixed = 1,
    /// Offset accumulated into the played note
    Relative = 2,
}

/// Envelope sequence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FtmSequence {
    /// Step values
    pub items: Vec<i8>,
    /// Step to jump back to at the end
    pub loop_point: Option<usize>,
    /// Step held until the note is released
    pub release_point: Option<usize>,
    /// Arpeggio mode (only meaningful for arpeggio sequences)
    pub arp_setting: ArpSetting,
}

impl FtmSequence {
    /// Sequence without loop or release
    pub fn new(items: Vec<i8>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Set the loop point
    pub fn with_loop(mut self, point: usize) -> Self {
        self.loop_point = Some(point);
        self
    }

    /// Set the release point
    pub fn with_release(mut self, point: usize) -> Self {
        self.release_point = Some(point);
        self
    }

    /// Set the arpeggio mode
    pub fn with_setting(mut self, setting: ArpSetting) -> Self {
        self.arp_setting = setting;
        self
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the sequence has no steps
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// DPCM assignment for one note of a 2A03 instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpcmKey {
    /// Index into the document's DPCM samples
    pub sample: usize,
    /// Playback rate index (0-15)
    pub pitch: u8,
    /// Loop the sample
    pub looping: bool,
    /// Initial DAC value loaded when the note starts
    pub delta: Option<u8>,
}

/// DPCM sample data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpcmSample {
    /// Sample name
    pub name: String,
    /// Delta encoded bytes, shared with the generator
    pub data: Arc<[u8]>,
}

/// Instrument: per-chip bundle of sequence references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtmInstrument {
    /// Instrument name
    pub name: String,
    /// Chip the sequences belong to
    pub chip: ChipType,
    /// Sequence index per [`SequenceKind`] slot
    pub sequences: [Option<u8>; 5],
    /// DPCM assignments keyed by note (1-96)
    pub dpcm_keys: BTreeMap<u8, DpcmKey>,
}

impl FtmInstrument {
    /// Instrument without sequences
    pub fn new(name: &str, chip: ChipType) -> Self {
        Self {
            name: name.to_string(),
            chip,
            sequences: [None; 5],
            dpcm_keys: BTreeMap::new(),
        }
    }

    /// Reference a sequence
    pub fn with_sequence(mut self, kind: SequenceKind, index: u8) -> Self {
        self.sequences[kind.index()] = Some(index);
        self
    }

    /// Assign a DPCM sample to a note
    pub fn with_dpcm_key(mut self, note: u8, key: DpcmKey) -> Self {
        self.dpcm_keys.insert(note, key);
        self
    }

    /// Sequence index for a slot
    pub fn sequence_index(&self, kind: SequenceKind) -> Option<u8> {
        self.sequences[kind.index()]
    }

    /// DPCM assignment for a note
    pub fn dpcm_key(&self, note: u8) -> Option<&DpcmKey> {
        self.dpcm_keys.get(&note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_slots() {
        let inst = FtmInstrument::new("lead", ChipType::Apu2A03)
            .with_sequence(SequenceKind::Volume, 3)
            .with_sequence(SequenceKind::Duty, 1);
        assert_eq!(inst.sequence_index(SequenceKind::Volume), Some(3));
        assert_eq!(inst.sequence_index(SequenceKind::Arpeggio), None);
        assert_eq!(inst.sequence_index(SequenceKind::Duty), Some(1));
    }

    #[test]
    fn test_sequence_builder() {
        let seq = FtmSequence::new(vec![15, 12, 8])
            .with_loop(1)
            .with_release(2)
            .with_setting(ArpSetting::Fixed);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.loop_point, Some(1));
        assert_eq!(seq.release_point, Some(2));
        assert_eq!(seq.arp_setting, ArpSetting::Fixed);
    }
}
