//! Channel codes and sound chips
//!
//! Every hardware voice is identified by a [`ChannelCode`]. The high nibble of
//! the code selects the chip, the low nibble the voice on that chip.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Sound chips a FamiTracker module can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum ChipType {
    /// Built-in Ricoh 2A03 APU
    Apu2A03 = 0x0,
    /// Konami VRC6
    Vrc6 = 0x1,
    /// Nintendo MMC5
    Mmc5 = 0x2,
    /// Famicom Disk System
    Fds = 0x3,
    /// Namco 163
    N163 = 0x4,
    /// Konami VRC7
    Vrc7 = 0x5,
    /// Sunsoft 5B
    S5b = 0x6,
}

/// Hardware voice identifier
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ChannelCode {
    Pulse1 = 0x01,
    Pulse2 = 0x02,
    Triangle = 0x03,
    Noise = 0x04,
    Dpcm = 0x05,

    Vrc6Pulse1 = 0x11,
    Vrc6Pulse2 = 0x12,
    Vrc6Sawtooth = 0x13,

    Mmc5Pulse1 = 0x21,
    Mmc5Pulse2 = 0x22,

    Fds = 0x31,

    N163_1 = 0x41,
    N163_2 = 0x42,
    N163_3 = 0x43,
    N163_4 = 0x44,
    N163_5 = 0x45,
    N163_6 = 0x46,
    N163_7 = 0x47,
    N163_8 = 0x48,

    Vrc7_1 = 0x51,
    Vrc7_2 = 0x52,
    Vrc7_3 = 0x53,
    Vrc7_4 = 0x54,
    Vrc7_5 = 0x55,
    Vrc7_6 = 0x56,

    S5b1 = 0x61,
    S5b2 = 0x62,
    S5b3 = 0x63,
}

impl ChannelCode {
    /// 2A03 voices in document order
    pub const APU_2A03: [ChannelCode; 5] = [
        ChannelCode::Pulse1,
        ChannelCode::Pulse2,
        ChannelCode::Triangle,
        ChannelCode::Noise,
        ChannelCode::Dpcm,
    ];

    /// VRC6 voices in document order
    pub const VRC6: [ChannelCode; 3] = [
        ChannelCode::Vrc6Pulse1,
        ChannelCode::Vrc6Pulse2,
        ChannelCode::Vrc6Sawtooth,
    ];

    /// MMC5 voices in document order
    pub const MMC5: [ChannelCode; 2] = [ChannelCode::Mmc5Pulse1, ChannelCode::Mmc5Pulse2];

    /// N163 voices; a module uses the first `namco_channels` of them
    pub const N163: [ChannelCode; 8] = [
        ChannelCode::N163_1,
        ChannelCode::N163_2,
        ChannelCode::N163_3,
        ChannelCode::N163_4,
        ChannelCode::N163_5,
        ChannelCode::N163_6,
        ChannelCode::N163_7,
        ChannelCode::N163_8,
    ];

    /// VRC7 voices in document order
    pub const VRC7: [ChannelCode; 6] = [
        ChannelCode::Vrc7_1,
        ChannelCode::Vrc7_2,
        ChannelCode::Vrc7_3,
        ChannelCode::Vrc7_4,
        ChannelCode::Vrc7_5,
        ChannelCode::Vrc7_6,
    ];

    /// S5B voices in document order
    pub const S5B: [ChannelCode; 3] = [ChannelCode::S5b1, ChannelCode::S5b2, ChannelCode::S5b3];

    /// Decode a raw channel code byte
    pub fn from_byte(code: u8) -> Option<Self> {
        Self::from_u8(code)
    }

    /// Raw channel code byte
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Chip this voice belongs to
    #[inline]
    pub fn chip(self) -> ChipType {
        match (self as u8) >> 4 {
            0x0 => ChipType::Apu2A03,
            0x1 => ChipType::Vrc6,
            0x2 => ChipType::Mmc5,
            0x3 => ChipType::Fds,
            0x4 => ChipType::N163,
            0x5 => ChipType::Vrc7,
            _ => ChipType::S5b,
        }
    }

    /// Whether this voice is a pulse wave with a 2A03-style duty selector
    pub fn is_pulse(self) -> bool {
        matches!(
            self,
            ChannelCode::Pulse1
                | ChannelCode::Pulse2
                | ChannelCode::Mmc5Pulse1
                | ChannelCode::Mmc5Pulse2
        )
    }
}

impl std::fmt::Display for ChannelCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}", self.as_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_of_channel() {
        assert_eq!(ChannelCode::Pulse1.chip(), ChipType::Apu2A03);
        assert_eq!(ChannelCode::Dpcm.chip(), ChipType::Apu2A03);
        assert_eq!(ChannelCode::Vrc6Sawtooth.chip(), ChipType::Vrc6);
        assert_eq!(ChannelCode::Mmc5Pulse2.chip(), ChipType::Mmc5);
        assert_eq!(ChannelCode::N163_8.chip(), ChipType::N163);
        assert_eq!(ChannelCode::S5b3.chip(), ChipType::S5b);
    }

    #[test]
    fn test_from_byte() {
        assert_eq!(ChannelCode::from_byte(0x13), Some(ChannelCode::Vrc6Sawtooth));
        assert_eq!(ChannelCode::from_byte(0x06), None);
        assert_eq!(ChannelCode::Noise.as_byte(), 0x04);
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(ChannelCode::Vrc7_1.to_string(), "51");
    }
}
