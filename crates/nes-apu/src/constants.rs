//! Hardware constants and lookup tables
//!
//! Clock rates, frame rates and the 2A03 tables shared by the generators.

/// NTSC 2A03 CPU clock (Hz)
pub const BASE_FREQ_NTSC: u32 = 1_789_773;

/// PAL 2A07 CPU clock (Hz)
pub const BASE_FREQ_PAL: u32 = 1_662_607;

/// NTSC frame rate (Hz)
pub const FRAME_RATE_NTSC: u32 = 60;

/// PAL frame rate (Hz)
pub const FRAME_RATE_PAL: u32 = 50;

/// Default output sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Length counter load values, indexed by the 5-bit length index
pub const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Pulse duty sequences (12.5%, 25%, 50%, 25% negated), 16 steps each
pub const DUTY_TABLE: [[bool; 16]; 4] = [
    [
        false, false, true, true, false, false, false, false, false, false, false, false, false,
        false, false, false,
    ],
    [
        false, false, true, true, true, true, false, false, false, false, false, false, false,
        false, false, false,
    ],
    [
        false, false, true, true, true, true, true, true, true, true, false, false, false, false,
        false, false,
    ],
    [
        true, true, false, false, false, false, true, true, true, true, true, true, true, true,
        true, true,
    ],
];

/// Triangle output sequence
pub const TRIANGLE_TABLE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

/// Noise timer periods (NTSC), in CPU cycles
pub const NOISE_PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// DPCM timer periods (NTSC), in CPU cycles
pub const DPCM_RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];
