//! Voice generators
//!
//! One generator per hardware voice. The 2A03 pulse generator doubles as the
//! MMC5 pulse (MMC5 pulses have no sweep unit; leave it disabled).

mod dpcm;
mod noise;
mod pulse;
mod triangle;
mod vrc6;

pub use dpcm::DpcmSound;
pub use noise::NoiseSound;
pub use pulse::PulseSound;
pub use triangle::TriangleSound;
pub use vrc6::{SawtoothSound, Vrc6PulseSound};

/// CPU cycles between two half-frame clocks of the APU frame sequencer
pub const HALF_FRAME_CYCLES: u32 = 14_913;
