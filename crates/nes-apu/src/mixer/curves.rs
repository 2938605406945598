//! Non-linear loudness curves
//!
//! The 2A03 and its expansion chips sum their voices through resistor
//! networks, so output voltage is not proportional to the channel level.
//! Each curve maps a raw generator level to an output amplitude.

use crate::channel::{ChannelCode, ChipType};

/// Loudness curve signature: raw level in, amplitude out
pub type LoudnessCurve = fn(f64) -> f64;

/// 2A03 pulse voices
pub fn pulse_2a03(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    95.88 * 400.0 / ((8128.0 / x) + 156.0)
}

/// 2A03 triangle
pub fn triangle(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    46159.29 / (1.0 / (x / 8227.0) + 30.0)
}

/// 2A03 noise
pub fn noise(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    41543.36 / (1.0 / (x / 12241.0) + 30.0)
}

/// 2A03 DPCM
pub fn dpcm(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    41543.36 / (1.0 / (x / 22638.0) + 30.0)
}

/// VRC6 and MMC5 voices
pub fn expansion(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    96.0 * 360.0 / ((8000.0 / x) + 180.0)
}

/// Pick the curve for a voice
pub fn curve_for(code: ChannelCode) -> LoudnessCurve {
    match code {
        ChannelCode::Pulse1 | ChannelCode::Pulse2 => pulse_2a03,
        ChannelCode::Triangle => triangle,
        ChannelCode::Noise => noise,
        ChannelCode::Dpcm => dpcm,
        _ => match code.chip() {
            ChipType::Apu2A03 => pulse_2a03,
            _ => expansion,
        },
    }
}
