//! Note to period lookup tables
//!
//! Note 1 is C-0 (32.7 Hz), note 46 is A-3 at 440 Hz. Periods are timer reload
//! values, so higher notes have smaller periods.

use std::sync::OnceLock;

use nes_apu::constants::{BASE_FREQ_NTSC, BASE_FREQ_PAL};

use crate::format::MAX_NOTE;

const NOTE_COUNT: usize = MAX_NOTE as usize;

/// Table a channel reads its base period from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodTable {
    /// 2A03/MMC5/VRC6 pulse and triangle, NTSC clock
    #[default]
    Ntsc,
    /// Same, PAL clock
    Pal,
    /// VRC6 sawtooth (14-step)
    Sawtooth,
    /// Noise: the "period" is the note number itself
    Noise,
}

fn note_frequency(index: usize) -> f64 {
    440.0 * 2f64.powf((index as f64 - 45.0) / 12.0)
}

fn build_table(clock: u32, steps: f64) -> [i32; NOTE_COUNT] {
    let mut table = [0; NOTE_COUNT];
    for (index, period) in table.iter_mut().enumerate() {
        *period = (clock as f64 / (steps * note_frequency(index)) - 0.5) as i32;
    }
    table
}

fn ntsc_table() -> &'static [i32; NOTE_COUNT] {
    static TABLE: OnceLock<[i32; NOTE_COUNT]> = OnceLock::new();
    TABLE.get_or_init(|| build_table(BASE_FREQ_NTSC, 16.0))
}

fn pal_table() -> &'static [i32; NOTE_COUNT] {
    static TABLE: OnceLock<[i32; NOTE_COUNT]> = OnceLock::new();
    TABLE.get_or_init(|| build_table(BASE_FREQ_PAL, 16.0))
}

fn sawtooth_table() -> &'static [i32; NOTE_COUNT] {
    static TABLE: OnceLock<[i32; NOTE_COUNT]> = OnceLock::new();
    TABLE.get_or_init(|| build_table(BASE_FREQ_NTSC, 14.0))
}

impl PeriodTable {
    /// Base period of a note; notes outside 1..=96 are clamped
    pub fn period(self, note: i32) -> i32 {
        let index = (note.clamp(1, MAX_NOTE as i32) - 1) as usize;
        match self {
            PeriodTable::Ntsc => ntsc_table()[index],
            PeriodTable::Pal => pal_table()[index],
            PeriodTable::Sawtooth => sawtooth_table()[index],
            PeriodTable::Noise => index as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a440_ntsc_period() {
        // A-3 (note 46) at 440 Hz on the NTSC clock
        assert_eq!(PeriodTable::Ntsc.period(46), 253);
    }

    #[test]
    fn test_periods_decrease_with_pitch() {
        for table in [PeriodTable::Ntsc, PeriodTable::Pal, PeriodTable::Sawtooth] {
            for note in 2..=96 {
                assert!(table.period(note) < table.period(note - 1));
            }
        }
    }

    #[test]
    fn test_octave_halves_period() {
        let low = PeriodTable::Ntsc.period(34);
        let high = PeriodTable::Ntsc.period(46);
        assert!((low - 2 * high).abs() <= 1);
    }

    #[test]
    fn test_noise_table_is_identity() {
        assert_eq!(PeriodTable::Noise.period(1), 0);
        assert_eq!(PeriodTable::Noise.period(16), 15);
    }

    #[test]
    fn test_clamped_lookup() {
        assert_eq!(PeriodTable::Ntsc.period(0), PeriodTable::Ntsc.period(1));
        assert_eq!(PeriodTable::Ntsc.period(200), PeriodTable::Ntsc.period(96));
    }
}
