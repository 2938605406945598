//! Effect engine
//!
//! Row commands are converted into typed effects. Channel effects live in a
//! per-channel map keyed by [`FtmEffectType`], so a new command replaces the
//! live effect of the same slot. One-shot effects return `false` from
//! [`FtmEffect::execute`] and are dropped after their first frame; continuous
//! effects keep their own countdown or phase state and drop out the same way
//! when they are done.
//!
//! Global effects (speed, tempo, jumps, halt) act on the row fetcher and are
//! executed before any channel effect of the same frame.

mod converter;

use std::sync::OnceLock;

pub use converter::{convert_row, RowEffects};

use crate::channel::ToneState;
use crate::fetcher::FtmRowFetcher;
use crate::format::{FtmAudio, VibratoStyle, MAX_NOTE};

/// Effect slots, in execution order
///
/// The delay slot is serviced before anything else; the instrument must be
/// loaded before the note starts; the sweep runs after the note that clears
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FtmEffectType {
    /// `Gxx`
    Delay,
    /// Instrument column
    Instrument,
    /// Volume column
    Volume,
    /// Note column (note, release or halt)
    Note,
    /// `Hxy` / `Ixy`
    Sweep,
    /// `Vxx`
    Duty,
    /// `Pxx`
    FinePitch,
    /// `1xx`, `2xx`, `3xx`, `Qxy`, `Rxy`
    Slide,
    /// `0xy`
    Arpeggio,
    /// `4xy`
    Vibrato,
    /// `7xy`
    Tremolo,
    /// `Axy`
    VolumeSlide,
    /// `Sxx`
    Cut,
    /// `Yxx`
    DpcmOffset,
    /// `Wxx`
    DpcmPitch,
    /// `Zxx`
    Dac,
    /// `Fxx` below the split
    Speed,
    /// `Fxx` at or above the split
    Tempo,
    /// `Bxx`
    Jump,
    /// `Dxx`
    Skip,
    /// `Cxx`
    Stop,
}

/// Channel effect with its running state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtmEffect {
    /// Switch instrument and reload its sequences
    Instrument(u8),
    /// Set the channel volume (0-15)
    Volume(i32),
    /// Start a note (1-96)
    Note(i32),
    /// Release the note
    Release,
    /// Cut the note
    Halt,
    /// Fine pitch offset in period units
    FinePitch(i32),
    /// Duty / noise mode
    Duty(i32),
    /// Raw sweep unit byte (bit 7 = pending write)
    Sweep(u8),
    /// DPCM start offset in bytes
    DpcmOffset(usize),
    /// DPCM rate override
    DpcmPitch(u8),
    /// DPCM DAC load
    Dac(u8),
    /// Three-phase arpeggio
    Arpeggio {
        /// Second note offset
        x: i32,
        /// Third note offset (0 = two-phase)
        y: i32,
        /// Current phase (0-2)
        phase: u8,
    },
    /// Constant period slide; negative raises the pitch
    PitchSlide {
        /// Period change per frame
        delta: i32,
    },
    /// Glide toward a target note
    Portamento {
        /// Period change per frame
        speed: i32,
        /// Note being approached
        target: Option<i32>,
    },
    /// Glide by a number of semitones, then stop
    NoteSlide {
        /// Period change per frame
        speed: i32,
        /// Semitone offset from the note playing when the slide starts
        offset: i32,
        /// Resolved target note
        target: Option<i32>,
    },
    /// Pitch vibrato
    Vibrato {
        /// Phase increment per frame
        speed: i32,
        /// Table row (depth << 4)
        depth: i32,
    },
    /// Volume tremolo
    Tremolo {
        /// Phase increment per frame
        speed: i32,
        /// Table row (depth << 4)
        depth: i32,
    },
    /// Volume slide in 1/8 steps per frame
    VolumeSlide {
        /// Upward rate
        up: i32,
        /// Downward rate
        down: i32,
    },
    /// Cut the note after a number of frames
    Cut {
        /// Frames left
        frames: u8,
    },
    /// Hold the rest of the row back for a number of frames
    Delay {
        /// Frames left
        frames: u8,
        /// Effects published when the delay runs out
        pending: Vec<FtmEffect>,
    },
}

/// Effect that acts on the row fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalEffect {
    /// Frames per row
    Speed(u32),
    /// Tempo
    Tempo(u32),
    /// Jump to a section after this row
    Jump(usize),
    /// Skip to a row of the next section after this row
    Skip(usize),
    /// Halt playback
    Stop,
}

/// Borrowed state an effect works on
pub struct EffectContext<'a> {
    /// Channel state
    pub tone: &'a mut ToneState,
    /// Document, for instrument lookups
    pub audio: &'a FtmAudio,
}

impl FtmEffect {
    /// Slot this effect occupies
    pub fn kind(&self) -> FtmEffectType {
        match self {
            FtmEffect::Instrument(_) => FtmEffectType::Instrument,
            FtmEffect::Volume(_) => FtmEffectType::Volume,
            FtmEffect::Note(_) | FtmEffect::Release | FtmEffect::Halt => FtmEffectType::Note,
            FtmEffect::FinePitch(_) => FtmEffectType::FinePitch,
            FtmEffect::Duty(_) => FtmEffectType::Duty,
            FtmEffect::Sweep(_) => FtmEffectType::Sweep,
            FtmEffect::DpcmOffset(_) => FtmEffectType::DpcmOffset,
            FtmEffect::DpcmPitch(_) => FtmEffectType::DpcmPitch,
            FtmEffect::Dac(_) => FtmEffectType::Dac,
            FtmEffect::Arpeggio { .. } => FtmEffectType::Arpeggio,
            FtmEffect::PitchSlide { .. }
            | FtmEffect::Portamento { .. }
            | FtmEffect::NoteSlide { .. } => FtmEffectType::Slide,
            FtmEffect::Vibrato { .. } => FtmEffectType::Vibrato,
            FtmEffect::Tremolo { .. } => FtmEffectType::Tremolo,
            FtmEffect::VolumeSlide { .. } => FtmEffectType::VolumeSlide,
            FtmEffect::Cut { .. } => FtmEffectType::Cut,
            FtmEffect::Delay { .. } => FtmEffectType::Delay,
        }
    }

    /// Run the effect for one frame
    ///
    /// Returns whether the effect stays live.
    pub fn execute(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        let tone = &mut *ctx.tone;
        match self {
            FtmEffect::Instrument(index) => {
                tone.set_instrument(*index, ctx.audio);
                false
            }
            FtmEffect::Volume(volume) => {
                tone.master_volume = (*volume).clamp(0, 15);
                tone.volume_accum = 0;
                false
            }
            FtmEffect::Note(note) => {
                tone.note_on(*note);
                false
            }
            FtmEffect::Release => {
                tone.release();
                false
            }
            FtmEffect::Halt => {
                tone.halt();
                false
            }
            FtmEffect::FinePitch(pitch) => {
                tone.master_pitch = *pitch;
                false
            }
            FtmEffect::Duty(duty) => {
                tone.master_duty = *duty;
                false
            }
            FtmEffect::Sweep(sweep) => {
                tone.sweep = *sweep;
                false
            }
            FtmEffect::DpcmOffset(offset) => {
                tone.dpcm_offset = *offset;
                false
            }
            FtmEffect::DpcmPitch(pitch) => {
                tone.dpcm_pitch = Some(*pitch & 0x0F);
                false
            }
            FtmEffect::Dac(value) => {
                tone.dac = Some(*value & 0x7F);
                false
            }
            FtmEffect::Arpeggio { x, y, phase } => {
                if *x == 0 && *y == 0 {
                    return false;
                }
                let (offset, next) = match *phase {
                    0 => (0, 1),
                    1 => (*x, if *y == 0 { 0 } else { 2 }),
                    _ => (*y, 0),
                };
                tone.cur_note += offset;
                *phase = next;
                true
            }
            FtmEffect::PitchSlide { delta } => {
                if *delta == 0 {
                    return false;
                }
                if tone.master_note != 0 {
                    tone.slide_period += *delta;
                }
                true
            }
            FtmEffect::Portamento { speed, target } => {
                if *speed <= 0 {
                    return false;
                }
                if let Some(note) = *target {
                    if slide_toward(tone, note, *speed) {
                        *target = None;
                    }
                }
                true
            }
            FtmEffect::NoteSlide { speed, offset, target } => {
                if tone.master_note == 0 {
                    return false;
                }
                let note = *target.get_or_insert_with(|| {
                    (tone.master_note + *offset).clamp(1, MAX_NOTE as i32)
                });
                !slide_toward(tone, note, *speed)
            }
            FtmEffect::Vibrato { speed, depth } => {
                if *speed == 0 || *depth == 0 {
                    return false;
                }
                tone.vibrato_phase = (tone.vibrato_phase + *speed) & 63;
                tone.cur_period -= vibrato_value(tone.vibrato_style, tone.vibrato_phase, *depth);
                true
            }
            FtmEffect::Tremolo { speed, depth } => {
                if *speed == 0 || *depth == 0 {
                    return false;
                }
                tone.tremolo_phase = (tone.tremolo_phase + *speed) & 63;
                tone.cur_volume -= tremolo_value(tone.vibrato_style, tone.tremolo_phase, *depth) * 16;
                true
            }
            FtmEffect::VolumeSlide { up, down } => {
                if *up == 0 && *down == 0 {
                    return false;
                }
                tone.slide_volume(2 * (*up - *down));
                true
            }
            FtmEffect::Cut { frames } => {
                if *frames == 0 {
                    tone.halt();
                    return false;
                }
                *frames -= 1;
                true
            }
            // Serviced by the channel before the other slots
            FtmEffect::Delay { .. } => true,
        }
    }
}

impl GlobalEffect {
    /// Slot this effect occupies
    pub fn kind(&self) -> FtmEffectType {
        match self {
            GlobalEffect::Speed(_) => FtmEffectType::Speed,
            GlobalEffect::Tempo(_) => FtmEffectType::Tempo,
            GlobalEffect::Jump(_) => FtmEffectType::Jump,
            GlobalEffect::Skip(_) => FtmEffectType::Skip,
            GlobalEffect::Stop => FtmEffectType::Stop,
        }
    }

    /// Apply the effect to the fetcher
    pub fn execute(&self, fetcher: &mut FtmRowFetcher) {
        match *self {
            GlobalEffect::Speed(speed) => fetcher.set_speed(speed),
            GlobalEffect::Tempo(tempo) => fetcher.set_tempo(tempo),
            GlobalEffect::Jump(section) => fetcher.jump_to_section(section),
            GlobalEffect::Skip(row) => fetcher.skip_rows(row),
            GlobalEffect::Stop => fetcher.stop(),
        }
    }
}

/// Move the slide offset toward `note` by `speed` period units
///
/// Returns `true` once the target is reached; the note then becomes the
/// channel's master note.
fn slide_toward(tone: &mut ToneState, note: i32, speed: i32) -> bool {
    if tone.master_note == 0 {
        tone.master_note = note;
        return true;
    }
    let current = tone.table.period(tone.master_note) + tone.slide_period;
    let distance = tone.table.period(note) - current;
    if distance.abs() <= speed {
        tone.master_note = note;
        tone.slide_period = 0;
        return true;
    }
    tone.slide_period += speed * distance.signum();
    false
}

const NEW_VIBRATO_DEPTH: [i32; 16] = [
    1, 1, 2, 3, 4, 7, 8, 0x0F, 0x10, 0x1F, 0x20, 0x3F, 0x40, 0x7F, 0x80, 0xFF,
];

/// Quarter sine per depth, 16 depths x 16 phases
fn vibrato_table(style: VibratoStyle) -> &'static [i32; 256] {
    static NEW: OnceLock<[i32; 256]> = OnceLock::new();
    static OLD: OnceLock<[i32; 256]> = OnceLock::new();
    let build = |style: VibratoStyle| {
        let mut table = [0; 256];
        for depth in 0..16 {
            for phase in 0..16 {
                let angle = (phase as f64 / 16.0) * std::f64::consts::FRAC_PI_2;
                table[depth * 16 + phase] = match style {
                    VibratoStyle::New => (angle.sin() * NEW_VIBRATO_DEPTH[depth] as f64) as i32,
                    VibratoStyle::Old => (angle.sin() * depth as f64 * 8.0) as i32,
                };
            }
        }
        table
    };
    match style {
        VibratoStyle::New => NEW.get_or_init(|| build(VibratoStyle::New)),
        VibratoStyle::Old => OLD.get_or_init(|| build(VibratoStyle::Old)),
    }
}

/// Vibrato offset for a phase (0-63) and table row
pub fn vibrato_value(style: VibratoStyle, phase: i32, depth: i32) -> i32 {
    let table = vibrato_table(style);
    let read = |i: i32| table[(depth + i).clamp(0, 255) as usize];
    let value = match phase & 0x30 {
        0x00 => read(phase & 0x0F),
        0x10 => read(15 - (phase - 16)),
        0x20 => -read(phase - 32),
        _ => -read(15 - (phase - 48)),
    };
    match style {
        VibratoStyle::New => value,
        VibratoStyle::Old => (value + read(15) + 1) >> 1,
    }
}

/// Tremolo attenuation for a phase (0-63) and table row, in volume steps
pub fn tremolo_value(style: VibratoStyle, phase: i32, depth: i32) -> i32 {
    let table = vibrato_table(style);
    let half = phase >> 1;
    let index = if half & 0x10 == 0 { half } else { 15 - (half - 16) };
    table[(depth + index).clamp(0, 255) as usize] >> 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note_table::PeriodTable;
    use nes_apu::ChannelCode;

    fn tone() -> ToneState {
        ToneState::new(ChannelCode::Pulse1, PeriodTable::Ntsc, VibratoStyle::New)
    }

    fn run(effect: &mut FtmEffect, tone: &mut ToneState) -> bool {
        let audio = FtmAudio::default();
        let mut ctx = EffectContext { tone, audio: &audio };
        effect.execute(&mut ctx)
    }

    #[test]
    fn test_effect_slots() {
        assert_eq!(FtmEffect::Release.kind(), FtmEffectType::Note);
        assert_eq!(FtmEffect::Portamento { speed: 1, target: None }.kind(), FtmEffectType::Slide);
        assert_eq!(FtmEffect::PitchSlide { delta: 1 }.kind(), FtmEffectType::Slide);
        assert!(FtmEffectType::Delay < FtmEffectType::Instrument);
        assert!(FtmEffectType::Note < FtmEffectType::Sweep);
    }

    #[test]
    fn test_arpeggio_phases() {
        let mut t = tone();
        let mut arp = FtmEffect::Arpeggio { x: 4, y: 7, phase: 0 };
        let mut notes = Vec::new();
        for _ in 0..4 {
            t.cur_note = 0;
            assert!(run(&mut arp, &mut t));
            notes.push(t.cur_note);
        }
        assert_eq!(notes, vec![0, 4, 7, 0]);

        let mut arp = FtmEffect::Arpeggio { x: 12, y: 0, phase: 0 };
        let mut notes = Vec::new();
        for _ in 0..3 {
            t.cur_note = 0;
            run(&mut arp, &mut t);
            notes.push(t.cur_note);
        }
        assert_eq!(notes, vec![0, 12, 0]);
    }

    #[test]
    fn test_zero_parameter_turns_effect_off() {
        let mut t = tone();
        assert!(!run(&mut FtmEffect::Arpeggio { x: 0, y: 0, phase: 0 }, &mut t));
        assert!(!run(&mut FtmEffect::Vibrato { speed: 0, depth: 0 }, &mut t));
        assert!(!run(&mut FtmEffect::VolumeSlide { up: 0, down: 0 }, &mut t));
        assert!(!run(&mut FtmEffect::Portamento { speed: 0, target: None }, &mut t));
    }

    #[test]
    fn test_portamento_reaches_target() {
        let mut t = tone();
        t.note_on(46);
        let target_period = PeriodTable::Ntsc.period(48);
        let start_period = PeriodTable::Ntsc.period(46);
        let mut porta = FtmEffect::Portamento { speed: 4, target: Some(48) };

        let mut frames = 0;
        while t.master_note != 48 {
            assert!(run(&mut porta, &mut t));
            frames += 1;
            assert!(frames < 100);
        }
        assert_eq!(t.slide_period, 0);
        assert_eq!(frames, ((start_period - target_period) as f64 / 4.0).ceil() as i32);
        assert_eq!(porta, FtmEffect::Portamento { speed: 4, target: None });
    }

    #[test]
    fn test_note_slide_ends_on_arrival() {
        let mut t = tone();
        t.note_on(40);
        let mut slide = FtmEffect::NoteSlide { speed: 64, offset: 2, target: None };
        let mut frames = 0;
        while run(&mut slide, &mut t) {
            frames += 1;
            assert!(frames < 100);
        }
        assert_eq!(t.master_note, 42);
    }

    #[test]
    fn test_cut_counts_down() {
        let mut t = tone();
        t.note_on(30);
        let mut cut = FtmEffect::Cut { frames: 2 };
        assert!(run(&mut cut, &mut t));
        assert!(run(&mut cut, &mut t));
        assert!(t.is_playing());
        assert!(!run(&mut cut, &mut t));
        assert!(!t.is_playing());
    }

    #[test]
    fn test_volume_slide_commits_whole_steps() {
        let mut t = tone();
        t.master_volume = 10;
        let mut slide = FtmEffect::VolumeSlide { up: 0, down: 4 };
        // -8/16 per frame: a whole step every two frames
        run(&mut slide, &mut t);
        assert_eq!(t.master_volume, 10);
        assert_eq!(t.volume_accum, -8);
        run(&mut slide, &mut t);
        assert_eq!(t.master_volume, 9);
        assert_eq!(t.volume_accum, 0);
    }

    #[test]
    fn test_vibrato_shape() {
        let depth = 0x0F << 4;
        assert_eq!(vibrato_value(VibratoStyle::New, 0, depth), 0);
        assert!(vibrato_value(VibratoStyle::New, 15, depth) > 200);
        assert_eq!(
            vibrato_value(VibratoStyle::New, 40, depth),
            -vibrato_value(VibratoStyle::New, 8, depth)
        );
        // Old style never goes negative
        for phase in 0..64 {
            assert!(vibrato_value(VibratoStyle::Old, phase, 8 << 4) >= 0);
        }
    }

    #[test]
    fn test_tremolo_is_attenuation_only() {
        for phase in 0..64 {
            assert!(tremolo_value(VibratoStyle::New, phase, 0x0F << 4) >= 0);
        }
        assert_eq!(tremolo_value(VibratoStyle::New, 0, 0x0F << 4), 0);
    }
}
