//! Row cell to effect conversion

use super::{FtmEffect, GlobalEffect};
use crate::format::{EffectKind, FtmNote, NoteValue};

/// Effects decoded from one channel's row cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowEffects {
    /// Channel effects, in column order
    pub channel: Vec<FtmEffect>,
    /// `Gxx` frames, when the row is delayed
    pub delay: Option<u8>,
    /// Effects for the row fetcher
    pub global: Vec<GlobalEffect>,
}

/// Decode a row cell
///
/// # Arguments
///
/// * `note` - The cell
/// * `split` - `Fxx` values at or above it set the tempo
/// * `playing` - Whether the channel is sounding a note
/// * `live_slide` - The channel's live slide effect, if any
pub fn convert_row(
    note: &FtmNote,
    split: u32,
    playing: bool,
    live_slide: Option<&FtmEffect>,
) -> RowEffects {
    let mut row = RowEffects::default();
    let mut portamento: Option<i32> = None;

    for command in &note.effects {
        let param = command.param;
        let hi = (param >> 4) as i32;
        let lo = (param & 0x0F) as i32;
        let effect = match command.kind {
            EffectKind::None => continue,
            EffectKind::Speed => {
                if param == 0 {
                    continue;
                }
                let value = param as u32;
                row.global.push(if value >= split {
                    GlobalEffect::Tempo(value)
                } else {
                    GlobalEffect::Speed(value)
                });
                continue;
            }
            EffectKind::Jump => {
                row.global.push(GlobalEffect::Jump(param as usize));
                continue;
            }
            EffectKind::Skip => {
                row.global.push(GlobalEffect::Skip(param as usize));
                continue;
            }
            EffectKind::Halt => {
                row.global.push(GlobalEffect::Stop);
                continue;
            }
            EffectKind::Delay => {
                row.delay = if param > 0 { Some(param) } else { None };
                continue;
            }
            EffectKind::Portamento => {
                portamento = Some(param as i32);
                FtmEffect::Portamento {
                    speed: param as i32,
                    target: None,
                }
            }
            EffectKind::SweepUp => FtmEffect::Sweep(0x88 | (param & 0x77)),
            EffectKind::SweepDown => FtmEffect::Sweep(0x80 | (param & 0x77)),
            EffectKind::Arpeggio => FtmEffect::Arpeggio { x: hi, y: lo, phase: 0 },
            EffectKind::Vibrato => FtmEffect::Vibrato { speed: hi, depth: lo << 4 },
            EffectKind::Tremolo => FtmEffect::Tremolo { speed: hi, depth: lo << 4 },
            EffectKind::Pitch => FtmEffect::FinePitch(param as i32 - 0x80),
            EffectKind::Dac => FtmEffect::Dac(param & 0x7F),
            EffectKind::PortaUp => FtmEffect::PitchSlide { delta: -(param as i32) },
            EffectKind::PortaDown => FtmEffect::PitchSlide { delta: param as i32 },
            EffectKind::DutyCycle => FtmEffect::Duty(param as i32),
            EffectKind::SampleOffset => FtmEffect::DpcmOffset(param as usize * 64),
            EffectKind::SlideUp => FtmEffect::NoteSlide {
                speed: hi * 2 + 1,
                offset: lo,
                target: None,
            },
            EffectKind::SlideDown => FtmEffect::NoteSlide {
                speed: hi * 2 + 1,
                offset: -lo,
                target: None,
            },
            EffectKind::VolumeSlide => FtmEffect::VolumeSlide { up: hi, down: lo },
            EffectKind::NoteCut => FtmEffect::Cut { frames: param },
            EffectKind::DpcmPitch => FtmEffect::DpcmPitch(param & 0x0F),
            EffectKind::Volume
            | EffectKind::PortaOff
            | EffectKind::Retrigger
            | EffectKind::FdsModDepth
            | EffectKind::FdsModSpeedHi
            | EffectKind::FdsModSpeedLo => {
                log::warn!("unsupported effect {:?} ({:02X}) ignored", command.kind, param);
                continue;
            }
        };
        row.channel.push(effect);
    }

    if let Some(instrument) = note.instrument {
        row.channel.push(FtmEffect::Instrument(instrument));
    }
    if let Some(volume) = note.volume {
        row.channel.push(FtmEffect::Volume(volume as i32));
    }

    match note.note {
        NoteValue::None => {}
        NoteValue::Halt => row.channel.push(FtmEffect::Halt),
        NoteValue::Release => row.channel.push(FtmEffect::Release),
        NoteValue::Pitch(pitch) => {
            let pitch = pitch as i32;
            let speed = match (portamento, live_slide) {
                (Some(speed), _) => speed,
                (None, Some(FtmEffect::Portamento { speed, .. })) => *speed,
                _ => 0,
            };
            if speed > 0 && playing {
                // Glide to the new note instead of restarting
                row.channel
                    .retain(|effect| !matches!(effect, FtmEffect::Portamento { .. }));
                row.channel.push(FtmEffect::Portamento {
                    speed,
                    target: Some(pitch),
                });
            } else {
                row.channel.push(FtmEffect::Note(pitch));
            }
        }
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DEFAULT_SPEED_SPLIT;

    fn convert(note: &FtmNote) -> RowEffects {
        convert_row(note, DEFAULT_SPEED_SPLIT, false, None)
    }

    #[test]
    fn test_speed_tempo_split() {
        let row = convert(&FtmNote::effect(EffectKind::Speed, 3));
        assert_eq!(row.global, vec![GlobalEffect::Speed(3)]);
        let row = convert(&FtmNote::effect(EffectKind::Speed, 0x96));
        assert_eq!(row.global, vec![GlobalEffect::Tempo(150)]);
        let row = convert(&FtmNote::effect(EffectKind::Speed, 0));
        assert!(row.global.is_empty());
    }

    #[test]
    fn test_note_with_columns() {
        let cell = FtmNote::pitch(37)
            .with_instrument(2)
            .with_volume(9)
            .with_effect(EffectKind::Vibrato, 0x48);
        let row = convert(&cell);
        assert_eq!(
            row.channel,
            vec![
                FtmEffect::Vibrato { speed: 4, depth: 0x80 },
                FtmEffect::Instrument(2),
                FtmEffect::Volume(9),
                FtmEffect::Note(37),
            ]
        );
        assert!(row.delay.is_none());
    }

    #[test]
    fn test_portamento_captures_note_when_playing() {
        let cell = FtmNote::pitch(50).with_effect(EffectKind::Portamento, 5);
        let row = convert_row(&cell, DEFAULT_SPEED_SPLIT, true, None);
        assert_eq!(
            row.channel,
            vec![FtmEffect::Portamento { speed: 5, target: Some(50) }]
        );

        // Not playing: the note starts normally
        let row = convert_row(&cell, DEFAULT_SPEED_SPLIT, false, None);
        assert!(row.channel.contains(&FtmEffect::Note(50)));
    }

    #[test]
    fn test_live_portamento_carries_speed() {
        let live = FtmEffect::Portamento { speed: 7, target: None };
        let row = convert_row(&FtmNote::pitch(20), DEFAULT_SPEED_SPLIT, true, Some(&live));
        assert_eq!(
            row.channel,
            vec![FtmEffect::Portamento { speed: 7, target: Some(20) }]
        );
    }

    #[test]
    fn test_sweep_bytes() {
        let row = convert(&FtmNote::effect(EffectKind::SweepUp, 0x3F));
        assert_eq!(row.channel, vec![FtmEffect::Sweep(0x88 | 0x37)]);
        let row = convert(&FtmNote::effect(EffectKind::SweepDown, 0x12));
        assert_eq!(row.channel, vec![FtmEffect::Sweep(0x92)]);
    }

    #[test]
    fn test_delay_and_globals() {
        let cell = FtmNote::pitch(10)
            .with_effect(EffectKind::Delay, 2)
            .with_effect(EffectKind::Jump, 4)
            .with_effect(EffectKind::Skip, 0);
        let row = convert(&cell);
        assert_eq!(row.delay, Some(2));
        assert_eq!(row.global, vec![GlobalEffect::Jump(4), GlobalEffect::Skip(0)]);
        assert_eq!(row.channel, vec![FtmEffect::Note(10)]);
    }

    #[test]
    fn test_unsupported_effect_ignored() {
        let row = convert(&FtmNote::effect(EffectKind::Retrigger, 3));
        assert!(row.channel.is_empty());
        assert!(row.global.is_empty());
    }
}
