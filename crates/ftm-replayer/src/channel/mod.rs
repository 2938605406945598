//! Channel runtime
//!
//! A channel is split in two: [`ToneState`] holds the musical state shared by
//! every voice type (notes, volumes, slides, sequences), and a
//! [`ChannelDevice`] translates the computed values into parameters of one
//! chip generator. Devices are picked by channel code in [`select_device`].

mod device;
mod selector;

use std::collections::BTreeMap;

use nes_apu::mixer::{MixerOutput, SoundMixer};
use nes_apu::ChannelCode;

use crate::effect::{EffectContext, FtmEffect, FtmEffectType};
use crate::format::{ArpSetting, FtmAudio, SequenceKind, VibratoStyle, MAX_NOTE};
use crate::note_table::PeriodTable;
use crate::sequence::SequenceHandler;

pub use device::{
    ChannelDevice, DpcmDevice, Mmc5PulseDevice, NoiseDevice, Pulse2A03Device, SawtoothDevice,
    SilentDevice, TriangleDevice, Vrc6PulseDevice,
};
pub use selector::select_device;

/// Highest volume value a channel computes (15 * 16)
pub const MAX_VOLUME: i32 = 240;

/// Note lifecycle of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Silent
    #[default]
    Idle,
    /// Note sounding
    Playing,
    /// Note released, sequences past their release points
    Releasing,
}

/// Musical state of one voice
#[derive(Debug, Clone)]
pub struct ToneState {
    /// Voice
    pub code: ChannelCode,
    /// Note lifecycle
    pub state: VoiceState,
    /// Current instrument
    pub instrument: Option<u8>,
    /// Set when the instrument changed since the last note
    pub instrument_updated: bool,

    /// Note from the note column (1-96, 0 = none)
    pub master_note: i32,
    /// Volume column (0-15)
    pub master_volume: i32,
    /// `Pxx` offset, positive raises the pitch
    pub master_pitch: i32,
    /// `Vxx` duty
    pub master_duty: i32,

    /// Per-frame note offset from effects
    pub cur_note: i32,
    /// Per-frame volume offset from effects, in 1/16 steps
    pub cur_volume: i32,
    /// Per-frame period offset from effects
    pub cur_period: i32,

    /// Period offset of the running slide
    pub slide_period: i32,
    /// Volume slide remainder, in 1/16 steps
    pub volume_accum: i32,
    /// Vibrato phase (0-63)
    pub vibrato_phase: i32,
    /// Tremolo phase (0-63)
    pub tremolo_phase: i32,
    /// Sweep unit byte; bit 7 marks a pending write
    pub sweep: u8,
    /// DPCM start offset in bytes
    pub dpcm_offset: usize,
    /// DPCM rate override
    pub dpcm_pitch: Option<u8>,
    /// DPCM DAC load, consumed by the device
    pub dac: Option<u8>,
    /// Set on the frame a note starts
    pub note_triggered: bool,

    /// Envelope sequences
    pub seq: SequenceHandler,
    /// Period table
    pub table: PeriodTable,
    /// Vibrato table flavour
    pub vibrato_style: VibratoStyle,

    /// Computed volume (0-240)
    pub out_volume: i32,
    /// Computed note (0 = none)
    pub out_note: i32,
    /// Computed period
    pub out_period: i32,
    /// Computed duty
    pub out_duty: i32,
}

impl ToneState {
    /// Idle state for a voice
    pub fn new(code: ChannelCode, table: PeriodTable, vibrato_style: VibratoStyle) -> Self {
        Self {
            code,
            state: VoiceState::Idle,
            instrument: None,
            instrument_updated: false,
            master_note: 0,
            master_volume: 15,
            master_pitch: 0,
            master_duty: 0,
            cur_note: 0,
            cur_volume: 0,
            cur_period: 0,
            slide_period: 0,
            volume_accum: 0,
            vibrato_phase: 0,
            tremolo_phase: 0,
            sweep: 0,
            dpcm_offset: 0,
            dpcm_pitch: None,
            dac: None,
            note_triggered: false,
            seq: SequenceHandler::new(),
            table,
            vibrato_style,
            out_volume: 0,
            out_note: 0,
            out_period: 0,
            out_duty: 0,
        }
    }

    /// Whether a note is sounding (playing or releasing)
    pub fn is_playing(&self) -> bool {
        self.state != VoiceState::Idle
    }

    /// Start a note
    pub fn note_on(&mut self, note: i32) {
        self.master_note = note.clamp(1, MAX_NOTE as i32);
        self.state = VoiceState::Playing;
        self.slide_period = 0;
        self.sweep = 0;
        self.note_triggered = true;
        self.instrument_updated = false;
        self.seq.start();
    }

    /// Release the note; sequences jump past their release points
    pub fn release(&mut self) {
        if self.state == VoiceState::Playing {
            self.state = VoiceState::Releasing;
            self.seq.release();
        }
    }

    /// Cut the note
    pub fn halt(&mut self) {
        self.state = VoiceState::Idle;
    }

    /// Switch instrument and load its sequences
    ///
    /// A missing instrument keeps the index but loads no sequences.
    pub fn set_instrument(&mut self, index: u8, audio: &FtmAudio) {
        if self.instrument == Some(index) {
            return;
        }
        self.instrument = Some(index);
        self.instrument_updated = true;
        match audio.instrument(index) {
            Some(instrument) => self.seq.set_instrument(audio.instrument_sequences(instrument)),
            None => {
                log::warn!("channel {}: instrument {:02X} does not exist", self.code, index);
                self.seq.clear();
            }
        }
    }

    /// Add a volume slide step (1/16 units); whole steps move the volume
    pub fn slide_volume(&mut self, amount: i32) {
        self.volume_accum += amount;
        while self.volume_accum >= 16 {
            if self.master_volume >= 15 {
                self.volume_accum = 0;
                break;
            }
            self.master_volume += 1;
            self.volume_accum -= 16;
        }
        while self.volume_accum <= -16 {
            if self.master_volume <= 0 {
                self.volume_accum = 0;
                break;
            }
            self.master_volume -= 1;
            self.volume_accum += 16;
        }
        self.cur_volume += self.volume_accum;
    }

    /// Clear the per-frame offsets
    fn begin_frame(&mut self) {
        self.cur_note = 0;
        self.cur_volume = 0;
        self.cur_period = 0;
    }

    /// Fold a relative arpeggio step into the master note
    fn apply_relative_arp(&mut self) {
        if self.seq.delta_note != 0 && self.master_note != 0 {
            self.master_note = (self.master_note + self.seq.delta_note).clamp(1, MAX_NOTE as i32);
        }
    }
}

/// Volume after sequence scaling, 0-240
///
/// Only 0 when the volume sequence is at 0 or the channel volume plus effect
/// offsets is not positive; otherwise at least 1.
pub fn calculate_volume(tone: &ToneState) -> i32 {
    let volume = tone.master_volume * 16 + tone.cur_volume;
    if volume <= 0 {
        return 0;
    }
    let scaled = tone.seq.volume * volume / 15;
    if scaled > MAX_VOLUME {
        MAX_VOLUME
    } else if scaled < 1 {
        if tone.seq.volume == 0 {
            0
        } else {
            1
        }
    } else {
        scaled
    }
}

/// Note after effects and arpeggio, clamped to 1-96; 0 when no note is set
pub fn calculate_note(tone: &ToneState) -> i32 {
    if tone.master_note == 0 {
        return 0;
    }
    let mut note = tone.master_note + tone.cur_note;
    match tone.seq.arp_setting {
        ArpSetting::Absolute => note += tone.seq.arp,
        ArpSetting::Fixed if tone.seq.has(SequenceKind::Arpeggio) => note = tone.seq.arp + 1,
        _ => {}
    }
    note.clamp(1, MAX_NOTE as i32)
}

/// Period before the chip limits are applied
pub fn raw_period(tone: &ToneState, note: i32) -> i32 {
    tone.table.period(note) - tone.master_pitch
        + tone.cur_period
        + tone.slide_period
        + tone.seq.period
}

/// Note and period (1..=`max_period`); both 0 when no note is set
pub fn calculate_period(tone: &ToneState, max_period: i32) -> (i32, i32) {
    let note = calculate_note(tone);
    if note == 0 {
        return (0, 0);
    }
    (note, raw_period(tone, note).clamp(1, max_period))
}

/// Sequence duty if one is running, else the `Vxx` duty, masked
pub fn calculate_duty(tone: &ToneState, mask: i32) -> i32 {
    let duty = if tone.seq.duty >= 0 {
        tone.seq.duty
    } else {
        tone.master_duty
    };
    duty & mask
}

/// One voice: musical state, live effects and chip device
pub struct FtmChannel {
    /// Musical state
    pub tone: ToneState,
    effects: BTreeMap<FtmEffectType, FtmEffect>,
    device: Box<dyn ChannelDevice>,
}

impl FtmChannel {
    /// Channel for a voice of `audio`
    pub fn new(code: ChannelCode, audio: &FtmAudio) -> Self {
        let device = select_device(code);
        let table = device.period_table(audio);
        Self {
            tone: ToneState::new(code, table, audio.vibrato_style),
            effects: BTreeMap::new(),
            device,
        }
    }

    /// Voice
    pub fn code(&self) -> ChannelCode {
        self.tone.code
    }

    /// Return to power-on state and drop every effect
    pub fn reset(&mut self) {
        self.tone = ToneState::new(self.tone.code, self.tone.table, self.tone.vibrato_style);
        self.effects.clear();
        self.device.reset();
    }

    /// Drop every live effect
    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }

    /// Live effect in a slot
    pub fn effect(&self, kind: FtmEffectType) -> Option<&FtmEffect> {
        self.effects.get(&kind)
    }

    /// Live effect slots
    pub fn effect_types(&self) -> impl Iterator<Item = FtmEffectType> + '_ {
        self.effects.keys().copied()
    }

    /// Publish a row's effects
    ///
    /// A pending delay is flushed first. A delayed row is parked in the delay
    /// slot until it runs out.
    pub fn publish(&mut self, effects: Vec<FtmEffect>, delay: Option<u8>) {
        if effects.is_empty() {
            return;
        }
        self.flush_delay();
        match delay {
            Some(frames) => {
                self.effects.insert(
                    FtmEffectType::Delay,
                    FtmEffect::Delay {
                        frames,
                        pending: effects,
                    },
                );
            }
            None => self.insert_all(effects),
        }
    }

    fn insert_all(&mut self, effects: Vec<FtmEffect>) {
        for effect in effects {
            self.effects.insert(effect.kind(), effect);
        }
    }

    fn flush_delay(&mut self) {
        if let Some(FtmEffect::Delay { pending, .. }) = self.effects.remove(&FtmEffectType::Delay) {
            self.insert_all(pending);
        }
    }

    /// Run one frame: effects, sequences, calculations and the device write
    pub fn play_note(&mut self, audio: &FtmAudio) {
        self.tone.begin_frame();

        let expired = match self.effects.get_mut(&FtmEffectType::Delay) {
            Some(FtmEffect::Delay { frames, .. }) if *frames == 0 => true,
            Some(FtmEffect::Delay { frames, .. }) => {
                *frames -= 1;
                false
            }
            _ => false,
        };
        if expired {
            self.flush_delay();
        }

        let mut ctx = EffectContext {
            tone: &mut self.tone,
            audio,
        };
        self.effects.retain(|_, effect| effect.execute(&mut ctx));

        self.tone.seq.update();
        self.tone.apply_relative_arp();

        self.tone.out_volume = self.device.calculate_volume(&self.tone);
        let (note, period) = self.device.calculate_period(&self.tone);
        self.tone.out_note = note;
        self.tone.out_period = period;
        self.tone.out_duty = self.device.calculate_duty(&self.tone);

        self.device.write_to_sound(&mut self.tone, audio);
        self.tone.note_triggered = false;
    }

    /// Release the note
    pub fn do_release(&mut self) {
        self.tone.release();
    }

    /// Run the generator for a frame and finish it
    pub fn process_sound(&mut self, mixer: &mut dyn SoundMixer, id: usize, cycles: u32) {
        self.device.process(cycles, &mut MixerOutput::new(mixer, id));
        self.device.end_frame();
    }

    /// Computed volume of the last frame (0-240)
    pub fn current_volume(&self) -> i32 {
        self.tone.out_volume
    }

    /// Whether a note is sounding
    pub fn is_playing(&self) -> bool {
        self.tone.is_playing()
    }

    /// Chip device
    pub fn device(&self) -> &dyn ChannelDevice {
        self.device.as_ref()
    }
}

impl std::fmt::Debug for FtmChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtmChannel")
            .field("code", &self.tone.code)
            .field("state", &self.tone.state)
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::format::{FtmInstrument, FtmSequence};
    use nes_apu::ChipType;

    fn tone() -> ToneState {
        ToneState::new(ChannelCode::Pulse1, PeriodTable::Ntsc, VibratoStyle::New)
    }

    fn volume_seq(tone: &mut ToneState, value: i8) {
        let mut slots: [Option<Arc<FtmSequence>>; 5] = Default::default();
        slots[0] = Some(Arc::new(FtmSequence::new(vec![value])));
        tone.seq.set_instrument(slots);
        tone.seq.start();
        tone.seq.update();
    }

    #[test]
    fn test_volume_clamp_range() {
        let mut t = tone();
        for seq_volume in 0..=15 {
            volume_seq(&mut t, seq_volume);
            for master in 0..=15 {
                for cur in (-300..=300).step_by(7) {
                    t.master_volume = master;
                    t.cur_volume = cur;
                    let v = calculate_volume(&t);
                    assert!((0..=MAX_VOLUME).contains(&v));
                    let upstream = master * 16 + cur;
                    assert_eq!(v == 0, seq_volume == 0 || upstream <= 0);
                }
            }
        }
    }

    #[test]
    fn test_full_volume() {
        let t = tone();
        assert_eq!(calculate_volume(&t), MAX_VOLUME);
    }

    #[test]
    fn test_period_calculation() {
        let mut t = tone();
        assert_eq!(calculate_period(&t, 0x7FF), (0, 0));

        t.note_on(46);
        assert_eq!(calculate_period(&t, 0x7FF), (46, 253));

        t.master_pitch = 3;
        t.cur_period = -2;
        t.slide_period = 10;
        assert_eq!(calculate_period(&t, 0x7FF).1, 253 - 3 - 2 + 10);

        t.slide_period = -1000;
        assert_eq!(calculate_period(&t, 0x7FF).1, 1);

        t.slide_period = 0;
        t.master_pitch = 0;
        t.cur_period = 0;
        t.note_on(1);
        assert_eq!(calculate_period(&t, 0x7FF).1, 0x7FF);
    }

    #[test]
    fn test_note_clamped() {
        let mut t = tone();
        t.note_on(95);
        t.cur_note = 12;
        assert_eq!(calculate_note(&t), MAX_NOTE as i32);
    }

    #[test]
    fn test_fixed_arpeggio_replaces_note() {
        let mut t = tone();
        let mut slots: [Option<Arc<FtmSequence>>; 5] = Default::default();
        slots[1] = Some(Arc::new(
            FtmSequence::new(vec![24]).with_setting(ArpSetting::Fixed),
        ));
        t.seq.set_instrument(slots);
        t.note_on(60);
        t.seq.update();
        assert_eq!(calculate_note(&t), 25);
    }

    #[test]
    fn test_duty_selection() {
        let mut t = tone();
        t.master_duty = 6;
        assert_eq!(calculate_duty(&t, 0x03), 2);
        t.seq.duty = 1;
        assert_eq!(calculate_duty(&t, 0x03), 1);
    }

    #[test]
    fn test_release_only_from_playing() {
        let mut t = tone();
        t.release();
        assert_eq!(t.state, VoiceState::Idle);
        t.note_on(10);
        t.release();
        assert_eq!(t.state, VoiceState::Releasing);
        assert!(t.is_playing());
        t.halt();
        assert!(!t.is_playing());
    }

    #[test]
    fn test_delay_holds_row_back() {
        let audio = FtmAudio::default();
        let mut channel = FtmChannel::new(ChannelCode::Pulse1, &audio);
        channel.publish(vec![FtmEffect::Note(40)], Some(2));

        channel.play_note(&audio);
        channel.play_note(&audio);
        assert!(!channel.is_playing());
        channel.play_note(&audio);
        assert!(channel.is_playing());
        assert_eq!(channel.tone.master_note, 40);
        assert!(channel.effect(FtmEffectType::Delay).is_none());
    }

    #[test]
    fn test_new_row_flushes_pending_delay() {
        let audio = FtmAudio::default();
        let mut channel = FtmChannel::new(ChannelCode::Pulse1, &audio);
        channel.publish(vec![FtmEffect::Volume(4)], Some(5));
        channel.publish(vec![FtmEffect::Note(30)], None);
        channel.play_note(&audio);
        assert_eq!(channel.tone.master_volume, 4);
        assert!(channel.is_playing());
    }

    #[test]
    fn test_same_slot_replaces() {
        let audio = FtmAudio::default();
        let mut channel = FtmChannel::new(ChannelCode::Pulse1, &audio);
        channel.publish(vec![FtmEffect::Vibrato { speed: 4, depth: 0x40 }], None);
        channel.publish(vec![FtmEffect::Vibrato { speed: 2, depth: 0x20 }], None);
        assert_eq!(
            channel.effect(FtmEffectType::Vibrato),
            Some(&FtmEffect::Vibrato { speed: 2, depth: 0x20 })
        );
        assert_eq!(channel.effect_types().count(), 1);
    }

    #[test]
    fn test_missing_instrument_degrades() {
        let audio = FtmAudio::default();
        let mut channel = FtmChannel::new(ChannelCode::Pulse1, &audio);
        channel.publish(vec![FtmEffect::Instrument(7), FtmEffect::Note(40)], None);
        channel.play_note(&audio);
        assert!(channel.is_playing());
        assert_eq!(channel.current_volume(), MAX_VOLUME);
    }

    #[test]
    fn test_instrument_sequences_drive_volume() {
        let mut audio = FtmAudio::default();
        audio.sequences.insert(
            (ChipType::Apu2A03, SequenceKind::Volume, 0),
            Arc::new(FtmSequence::new(vec![15, 7, 0])),
        );
        audio.instruments.push(Some(
            FtmInstrument::new("pluck", ChipType::Apu2A03).with_sequence(SequenceKind::Volume, 0),
        ));

        let mut channel = FtmChannel::new(ChannelCode::Pulse1, &audio);
        channel.publish(vec![FtmEffect::Instrument(0), FtmEffect::Note(40)], None);
        let volumes: Vec<i32> = (0..4)
            .map(|_| {
                channel.play_note(&audio);
                channel.current_volume()
            })
            .collect();
        assert_eq!(volumes, vec![240, 112, 0, 0]);
    }
}
