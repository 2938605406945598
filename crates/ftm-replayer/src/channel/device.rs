//! Chip devices: computed channel values to generator parameters

use nes_apu::constants::LENGTH_TABLE;
use nes_apu::generators::{
    DpcmSound, NoiseSound, PulseSound, SawtoothSound, TriangleSound, Vrc6PulseSound,
};
use nes_apu::{SoundGenerator, SoundOutput};

use super::{calculate_duty, calculate_note, calculate_period, calculate_volume, raw_period, ToneState};
use crate::format::{FtmAudio, Region};
use crate::note_table::PeriodTable;

/// Capability set of one chip voice
///
/// The provided methods implement the shared tone-channel behaviour; a
/// device overrides only what its chip does differently and always supplies
/// [`ChannelDevice::write_to_sound`].
pub trait ChannelDevice: Send {
    /// Table base periods are read from
    fn period_table(&self, audio: &FtmAudio) -> PeriodTable {
        match audio.region {
            Region::Ntsc => PeriodTable::Ntsc,
            Region::Pal => PeriodTable::Pal,
        }
    }

    /// Largest period the chip timer accepts
    fn max_period(&self) -> i32 {
        0x7FF
    }

    /// Valid duty bits
    fn duty_mask(&self) -> i32 {
        0x03
    }

    /// Volume, 0-240
    fn calculate_volume(&self, tone: &ToneState) -> i32 {
        calculate_volume(tone)
    }

    /// Note and period
    fn calculate_period(&self, tone: &ToneState) -> (i32, i32) {
        calculate_period(tone, self.max_period())
    }

    /// Duty selector
    fn calculate_duty(&self, tone: &ToneState) -> i32 {
        calculate_duty(tone, self.duty_mask())
    }

    /// Write the computed `out_*` values to the generator
    ///
    /// Pending one-shot requests on the tone (sweep writes, DAC loads) are
    /// consumed here.
    fn write_to_sound(&mut self, tone: &mut ToneState, audio: &FtmAudio);

    /// The generator, if the voice is emulated
    fn generator(&self) -> Option<&dyn SoundGenerator>;

    /// Mutable generator, if the voice is emulated
    fn generator_mut(&mut self) -> Option<&mut dyn SoundGenerator>;

    /// Run the generator
    fn process(&mut self, cycles: u32, out: &mut dyn SoundOutput) {
        if let Some(generator) = self.generator_mut() {
            generator.process(cycles, out);
        }
    }

    /// Finish the generator frame
    fn end_frame(&mut self) {
        if let Some(generator) = self.generator_mut() {
            generator.end_frame();
        }
    }

    /// Power-on reset
    fn reset(&mut self) {
        if let Some(generator) = self.generator_mut() {
            generator.reset();
        }
    }

    /// Current generator level
    fn level(&self) -> i32 {
        self.generator().map_or(0, |g| g.level())
    }
}

macro_rules! generator_access {
    () => {
        fn generator(&self) -> Option<&dyn SoundGenerator> {
            Some(&self.sound)
        }

        fn generator_mut(&mut self) -> Option<&mut dyn SoundGenerator> {
            Some(&mut self.sound)
        }
    };
}

fn gate(tone: &ToneState) -> bool {
    tone.is_playing() && tone.out_note != 0 && tone.out_volume > 0
}

/// 2A03 pulse with sweep unit
#[derive(Debug, Clone)]
pub struct Pulse2A03Device {
    /// Generator
    pub sound: PulseSound,
}

impl Pulse2A03Device {
    /// Device for pulse 1 (`first`) or pulse 2
    pub fn new(first: bool) -> Self {
        Self {
            sound: if first {
                PulseSound::first()
            } else {
                PulseSound::new()
            },
        }
    }

    fn write_sweep(&mut self, tone: &mut ToneState) {
        let sweep = tone.sweep;
        if sweep == 0 {
            // Closing a sweep: rewrite the unit as disabled and reload the period
            self.sound.sweep_enabled = false;
            self.sound.sweep_period = 1;
            self.sound.sweep_mode = true;
            self.sound.sweep_shift = 0;
            self.sound.sweep_updated = true;
            self.sound.period = tone.out_period as u16;
            self.sound.length_counter = LENGTH_TABLE[0];
        } else if sweep & 0x80 != 0 {
            self.sound.sweep_enabled = true;
            self.sound.sweep_period = ((sweep >> 4) & 0x07) + 1;
            self.sound.sweep_mode = sweep & 0x08 != 0;
            self.sound.sweep_shift = sweep & 0x07;
            self.sound.sweep_updated = true;
            self.sound.period = tone.out_period as u16;
            self.sound.length_counter = LENGTH_TABLE[0];
            tone.sweep &= 0x7F;
        }
        // A running sweep owns the period register
    }
}

impl ChannelDevice for Pulse2A03Device {
    fn write_to_sound(&mut self, tone: &mut ToneState, _audio: &FtmAudio) {
        self.sound.looping = true;
        self.sound.envelope_fix = true;
        if !gate(tone) {
            self.sound.fixed_volume = 0;
            return;
        }
        self.sound.duty_length = tone.out_duty as u8;
        self.sound.fixed_volume = (tone.out_volume / 16) as u8;
        self.write_sweep(tone);
    }

    generator_access!();
}

/// MMC5 pulse: a 2A03 pulse without sweep
#[derive(Debug, Clone)]
pub struct Mmc5PulseDevice {
    /// Generator
    pub sound: PulseSound,
}

impl Mmc5PulseDevice {
    /// Silent MMC5 pulse
    pub fn new() -> Self {
        Self {
            sound: PulseSound::new(),
        }
    }
}

impl Default for Mmc5PulseDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDevice for Mmc5PulseDevice {
    fn write_to_sound(&mut self, tone: &mut ToneState, _audio: &FtmAudio) {
        self.sound.looping = true;
        self.sound.envelope_fix = true;
        self.sound.sweep_enabled = false;
        if !gate(tone) {
            self.sound.fixed_volume = 0;
            return;
        }
        self.sound.duty_length = tone.out_duty as u8;
        self.sound.fixed_volume = (tone.out_volume / 16) as u8;
        self.sound.period = tone.out_period as u16;
        self.sound.length_counter = LENGTH_TABLE[0];
    }

    generator_access!();
}

/// 2A03 triangle
#[derive(Debug, Clone, Default)]
pub struct TriangleDevice {
    /// Generator
    pub sound: TriangleSound,
}

impl ChannelDevice for TriangleDevice {
    fn write_to_sound(&mut self, tone: &mut ToneState, _audio: &FtmAudio) {
        self.sound.enabled = gate(tone);
        if self.sound.enabled {
            self.sound.period = tone.out_period as u16;
        }
    }

    generator_access!();
}

/// 2A03 noise
#[derive(Debug, Clone, Default)]
pub struct NoiseDevice {
    /// Generator
    pub sound: NoiseSound,
}

impl ChannelDevice for NoiseDevice {
    fn period_table(&self, _audio: &FtmAudio) -> PeriodTable {
        PeriodTable::Noise
    }

    fn max_period(&self) -> i32 {
        0x0F
    }

    fn duty_mask(&self) -> i32 {
        0x01
    }

    /// Noise periods wrap through the 16 rates instead of saturating
    fn calculate_period(&self, tone: &ToneState) -> (i32, i32) {
        let note = calculate_note(tone);
        if note == 0 {
            return (0, 0);
        }
        (note, raw_period(tone, note).max(0) & self.max_period())
    }

    fn write_to_sound(&mut self, tone: &mut ToneState, _audio: &FtmAudio) {
        self.sound.enabled = true;
        if !gate(tone) {
            self.sound.fixed_volume = 0;
            return;
        }
        self.sound.fixed_volume = (tone.out_volume / 16) as u8;
        self.sound.period_index = ((tone.out_period & 0x0F) ^ 0x0F) as u8;
        self.sound.short_mode = tone.out_duty & 0x01 != 0;
    }

    generator_access!();
}

/// 2A03 delta modulation channel
#[derive(Debug, Clone, Default)]
pub struct DpcmDevice {
    /// Generator
    pub sound: DpcmSound,
}

impl DpcmDevice {
    fn trigger(&mut self, tone: &mut ToneState, audio: &FtmAudio) {
        let offset = std::mem::take(&mut tone.dpcm_offset);
        let pitch = tone.dpcm_pitch.take();

        let Some(instrument) = tone.instrument.and_then(|index| audio.instrument(index)) else {
            self.sound.stop();
            return;
        };
        let Some(key) = instrument.dpcm_key(tone.master_note as u8) else {
            self.sound.stop();
            return;
        };
        let Some(sample) = audio.dpcm_sample(key.sample) else {
            log::warn!(
                "instrument '{}' maps note {} to missing DPCM sample {}",
                instrument.name,
                tone.master_note,
                key.sample
            );
            self.sound.stop();
            return;
        };

        self.sound.rate_index = pitch.unwrap_or(key.pitch) & 0x0F;
        self.sound.looping = key.looping;
        if let Some(delta) = key.delta {
            self.sound.set_dac(delta);
        }
        self.sound.start(sample.data.clone(), offset);
    }
}

impl ChannelDevice for DpcmDevice {
    fn write_to_sound(&mut self, tone: &mut ToneState, audio: &FtmAudio) {
        if let Some(value) = tone.dac.take() {
            self.sound.set_dac(value);
        }
        if !tone.is_playing() {
            self.sound.stop();
            return;
        }
        if tone.note_triggered {
            self.trigger(tone, audio);
        }
    }

    generator_access!();
}

/// VRC6 pulse
#[derive(Debug, Clone, Default)]
pub struct Vrc6PulseDevice {
    /// Generator
    pub sound: Vrc6PulseSound,
}

impl ChannelDevice for Vrc6PulseDevice {
    fn max_period(&self) -> i32 {
        0xFFF
    }

    fn duty_mask(&self) -> i32 {
        0x07
    }

    fn write_to_sound(&mut self, tone: &mut ToneState, _audio: &FtmAudio) {
        self.sound.gate = gate(tone);
        self.sound.period = tone.out_period as u16;
        self.sound.volume = (tone.out_volume / 16) as u8;
        self.sound.duty = tone.out_duty as u8;
    }

    generator_access!();
}

/// VRC6 sawtooth
#[derive(Debug, Clone, Default)]
pub struct SawtoothDevice {
    /// Generator
    pub sound: SawtoothSound,
}

impl ChannelDevice for SawtoothDevice {
    fn period_table(&self, _audio: &FtmAudio) -> PeriodTable {
        PeriodTable::Sawtooth
    }

    fn max_period(&self) -> i32 {
        0xFFF
    }

    fn duty_mask(&self) -> i32 {
        0x07
    }

    fn write_to_sound(&mut self, tone: &mut ToneState, _audio: &FtmAudio) {
        self.sound.gate = gate(tone);
        self.sound.period = tone.out_period as u16;
        let volume = (tone.out_volume / 16) as u8;
        self.sound.rate = (volume << 1) | (((tone.out_duty & 0x01) as u8) << 5);
    }

    generator_access!();
}

/// Voice without an emulated generator (FDS, N163, VRC7, 5B)
///
/// The channel still runs its effects and sequences so position and volume
/// queries stay meaningful; no audio is produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentDevice;

impl ChannelDevice for SilentDevice {
    fn write_to_sound(&mut self, _tone: &mut ToneState, _audio: &FtmAudio) {}

    fn generator(&self) -> Option<&dyn SoundGenerator> {
        None
    }

    fn generator_mut(&mut self) -> Option<&mut dyn SoundGenerator> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DpcmKey, FtmAudioBuilder, FtmInstrument, VibratoStyle};
    use nes_apu::{ChannelCode, ChipType};

    fn playing_tone(code: ChannelCode, table: PeriodTable) -> ToneState {
        let mut tone = ToneState::new(code, table, VibratoStyle::New);
        tone.note_on(46);
        tone.out_volume = 240;
        tone.out_note = 46;
        tone.out_period = 253;
        tone.out_duty = 2;
        tone
    }

    #[test]
    fn test_pulse_writes_parameters() {
        let audio = FtmAudio::default();
        let mut device = Pulse2A03Device::new(true);
        let mut tone = playing_tone(ChannelCode::Pulse1, PeriodTable::Ntsc);
        device.write_to_sound(&mut tone, &audio);

        assert_eq!(device.sound.fixed_volume, 15);
        assert_eq!(device.sound.duty_length, 2);
        assert_eq!(device.sound.period, 253);
        assert!(device.sound.looping);
        assert!(device.sound.envelope_fix);
        assert!(!device.sound.sweep_enabled);
    }

    #[test]
    fn test_pulse_silenced_without_note() {
        let audio = FtmAudio::default();
        let mut device = Pulse2A03Device::new(false);
        let mut tone = playing_tone(ChannelCode::Pulse2, PeriodTable::Ntsc);
        device.write_to_sound(&mut tone, &audio);

        tone.halt();
        device.write_to_sound(&mut tone, &audio);
        assert_eq!(device.sound.fixed_volume, 0);

        let mut tone = playing_tone(ChannelCode::Pulse2, PeriodTable::Ntsc);
        tone.out_volume = 0;
        device.write_to_sound(&mut tone, &audio);
        assert_eq!(device.sound.fixed_volume, 0);
    }

    /// The hardware procedure for cancelling a running sweep is not fully
    /// known. Current behaviour: a sweep write enables the unit once and
    /// leaves the period to it; clearing the sweep (a new note) disables the
    /// unit with negate set and shift 0, and rewrites the period.
    #[test]
    fn test_sweep_reset_pending_behavior() {
        let audio = FtmAudio::default();
        let mut device = Pulse2A03Device::new(true);
        let mut tone = playing_tone(ChannelCode::Pulse1, PeriodTable::Ntsc);

        tone.sweep = 0x88 | 0x23;
        device.write_to_sound(&mut tone, &audio);
        assert!(device.sound.sweep_enabled);
        assert_eq!(device.sound.sweep_period, 3);
        assert!(device.sound.sweep_mode);
        assert_eq!(device.sound.sweep_shift, 3);
        assert_eq!(tone.sweep, 0x08 | 0x23);

        // While the sweep runs the period register is left alone
        device.sound.period = 100;
        tone.out_period = 300;
        device.write_to_sound(&mut tone, &audio);
        assert_eq!(device.sound.period, 100);
        assert!(device.sound.sweep_enabled);

        tone.note_on(50);
        assert_eq!(tone.sweep, 0);
        device.write_to_sound(&mut tone, &audio);
        assert!(!device.sound.sweep_enabled);
        assert!(device.sound.sweep_mode);
        assert_eq!(device.sound.sweep_shift, 0);
        assert_eq!(device.sound.period, 300);
        assert_eq!(device.sound.length_counter, LENGTH_TABLE[0]);
    }

    #[test]
    fn test_triangle_gate() {
        let audio = FtmAudio::default();
        let mut device = TriangleDevice::default();
        let mut tone = playing_tone(ChannelCode::Triangle, PeriodTable::Ntsc);
        device.write_to_sound(&mut tone, &audio);
        assert!(device.sound.enabled);
        assert_eq!(device.sound.period, 253);

        tone.out_volume = 0;
        device.write_to_sound(&mut tone, &audio);
        assert!(!device.sound.enabled);
    }

    #[test]
    fn test_noise_period_index() {
        let audio = FtmAudio::default();
        let device = NoiseDevice::default();
        let mut tone = ToneState::new(ChannelCode::Noise, PeriodTable::Noise, VibratoStyle::New);
        tone.note_on(1);
        assert_eq!(device.calculate_period(&tone), (1, 0));
        tone.note_on(18);
        assert_eq!(device.calculate_period(&tone), (18, 1));

        let mut device = device;
        tone.out_volume = 160;
        tone.out_note = 16;
        tone.out_period = 15;
        tone.out_duty = 1;
        device.write_to_sound(&mut tone, &audio);
        assert_eq!(device.sound.period_index, 0);
        assert!(device.sound.short_mode);
        assert_eq!(device.sound.fixed_volume, 10);
    }

    #[test]
    fn test_sawtooth_rate() {
        let audio = FtmAudio::default();
        let mut device = SawtoothDevice::default();
        let mut tone = playing_tone(ChannelCode::Vrc6Sawtooth, PeriodTable::Sawtooth);
        tone.out_duty = 1;
        device.write_to_sound(&mut tone, &audio);
        assert_eq!(device.sound.rate, (15 << 1) | 0x20);
        assert!(device.sound.gate);
        assert_eq!(device.max_period(), 0xFFF);
    }

    #[test]
    fn test_dpcm_note_starts_sample() {
        let builder = FtmAudioBuilder::new()
            .dpcm_sample("kick", vec![0xFF; 8])
            .instrument(
                0,
                FtmInstrument::new("drums", ChipType::Apu2A03).with_dpcm_key(
                    46,
                    DpcmKey {
                        sample: 0,
                        pitch: 15,
                        looping: false,
                        delta: Some(32),
                    },
                ),
            );
        let mut track = builder.new_track(4);
        track.push_section(&[]);
        let audio = builder.track(track).build().unwrap();

        let mut device = DpcmDevice::default();
        let mut tone = playing_tone(ChannelCode::Dpcm, PeriodTable::Ntsc);
        tone.set_instrument(0, &audio);
        device.write_to_sound(&mut tone, &audio);
        assert!(device.sound.is_playing());
        assert_eq!(device.sound.dac(), 32);
        assert_eq!(device.sound.rate_index, 15);

        tone.halt();
        device.write_to_sound(&mut tone, &audio);
        assert!(!device.sound.is_playing());
    }

    #[test]
    fn test_dpcm_dac_load() {
        let audio = FtmAudio::default();
        let mut device = DpcmDevice::default();
        let mut tone = ToneState::new(ChannelCode::Dpcm, PeriodTable::Ntsc, VibratoStyle::New);
        tone.dac = Some(0x40);
        device.write_to_sound(&mut tone, &audio);
        assert_eq!(device.sound.dac(), 0x40);
        assert!(tone.dac.is_none());
    }

    #[test]
    fn test_silent_device_has_no_generator() {
        let mut device = SilentDevice;
        assert!(device.generator().is_none());
        let mut edges: Vec<(u32, i32)> = Vec::new();
        device.process(1000, &mut edges);
        assert!(edges.is_empty());
        assert_eq!(device.level(), 0);
    }
}
