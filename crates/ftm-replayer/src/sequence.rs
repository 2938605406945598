//! Instrument envelope interpreter
//!
//! Steps the volume, arpeggio, pitch, hi-pitch and duty sequences of the
//! current instrument once per frame and exposes the result as plain output
//! fields read by the channel calculations.

use std::sync::Arc;

use crate::format::{ArpSetting, FtmSequence, SequenceKind};

/// Volume output when no volume sequence is active
pub const DEFAULT_SEQ_VOLUME: i32 = 15;

/// Duty output when no duty sequence is active
pub const NO_DUTY: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SlotState {
    #[default]
    Disabled,
    Running,
    Ended,
}

#[derive(Debug, Clone, Default)]
struct SequenceSlot {
    sequence: Option<Arc<FtmSequence>>,
    index: usize,
    state: SlotState,
}

impl SequenceSlot {
    fn load(&mut self, sequence: Option<Arc<FtmSequence>>) {
        self.state = if sequence.is_some() {
            SlotState::Running
        } else {
            SlotState::Disabled
        };
        self.sequence = sequence;
        self.index = 0;
    }

    fn restart(&mut self) {
        if self.sequence.is_some() {
            self.index = 0;
            self.state = SlotState::Running;
        }
    }

    fn release(&mut self) {
        let Some(seq) = self.sequence.as_ref() else {
            return;
        };
        if let Some(point) = seq.release_point {
            self.index = point + 1;
            self.state = if self.index < seq.len() {
                SlotState::Running
            } else {
                SlotState::Ended
            };
        }
    }

    /// Read the current step and advance; `None` once disabled or ended
    fn step(&mut self, released: bool) -> Option<i8> {
        if self.state != SlotState::Running {
            return None;
        }
        let seq = self.sequence.as_ref()?;
        let len = seq.len();
        if self.index >= len {
            self.state = SlotState::Ended;
            return None;
        }

        let value = seq.items[self.index];
        self.index += 1;

        let at_release = seq.release_point.map_or(false, |point| self.index == point + 1);
        if at_release || self.index >= len {
            let may_loop = !(released && seq.release_point.is_some());
            match seq.loop_point {
                Some(point) if may_loop && point < len => self.index = point,
                _ if self.index >= len => self.state = SlotState::Ended,
                // Hold on the release step until the note is released
                _ if !released => self.index -= 1,
                _ => {}
            }
        }
        Some(value)
    }
}

/// Per-channel sequence state and outputs
#[derive(Debug, Clone)]
pub struct SequenceHandler {
    slots: [SequenceSlot; 5],
    released: bool,

    /// Volume multiplier (0-15)
    pub volume: i32,
    /// One-frame note delta from a relative arpeggio
    pub delta_note: i32,
    /// Accumulated period offset from the pitch sequences
    pub period: i32,
    /// Duty selector, or [`NO_DUTY`]
    pub duty: i32,
    /// Arpeggio value for absolute and fixed modes
    pub arp: i32,
    /// Mode of the active arpeggio sequence
    pub arp_setting: ArpSetting,
}

impl SequenceHandler {
    /// Handler with no sequences loaded
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            released: false,
            volume: DEFAULT_SEQ_VOLUME,
            delta_note: 0,
            period: 0,
            duty: NO_DUTY,
            arp: 0,
            arp_setting: ArpSetting::Absolute,
        }
    }

    /// Replace the instrument's sequences
    ///
    /// A `None` slot disables that envelope and restores its default output.
    pub fn set_instrument(&mut self, sequences: [Option<Arc<FtmSequence>>; 5]) {
        for (kind, sequence) in SequenceKind::ALL.into_iter().zip(sequences) {
            if sequence.is_none() {
                self.reset_output(kind);
            } else if kind == SequenceKind::Arpeggio {
                self.arp_setting = sequence
                    .as_ref()
                    .map_or(ArpSetting::Absolute, |seq| seq.arp_setting);
            }
            self.slots[kind.index()].load(sequence);
        }
    }

    /// Restart every sequence for a new note
    pub fn start(&mut self) {
        self.released = false;
        self.period = 0;
        self.delta_note = 0;
        self.arp = 0;
        for slot in &mut self.slots {
            slot.restart();
        }
    }

    /// Jump every sequence past its release point
    pub fn release(&mut self) {
        self.released = true;
        for slot in &mut self.slots {
            slot.release();
        }
    }

    /// Whether [`SequenceHandler::release`] was called since the last start
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Whether a sequence of `kind` is loaded
    pub fn has(&self, kind: SequenceKind) -> bool {
        self.slots[kind.index()].sequence.is_some()
    }

    /// Whether the sequence of `kind` is still stepping
    pub fn is_running(&self, kind: SequenceKind) -> bool {
        self.slots[kind.index()].state == SlotState::Running
    }

    /// Advance every sequence by one frame
    pub fn update(&mut self) {
        self.delta_note = 0;
        for kind in SequenceKind::ALL {
            let Some(value) = self.slots[kind.index()].step(self.released) else {
                continue;
            };
            let value = value as i32;
            match kind {
                SequenceKind::Volume => self.volume = value.clamp(0, 15),
                SequenceKind::Arpeggio => match self.arp_setting {
                    ArpSetting::Relative => self.delta_note += value,
                    ArpSetting::Absolute | ArpSetting::Fixed => self.arp = value,
                },
                SequenceKind::Pitch => self.period += value,
                SequenceKind::HiPitch => self.period += value * 16,
                SequenceKind::Duty => self.duty = value,
            }
        }
    }

    /// Drop every sequence and restore default outputs
    pub fn clear(&mut self) {
        self.set_instrument(Default::default());
        self.released = false;
    }

    fn reset_output(&mut self, kind: SequenceKind) {
        match kind {
            SequenceKind::Volume => self.volume = DEFAULT_SEQ_VOLUME,
            SequenceKind::Arpeggio => {
                self.arp = 0;
                self.delta_note = 0;
                self.arp_setting = ArpSetting::Absolute;
            }
            SequenceKind::Pitch | SequenceKind::HiPitch => self.period = 0,
            SequenceKind::Duty => self.duty = NO_DUTY,
        }
    }
}

impl Default for SequenceHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_with(kind: SequenceKind, seq: FtmSequence) -> SequenceHandler {
        let mut slots: [Option<Arc<FtmSequence>>; 5] = Default::default();
        slots[kind.index()] = Some(Arc::new(seq));
        let mut handler = SequenceHandler::new();
        handler.set_instrument(slots);
        handler.start();
        handler
    }

    fn run_volume(handler: &mut SequenceHandler, frames: usize) -> Vec<i32> {
        (0..frames)
            .map(|_| {
                handler.update();
                handler.volume
            })
            .collect()
    }

    #[test]
    fn test_sequence_holds_last_value() {
        let mut h = handler_with(SequenceKind::Volume, FtmSequence::new(vec![15, 10, 5]));
        assert_eq!(run_volume(&mut h, 5), vec![15, 10, 5, 5, 5]);
        assert!(!h.is_running(SequenceKind::Volume));
    }

    #[test]
    fn test_sequence_loops() {
        let mut h = handler_with(
            SequenceKind::Volume,
            FtmSequence::new(vec![15, 10, 5]).with_loop(1),
        );
        assert_eq!(run_volume(&mut h, 6), vec![15, 10, 5, 10, 5, 10]);
    }

    #[test]
    fn test_release_point_waits_then_continues() {
        let mut h = handler_with(
            SequenceKind::Volume,
            FtmSequence::new(vec![15, 12, 8, 4, 0]).with_release(1),
        );
        assert_eq!(run_volume(&mut h, 4), vec![15, 12, 12, 12]);
        h.release();
        assert_eq!(run_volume(&mut h, 4), vec![8, 4, 0, 0]);
    }

    #[test]
    fn test_loop_before_release_stops_looping_after_release() {
        let mut h = handler_with(
            SequenceKind::Volume,
            FtmSequence::new(vec![9, 8, 7, 3]).with_loop(0).with_release(2),
        );
        assert_eq!(run_volume(&mut h, 4), vec![9, 8, 7, 9]);
        h.release();
        assert_eq!(run_volume(&mut h, 2), vec![3, 3]);
    }

    #[test]
    fn test_relative_arpeggio_is_one_frame_delta() {
        let mut h = handler_with(
            SequenceKind::Arpeggio,
            FtmSequence::new(vec![0, 2, 2]).with_setting(ArpSetting::Relative),
        );
        let deltas: Vec<i32> = (0..4)
            .map(|_| {
                h.update();
                h.delta_note
            })
            .collect();
        assert_eq!(deltas, vec![0, 2, 2, 0]);
    }

    #[test]
    fn test_pitch_accumulates() {
        let mut h = handler_with(SequenceKind::HiPitch, FtmSequence::new(vec![1, -2]));
        h.update();
        assert_eq!(h.period, 16);
        h.update();
        assert_eq!(h.period, -16);
        h.start();
        assert_eq!(h.period, 0);
    }

    #[test]
    fn test_missing_slot_restores_default() {
        let mut h = handler_with(SequenceKind::Duty, FtmSequence::new(vec![2]));
        h.update();
        assert_eq!(h.duty, 2);
        h.set_instrument(Default::default());
        assert_eq!(h.duty, NO_DUTY);
        assert_eq!(h.volume, DEFAULT_SEQ_VOLUME);
        h.update();
        assert_eq!(h.duty, NO_DUTY);
    }

    #[test]
    fn test_empty_sequence_ends_immediately() {
        let mut h = handler_with(SequenceKind::Volume, FtmSequence::new(vec![]));
        h.update();
        assert_eq!(h.volume, DEFAULT_SEQ_VOLUME);
        assert!(!h.is_running(SequenceKind::Volume));
    }
}
