//! Per-voice timeline of the per-sample mixer

use crate::channel::ChannelCode;
use crate::mixer::curves::{curve_for, LoudnessCurve};

/// Level changes of one voice during the current frame
///
/// Rendering asks for the average level over consecutive cycle spans, so a
/// level held for a third of a sample contributes a third of its value.
#[derive(Debug, Clone)]
pub(crate) struct XgmAudioChannel {
    pub code: ChannelCode,
    pub level: f32,
    curve: LoudnessCurve,
    /// (cycle offset, raw level), in arrival order
    events: Vec<(u32, i32)>,
    cursor: usize,
    /// Level in effect at the render position
    current: i32,
}

impl XgmAudioChannel {
    pub fn new(code: ChannelCode, level: f32) -> Self {
        Self {
            code,
            level,
            curve: curve_for(code),
            events: Vec::new(),
            cursor: 0,
            current: 0,
        }
    }

    #[inline]
    pub fn mix(&mut self, value: i32, time: u32) {
        self.events.push((time, value));
    }

    /// Reserve room for a frame's worth of edges
    pub fn check_capacity(&mut self, cycles: u32) {
        let wanted = (cycles as usize / 64).max(16);
        if self.events.capacity() < wanted {
            self.events.reserve(wanted - self.events.len());
        }
    }

    pub fn before_render(&mut self) {
        self.cursor = 0;
    }

    /// Average raw level over `[from, to)`, advancing the render position
    pub fn average(&mut self, from: u32, to: u32) -> f64 {
        let mut value = self.current;
        let mut at = from;
        let mut acc = 0i64;

        while let Some(&(time, next)) = self.events.get(self.cursor) {
            if time >= to {
                break;
            }
            let time = time.max(at);
            acc += value as i64 * (time - at) as i64;
            at = time;
            value = next;
            self.cursor += 1;
        }
        self.current = value;

        if to <= from {
            return value as f64;
        }
        acc += value as i64 * (to - at) as i64;
        acc as f64 / (to - from) as f64
    }

    /// Curve-shaped amplitude for a span
    #[inline]
    pub fn render(&mut self, from: u32, to: u32) -> f64 {
        let raw = self.average(from, to);
        (self.curve)(raw) * self.level as f64
    }

    /// Apply edges past the last span and forget the frame
    pub fn after_render(&mut self) {
        if let Some(&(_, last)) = self.events[self.cursor.min(self.events.len())..].last() {
            self.current = last;
        }
        self.events.clear();
        self.cursor = 0;
    }

    pub fn reset(&mut self) {
        self.events.clear();
        self.cursor = 0;
        self.current = 0;
    }
}
