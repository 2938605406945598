//! Generator contract shared by every hardware voice
//!
//! This module defines the interface between a channel runtime (which decides
//! *what* a voice should play) and the oscillator that produces the waveform.

/// Sink for generator level changes
///
/// Generators report their raw output level whenever it changes, together
/// with the CPU cycle offset (from the start of the frame) at which the change
/// happened. Mixers decide how to turn those edges into samples.
pub trait SoundOutput {
    /// Record a new output level
    ///
    /// # Arguments
    ///
    /// * `value` - Raw generator level (chip specific range, e.g. 0-15 for a pulse)
    /// * `time` - CPU cycles elapsed since the start of the frame
    fn mix(&mut self, value: i32, time: u32);
}

/// Collects level changes, mostly useful for inspecting a generator
impl SoundOutput for Vec<(u32, i32)> {
    fn mix(&mut self, value: i32, time: u32) {
        self.push((time, value));
    }
}

/// Discards everything; used when a voice has no mixer channel
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl SoundOutput for NullOutput {
    fn mix(&mut self, _value: i32, _time: u32) {}
}

/// Common interface for NES voice generators
///
/// Synthesis parameters (period, volume, duty, gate, sweep, ...) are public
/// fields on each generator and are written by the channel runtime once per
/// frame. The generator then advances by the frame's CPU cycles.
///
/// Implementations must be deterministic: identical parameter writes and cycle
/// counts produce identical output.
///
/// # Example
///
/// ```
/// use nes_apu::SoundGenerator;
/// use nes_apu::generators::TriangleSound;
///
/// let mut tri = TriangleSound::new();
/// tri.period = 200;
/// tri.enabled = true;
///
/// let mut edges: Vec<(u32, i32)> = Vec::new();
/// tri.process(29_829, &mut edges);
/// tri.end_frame();
/// assert!(!edges.is_empty());
/// ```
pub trait SoundGenerator {
    /// Reset the generator to power-on state
    ///
    /// Clears all parameters and internal counters.
    fn reset(&mut self);

    /// Advance the generator
    ///
    /// # Arguments
    ///
    /// * `cycles` - CPU cycles to run
    /// * `out` - Receives every level change with its cycle offset
    fn process(&mut self, cycles: u32, out: &mut dyn SoundOutput);

    /// Finish the frame
    ///
    /// Rewinds the frame-local cycle clock so that the next frame's edges
    /// start at offset zero. Oscillator phase is kept.
    fn end_frame(&mut self);

    /// Current raw output level
    fn level(&self) -> i32;
}

/// Frame-local clock and edge bookkeeping embedded in every generator
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EdgeClock {
    /// Cycles elapsed in the current frame
    pub time: u32,
    /// Last level reported to the output
    pub last: i32,
}

impl EdgeClock {
    /// Report `value` if it differs from the last reported level
    #[inline]
    pub fn emit(&mut self, value: i32, out: &mut dyn SoundOutput) {
        if value != self.last {
            self.last = value;
            out.mix(value, self.time);
        }
    }

    pub fn reset(&mut self) {
        self.time = 0;
        self.last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_clock_only_reports_changes() {
        let mut clock = EdgeClock::default();
        let mut edges: Vec<(u32, i32)> = Vec::new();

        clock.emit(0, &mut edges);
        clock.time = 10;
        clock.emit(5, &mut edges);
        clock.time = 20;
        clock.emit(5, &mut edges);
        clock.time = 30;
        clock.emit(0, &mut edges);

        assert_eq!(edges, vec![(10, 5), (30, 0)]);
    }
}
