//! Multi-tap echo

use super::SoundInterceptor;
use crate::constants::DEFAULT_SAMPLE_RATE;

/// Three-tap feed-forward echo
///
/// Adds the input delayed by 1/16, 1/8 and 3/16 of a second, attenuated by
/// 1/4, 1/8 and 1/16.
#[derive(Debug, Clone)]
pub struct EchoUnit {
    history: Vec<i32>,
    mask: usize,
    index: usize,
    taps: [usize; 3],
    enabled: bool,
}

impl EchoUnit {
    /// Create an echo unit at the default sample rate
    pub fn new() -> Self {
        let mut echo = Self {
            history: Vec::new(),
            mask: 0,
            index: 0,
            taps: [0; 3],
            enabled: true,
        };
        echo.set_rate(DEFAULT_SAMPLE_RATE);
        echo
    }
}

impl Default for EchoUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundInterceptor for EchoUnit {
    #[inline]
    fn execute(&mut self, value: i32, _time: u32) -> i32 {
        self.history[self.index] = value;
        let at = |delay: usize| (self.index + self.history.len() - delay) & self.mask;

        let echo = (self.history[at(self.taps[0])] >> 2)
            + (self.history[at(self.taps[1])] >> 3)
            + (self.history[at(self.taps[2])] >> 4);
        self.index = (self.index + 1) & self.mask;
        value + echo
    }

    fn reset(&mut self) {
        self.history.fill(0);
        self.index = 0;
    }

    fn set_rate(&mut self, rate: u32) {
        let rate = rate.max(16) as usize;
        self.taps = [rate / 16, rate / 8, rate * 3 / 16];
        let size = (self.taps[2] + 1).next_power_of_two();
        self.history = vec![0; size];
        self.mask = size - 1;
        self.index = 0;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_taps() {
        let mut echo = EchoUnit::new();
        echo.set_rate(1600);

        let mut out = vec![echo.execute(1600, 0)];
        for _ in 1..400 {
            out.push(echo.execute(0, 0));
        }

        assert_eq!(out[0], 1600);
        assert_eq!(out[100], 400);
        assert_eq!(out[200], 200);
        assert_eq!(out[300], 100);
        assert_eq!(out.iter().filter(|&&v| v != 0).count(), 4);
    }

    #[test]
    fn test_echo_reset_clears_history() {
        let mut echo = EchoUnit::new();
        echo.set_rate(1600);
        echo.execute(1000, 0);
        echo.reset();
        for _ in 0..400 {
            assert_eq!(echo.execute(0, 0), 0);
        }
    }
}
