//! RC low-pass filter

use super::SoundInterceptor;
use crate::constants::DEFAULT_SAMPLE_RATE;

/// First-order RC low-pass filter
///
/// `r` is in ohms and `c` in units of 0.1 nF. A capacitance of zero turns the
/// stage into a pass-through.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    r: u32,
    c: u32,
    rate: u32,
    alpha: f64,
    out: f64,
    enabled: bool,
}

impl LowPassFilter {
    /// Create a filter at the default sample rate
    pub fn new(r: u32, c: u32) -> Self {
        let mut filter = Self {
            r,
            c,
            rate: DEFAULT_SAMPLE_RATE,
            alpha: 1.0,
            out: 0.0,
            enabled: true,
        };
        filter.recalc();
        filter
    }

    /// Change resistance and capacitance
    pub fn set_param(&mut self, r: u32, c: u32) {
        self.r = r;
        self.c = c;
        self.recalc();
    }

    fn recalc(&mut self) {
        if self.r == 0 || self.c == 0 || self.rate == 0 {
            self.alpha = 1.0;
            return;
        }
        let rc = self.r as f64 * self.c as f64 * 1e-10;
        self.alpha = 1.0 - (-1.0 / (rc * self.rate as f64)).exp();
    }
}

impl SoundInterceptor for LowPassFilter {
    #[inline]
    fn execute(&mut self, value: i32, _time: u32) -> i32 {
        self.out += self.alpha * (value as f64 - self.out);
        self.out.round() as i32
    }

    fn reset(&mut self) {
        self.out = 0.0;
    }

    fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
        self.recalc();
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
