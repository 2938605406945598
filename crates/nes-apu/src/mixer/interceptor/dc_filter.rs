//! DC blocking filter
//!
//! The summed chip output sits on a positive offset (every loudness curve is
//! non-negative). This RC high-pass removes it before the final stages.

use super::SoundInterceptor;
use crate::constants::DEFAULT_SAMPLE_RATE;

/// First-order RC high-pass filter
///
/// `r` is in ohms and `c` in microfarads.
#[derive(Clone)]
pub struct DcFilter {
    r: u32,
    c: u32,
    rate: u32,
    /// Feedback coefficient
    a: f64,
    /// Previous input
    last_in: f64,
    /// Previous output
    out: f64,
    enabled: bool,
}

impl DcFilter {
    /// Create a DC filter at the default sample rate
    pub fn new(r: u32, c: u32) -> Self {
        let mut filter = Self {
            r,
            c,
            rate: DEFAULT_SAMPLE_RATE,
            a: 1.0,
            last_in: 0.0,
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
            self.a = 1.0;
            return;
        }
        let rc = self.r as f64 * self.c as f64 * 1e-6;
        self.a = rc / (rc + 1.0 / self.rate as f64);
    }
}

impl SoundInterceptor for DcFilter {
    #[inline]
    fn execute(&mut self, value: i32, _time: u32) -> i32 {
        let x = value as f64;
        self.out = self.a * (self.out + x - self.last_in);
        self.last_in = x;
        self.out.round() as i32
    }

    fn reset(&mut self) {
        self.last_in = 0.0;
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

impl std::fmt::Debug for DcFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DcFilter")
            .field("r", &self.r)
            .field("c", &self.c)
            .field("rate", &self.rate)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_filter_removes_offset() {
        let mut filter = DcFilter::new(270, 164);

        // One second of constant input
        let mut output = 0;
        for _ in 0..DEFAULT_SAMPLE_RATE {
            output = filter.execute(8000, 0);
        }
        assert!(
            output.abs() < 10,
            "DC filter should remove constant offset, got {output}"
        );
    }

    #[test]
    fn test_dc_filter_preserves_ac() {
        let mut filter = DcFilter::new(270, 164);
        for _ in 0..DEFAULT_SAMPLE_RATE {
            filter.execute(500, 0);
        }

        let output = filter.execute(1500, 0);
        assert!(output > 900, "DC filter should pass AC component, got {output}");
    }

    #[test]
    fn test_dc_filter_reset() {
        let mut filter = DcFilter::new(270, 164);
        for i in 0..100 {
            filter.execute(i * 100, 0);
        }
        filter.reset();
        assert_eq!(filter.execute(0, 0), 0);
    }
}
