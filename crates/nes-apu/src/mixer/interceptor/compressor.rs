//! Threshold compressor

use super::SoundInterceptor;

const FULL_SCALE: f64 = 32767.0;

/// Output compressor
///
/// Above the threshold the excess is divided by `ratio`; the result is then
/// limited to the ceiling. Levels are fractions of 16-bit full scale.
#[derive(Debug, Clone)]
pub struct Compressor {
    limit: f64,
    threshold: f64,
    ratio: f64,
    enabled: bool,
}

impl Compressor {
    /// Create a compressor
    ///
    /// # Arguments
    ///
    /// * `level` - Output ceiling (1.0 = full scale)
    /// * `threshold` - Start of compression (1.0 = full scale)
    /// * `ratio` - Compression ratio (1.0 = none)
    pub fn new(level: f64, threshold: f64, ratio: f64) -> Self {
        let mut compressor = Self {
            limit: FULL_SCALE,
            threshold: FULL_SCALE,
            ratio: 1.0,
            enabled: true,
        };
        compressor.set_param(level, threshold, ratio);
        compressor
    }

    /// Change ceiling, threshold and ratio
    pub fn set_param(&mut self, level: f64, threshold: f64, ratio: f64) {
        self.limit = FULL_SCALE * level.max(0.0);
        self.threshold = FULL_SCALE * threshold.max(0.0);
        self.ratio = if ratio >= 1.0 { ratio } else { 1.0 };
    }
}

impl SoundInterceptor for Compressor {
    #[inline]
    fn execute(&mut self, value: i32, _time: u32) -> i32 {
        let magnitude = (value as f64).abs();
        let mut shaped = if magnitude > self.threshold {
            self.threshold + (magnitude - self.threshold) / self.ratio
        } else {
            magnitude
        };
        if shaped > self.limit {
            shaped = self.limit;
        }
        (shaped.copysign(value as f64)) as i32
    }

    fn reset(&mut self) {}

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
