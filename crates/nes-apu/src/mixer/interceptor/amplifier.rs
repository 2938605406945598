//! Gain stage with limiting

use super::SoundInterceptor;

const FULL_SCALE: i64 = 32767;

/// Amplifier
///
/// Scales by `volume` percent, then limits to `limit` percent of full scale.
/// With a negative knee the limit is a hard clip; otherwise the last `knee`
/// percent below the limit is a soft transition.
#[derive(Debug, Clone)]
pub struct Amplifier {
    volume: i32,
    limit: i64,
    knee: i64,
    enabled: bool,
}

impl Amplifier {
    /// Unity gain with a hard clip at full scale
    pub fn new() -> Self {
        Self {
            volume: 100,
            limit: FULL_SCALE,
            knee: -1,
            enabled: true,
        }
    }

    /// Gain in percent
    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume;
    }

    /// Limit and knee, both in percent of full scale
    pub fn set_compress(&mut self, limit: i32, knee: i32) {
        self.limit = FULL_SCALE * limit.max(0) as i64 / 100;
        self.knee = if knee < 0 {
            -1
        } else {
            FULL_SCALE * knee as i64 / 100
        };
    }

    fn shape(&self, magnitude: i64) -> i64 {
        if self.knee <= 0 {
            return magnitude.min(self.limit);
        }
        let start = (self.limit - self.knee).max(0);
        if magnitude <= start {
            return magnitude;
        }
        // Halve the slope through the knee, then clip
        (start + (magnitude - start) / 2).min(self.limit)
    }
}

impl Default for Amplifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundInterceptor for Amplifier {
    #[inline]
    fn execute(&mut self, value: i32, _time: u32) -> i32 {
        let scaled = value as i64 * self.volume as i64 / 100;
        let shaped = self.shape(scaled.abs());
        (if scaled < 0 { -shaped } else { shaped }) as i32
    }

    fn reset(&mut self) {}

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
    fn test_hard_clip() {
        let mut amp = Amplifier::new();
        amp.set_compress(100, -1);
        assert_eq!(amp.execute(1000, 0), 1000);
        assert_eq!(amp.execute(40_000, 0), 32_767);
        assert_eq!(amp.execute(-40_000, 0), -32_767);
    }

    #[test]
    fn test_volume_percent() {
        let mut amp = Amplifier::new();
        amp.set_volume(50);
        assert_eq!(amp.execute(1000, 0), 500);
        assert_eq!(amp.execute(-1000, 0), -500);
    }

    #[test]
    fn test_soft_knee() {
        let mut amp = Amplifier::new();
        amp.set_compress(50, 10);
        let start = FULL_SCALE * 50 / 100 - FULL_SCALE * 10 / 100;
        assert_eq!(amp.execute(start as i32, 0) as i64, start);
        assert_eq!(amp.execute((start + 1000) as i32, 0) as i64, start + 500);
        assert_eq!(amp.execute(32_000, 0) as i64, FULL_SCALE * 50 / 100);
    }
}
