//! Renderer configuration

use nes_apu::mixer::MixerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{FtmError, Result};

/// Default output sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Slowest accepted playback speed factor
pub const MIN_SPEED: f32 = 0.1;

/// Fastest accepted playback speed factor
pub const MAX_SPEED: f32 = 10.0;

/// Settings of a [`FamiTrackerRenderer`](crate::FamiTrackerRenderer)
///
/// Every field has a default, so a JSON document only needs to list what it
/// changes:
///
/// ```
/// use ftm_replayer::RendererConfig;
/// use nes_apu::mixer::MixerKind;
///
/// let config = RendererConfig::from_json(r#"{ "speed": 1.5, "mixer": { "kind": "xgm" } }"#)?;
/// assert_eq!(config.sample_rate, 48_000);
/// assert_eq!(config.mixer.kind, MixerKind::Xgm);
/// # Ok::<(), ftm_replayer::FtmError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Output sample rate (Hz)
    pub sample_rate: u32,
    /// Playback speed factor; 2.0 plays twice as fast
    pub speed: f32,
    /// Mixer settings
    pub mixer: MixerConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            speed: 1.0,
            mixer: MixerConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration before a renderer is built from it
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(FtmError::InvalidConfig(
                "sample rate must be positive".to_string(),
            ));
        }
        check_speed(self.speed)?;
        self.mixer.validate()?;
        Ok(())
    }
}

/// Reject speed factors outside [`MIN_SPEED`]..=[`MAX_SPEED`] (NaN included)
pub(crate) fn check_speed(speed: f32) -> Result<f32> {
    if (MIN_SPEED..=MAX_SPEED).contains(&speed) {
        Ok(speed)
    } else {
        Err(FtmError::InvalidSpeed(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nes_apu::mixer::MixerKind;

    #[test]
    fn test_default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mixer.kind, MixerKind::Blip);
    }

    #[test]
    fn test_speed_bounds() {
        assert!(check_speed(0.1).is_ok());
        assert!(check_speed(10.0).is_ok());
        assert!(matches!(check_speed(0.05), Err(FtmError::InvalidSpeed(_))));
        assert!(matches!(check_speed(10.5), Err(FtmError::InvalidSpeed(_))));
        assert!(check_speed(f32::NAN).is_err());
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let config = RendererConfig {
            sample_rate: 0,
            ..RendererConfig::default()
        };
        assert!(matches!(config.validate(), Err(FtmError::InvalidConfig(_))));

        let mut config = RendererConfig::default();
        config.mixer.track_count = 0;
        assert!(matches!(config.validate(), Err(FtmError::Mixer(_))));

        assert!(matches!(
            RendererConfig::from_json(r#"{ "speed": 20.0 }"#),
            Err(FtmError::InvalidSpeed(_))
        ));
        assert!(matches!(
            RendererConfig::from_json("{ not json"),
            Err(FtmError::Json(_))
        ));
    }

    #[test]
    fn test_json_round_trip_keeps_levels() {
        let mut config = RendererConfig::default();
        config.sample_rate = 44_100;
        config.mixer.levels.insert(nes_apu::ChannelCode::Triangle, 0.75);
        let back = RendererConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
