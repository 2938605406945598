//! Mixer configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelCode;
use crate::{MixerError, Result};

/// Mixing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixerKind {
    /// Band-limited synthesis buffer (fast)
    #[default]
    Blip,
    /// Per-sample rendering with interceptor chain (flexible, slower)
    Xgm,
}

/// Settings of the band-limited mixer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlipConfig {
    /// High-pass cutoff applied on read (Hz); 0 disables it
    pub bass_freq: u32,
    /// Buffer capacity in frames
    pub buffer_frames: u32,
}

impl Default for BlipConfig {
    fn default() -> Self {
        Self {
            bass_freq: 30,
            buffer_frames: 2,
        }
    }
}

/// Settings of the per-sample mixer: which built-in interceptors start enabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XgmConfig {
    /// Echo unit
    pub echo: bool,
    /// DC filter
    pub dc_filter: bool,
    /// Low-pass filter
    pub low_pass: bool,
    /// Output compressor
    pub compressor: bool,
}

impl Default for XgmConfig {
    fn default() -> Self {
        Self {
            echo: true,
            dc_filter: true,
            low_pass: true,
            compressor: true,
        }
    }
}

/// Mixer configuration
///
/// # Example
///
/// ```
/// use nes_apu::mixer::{MixerConfig, MixerKind};
///
/// let config = MixerConfig {
///     kind: MixerKind::Xgm,
///     track_count: 2,
///     ..MixerConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Mixing strategy
    pub kind: MixerKind,
    /// Output tracks (1 = mono, 2 = stereo, ...)
    pub track_count: usize,
    /// Band-limited mixer settings
    pub blip: BlipConfig,
    /// Per-sample mixer settings
    pub xgm: XgmConfig,
    /// Per-voice gain; voices not listed play at 1.0
    pub levels: BTreeMap<ChannelCode, f32>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            kind: MixerKind::default(),
            track_count: 1,
            blip: BlipConfig::default(),
            xgm: XgmConfig::default(),
            levels: BTreeMap::new(),
        }
    }
}

impl MixerConfig {
    /// Check the configuration before a mixer is built from it
    pub fn validate(&self) -> Result<()> {
        if self.track_count == 0 {
            return Err(MixerError::InvalidTrackCount(self.track_count));
        }
        if self.blip.buffer_frames == 0 {
            return Err(MixerError::ConfigError(
                "blip buffer must hold at least one frame".to_string(),
            ));
        }
        if let Some((code, level)) = self
            .levels
            .iter()
            .find(|(_, level)| !level.is_finite() || **level < 0.0)
        {
            return Err(MixerError::ConfigError(format!(
                "level for channel {code} must be a non-negative number, got {level}"
            )));
        }
        Ok(())
    }

    /// Gain for a voice
    pub fn level_of(&self, code: ChannelCode) -> f32 {
        self.levels.get(&code).copied().unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MixerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kind, MixerKind::Blip);
        assert_eq!(config.level_of(ChannelCode::Pulse1), 1.0);
    }

    #[test]
    fn test_zero_tracks_rejected() {
        let config = MixerConfig {
            track_count: 0,
            ..MixerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MixerError::InvalidTrackCount(0))
        ));
    }

    #[test]
    fn test_negative_level_rejected() {
        let mut config = MixerConfig::default();
        config.levels.insert(ChannelCode::Noise, -0.5);
        assert!(matches!(config.validate(), Err(MixerError::ConfigError(_))));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{ "kind": "xgm", "track_count": 2, "xgm": { "echo": false }, "levels": { "Dpcm": 0.5 } }"#;
        let config: MixerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind, MixerKind::Xgm);
        assert_eq!(config.track_count, 2);
        assert!(!config.xgm.echo);
        assert!(config.xgm.dc_filter);
        assert_eq!(config.level_of(ChannelCode::Dpcm), 0.5);
        assert_eq!(config.blip, BlipConfig::default());
    }
}
