//! Offline rendering and export
//!
//! [`render_frames`] captures a number of engine frames into memory with
//! optional post-processing. With the `export-wav` feature the result can be
//! written straight to a WAV file.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "export-wav")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ftm_replayer::export::export_to_wav;
//! # use std::sync::Arc;
//! # use ftm_replayer::{FamiTrackerRenderer, FtmAudio, RendererConfig};
//! # let audio: Arc<FtmAudio> = unimplemented!();
//!
//! let mut renderer = FamiTrackerRenderer::new(RendererConfig::default())?;
//! renderer.ready(audio)?;
//! export_to_wav(&mut renderer, "song.wav", 60 * 120)?; // two minutes at 60 Hz
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "export-wav"))]
//! # fn main() {}
//! ```

#[cfg(feature = "export-wav")]
mod wav;
#[cfg(feature = "export-wav")]
pub use wav::*;

use log::debug;

use crate::error::Result;
use crate::renderer::FamiTrackerRenderer;

/// Export post-processing options
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Scale the output so its peak sits just below full scale
    pub normalize: bool,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_duration: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            normalize: false,
            fade_out_duration: 0.0,
        }
    }
}

impl ExportConfig {
    /// Enable normalization
    pub fn normalize(mut self, enable: bool) -> Self {
        self.normalize = enable;
        self
    }

    /// Add a fade out at the end
    pub fn fade_out(mut self, duration_seconds: f32) -> Self {
        self.fade_out_duration = duration_seconds;
        self
    }
}

/// Render `frames` engine frames into interleaved samples
///
/// Samples buffered in the renderer from earlier calls are dropped first, so
/// the capture starts on a frame boundary.
pub fn render_frames(
    renderer: &mut FamiTrackerRenderer,
    frames: usize,
    config: &ExportConfig,
) -> Result<Vec<i16>> {
    renderer.skip(0)?;

    let tracks = renderer.track_count().max(1);
    let mut buf = vec![0i16; 4096 * tracks];
    let mut samples = Vec::new();
    for _ in 0..frames {
        loop {
            let written = renderer.render_one_frame(&mut buf)?;
            samples.extend_from_slice(&buf[..written]);
            if renderer.remain() == 0 {
                break;
            }
        }
    }
    debug!(
        "captured {} frames: {} samples x {} track(s)",
        frames,
        samples.len() / tracks,
        tracks
    );

    if config.normalize {
        normalize_samples(&mut samples);
    }
    if config.fade_out_duration > 0.0 {
        let fade = (config.fade_out_duration * renderer.config().sample_rate as f32) as usize;
        apply_fade_out(&mut samples, fade, tracks);
    }
    Ok(samples)
}

/// Scale so the peak is 95% of full scale
fn normalize_samples(samples: &mut [i16]) {
    let peak = samples
        .iter()
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0);
    if peak == 0 {
        return;
    }
    let scale = 0.95 * i16::MAX as f32 / peak as f32;
    for sample in samples.iter_mut() {
        *sample = (*sample as f32 * scale).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
}

/// Linear fade over the last `fade_frames` sample frames
fn apply_fade_out(samples: &mut [i16], fade_frames: usize, tracks: usize) {
    let total = samples.len() / tracks;
    if fade_frames == 0 || total == 0 {
        return;
    }
    let start = total.saturating_sub(fade_frames);
    let length = (total - start) as f32;
    for (i, frame) in samples.chunks_exact_mut(tracks).enumerate().skip(start) {
        let gain = 1.0 - (i - start) as f32 / length;
        for sample in frame {
            *sample = (*sample as f32 * gain) as i16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_samples() {
        let mut samples = vec![1000i16, -2000, 500];
        normalize_samples(&mut samples);
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!((31_100..=31_130).contains(&peak));
        assert!(samples[1] < 0);

        let mut silent = vec![0i16; 4];
        normalize_samples(&mut silent);
        assert_eq!(silent, vec![0; 4]);
    }

    #[test]
    fn test_fade_out_reaches_silence_per_frame() {
        let mut samples = vec![1000i16; 20];
        apply_fade_out(&mut samples, 5, 2);
        assert_eq!(&samples[..10], &[1000; 10]);
        // Both tracks of a sample frame get the same gain
        assert_eq!(samples[10], samples[11]);
        assert_eq!(samples[10], 1000);
        assert!(samples[18] < samples[16]);
        assert!((199..=200).contains(&samples[18]));
    }
}
