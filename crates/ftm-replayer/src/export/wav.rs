//! WAV file export

use std::path::Path;

use log::info;

use super::{render_frames, ExportConfig};
use crate::error::Result;
use crate::renderer::FamiTrackerRenderer;

/// Render `frames` engine frames into a 16-bit WAV file
///
/// The file takes the renderer's sample rate and track count.
pub fn export_to_wav<P: AsRef<Path>>(
    renderer: &mut FamiTrackerRenderer,
    output_path: P,
    frames: usize,
) -> Result<()> {
    export_to_wav_with_config(renderer, output_path, frames, &ExportConfig::default())
}

/// [`export_to_wav`] with post-processing options
pub fn export_to_wav_with_config<P: AsRef<Path>>(
    renderer: &mut FamiTrackerRenderer,
    output_path: P,
    frames: usize,
    config: &ExportConfig,
) -> Result<()> {
    let samples = render_frames(renderer, frames, config)?;
    let spec = hound::WavSpec {
        channels: renderer.track_count() as u16,
        sample_rate: renderer.config().sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let path = output_path.as_ref();
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    info!("wrote {} ({} samples)", path.display(), samples.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FtmAudioBuilder, FtmNote};
    use crate::RendererConfig;
    use std::sync::Arc;

    #[test]
    fn test_export_writes_readable_wav() {
        let builder = FtmAudioBuilder::new();
        let mut track = builder.new_track(8);
        track.push_section(&[0]);
        track.set_note(0, 0, 0, FtmNote::pitch(46));
        let audio = Arc::new(builder.track(track).build().unwrap());

        let mut renderer = FamiTrackerRenderer::new(RendererConfig::default()).unwrap();
        renderer.ready(audio).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wav");
        export_to_wav(&mut renderer, &path, 10).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 48_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 8000);
    }
}
