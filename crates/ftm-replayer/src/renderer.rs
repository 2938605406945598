//! PCM renderer
//!
//! Drives the executor frame by frame and turns each frame into interleaved
//! 16-bit samples. A frame is rendered whole; whatever the caller's buffer
//! cannot take stays buffered for the next call.
//!
//! The number of samples per frame is spread over a second with a
//! [`CycleCounter`], so `sample_rate / speed` samples come out of every
//! `frame_rate` frames with no drift.

use std::sync::Arc;

use log::debug;
use nes_apu::mixer::{create_mixer, InterceptorKind, SoundMixer};
use nes_apu::{ChannelCode, CycleCounter, FrameParameter};

use crate::config::{check_speed, RendererConfig};
use crate::error::{FtmError, Result};
use crate::executor::FamiTrackerExecutor;
use crate::format::FtmAudio;

/// FamiTracker renderer
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ftm_replayer::{FamiTrackerRenderer, FtmAudioBuilder, FtmNote, RendererConfig};
///
/// let builder = FtmAudioBuilder::new();
/// let mut track = builder.new_track(16);
/// track.push_section(&[0]);
/// track.set_note(0, 0, 0, FtmNote::pitch(46));
/// let audio = Arc::new(builder.track(track).build()?);
///
/// let mut renderer = FamiTrackerRenderer::new(RendererConfig::default())?;
/// renderer.ready(audio)?;
///
/// let mut pcm = vec![0i16; 4800];
/// let written = renderer.render(&mut pcm)?;
/// assert_eq!(written, pcm.len());
/// # Ok::<(), ftm_replayer::FtmError>(())
/// ```
pub struct FamiTrackerRenderer {
    config: RendererConfig,
    executor: Option<FamiTrackerExecutor>,
    mixer: Box<dyn SoundMixer>,
    param: FrameParameter,
    counter: CycleCounter,
    speed: f32,

    /// Samples of the last frame, interleaved by track
    data: Vec<i16>,
    /// Read position in `data`
    offset: usize,
    /// Valid values in `data`
    length: usize,
}

impl FamiTrackerRenderer {
    /// Build a renderer; nothing plays until [`Self::ready`]
    ///
    /// # Errors
    ///
    /// Rejects invalid configurations before anything is allocated.
    pub fn new(config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let param = FrameParameter::ntsc(config.sample_rate);
        let mixer = create_mixer(&config.mixer, &param)?;
        let speed = config.speed;
        debug!(
            "renderer: {} Hz, speed {}, {:?} mixer",
            config.sample_rate, speed, config.mixer.kind
        );
        Ok(Self {
            config,
            executor: None,
            mixer,
            param,
            counter: CycleCounter::new(),
            speed,
            data: Vec::new(),
            offset: 0,
            length: 0,
        })
    }

    /// Load a document and start at the beginning of its first track
    pub fn ready(&mut self, audio: Arc<FtmAudio>) -> Result<()> {
        match self.executor.as_mut() {
            Some(executor) => executor.ready(audio, 0, 0)?,
            None => self.executor = Some(FamiTrackerExecutor::new(audio)?),
        }
        self.attach_mixer();
        Ok(())
    }

    /// Restart the loaded document at the beginning of `track`
    pub fn ready_track(&mut self, track: usize) -> Result<()> {
        self.ready_section(track, 0)
    }

    /// Restart the loaded document at `(track, section)`
    ///
    /// Channels and the mixer are reset; buffered samples are dropped.
    pub fn ready_section(&mut self, track: usize, section: usize) -> Result<()> {
        let executor = self.executor.as_mut().ok_or(FtmError::NotReady)?;
        executor.ready_track(track, section)?;
        self.mixer.reset();
        self.reset_counter();
        self.offset = 0;
        self.length = 0;
        Ok(())
    }

    /// Move to `(track, section)` keeping notes, effects and mixer state
    pub fn switch_to(&mut self, track: usize, section: usize) -> Result<()> {
        self.executor
            .as_mut()
            .ok_or(FtmError::NotReady)?
            .switch_to(track, section)
    }

    fn attach_mixer(&mut self) {
        let Some(executor) = self.executor.as_mut() else {
            return;
        };
        let (frame_rate, clock) = {
            let audio = executor.audio();
            (audio.frame_rate(), audio.clock())
        };
        self.param = FrameParameter::new(self.config.sample_rate, frame_rate, clock);

        self.mixer.detach_all();
        self.mixer.reset();
        executor.attach_mixer(self.mixer.as_mut());
        for (&code, &level) in &self.config.mixer.levels {
            if let Some(id) = executor.mixer_id(code) {
                self.mixer.set_level(id, level);
            }
        }

        self.reset_counter();
        self.offset = 0;
        self.length = 0;
    }

    fn reset_counter(&mut self) {
        let samples_per_second = (self.config.sample_rate as f32 / self.speed) as u32;
        self.counter.set_param(samples_per_second, self.param.frame_rate);
    }

    /// Render one frame into the internal buffer
    fn render_frame(&mut self) -> Result<()> {
        let executor = self.executor.as_mut().ok_or(FtmError::NotReady)?;

        let samples = self.counter.tick() as usize;
        self.param.sample_in_cur_frame = samples;
        let tracks = self.mixer.track_count().max(1);
        let needed = samples * tracks;
        if self.data.len() < needed || self.data.len() - needed > 16 * tracks {
            self.data = vec![0; needed + 8 * tracks];
        } else {
            self.data.fill(0);
        }

        executor.tick();
        self.mixer.ready_buffer(&self.param);
        executor.process_sounds(self.mixer.as_mut(), self.param.freq_per_frame);
        self.mixer.finish_buffer(&self.param);

        self.length = self.mixer.read_buffer(&mut self.data[..needed]);
        self.offset = 0;
        Ok(())
    }

    fn fill(&mut self, buf: &mut [i16]) -> usize {
        let count = buf.len().min(self.remain());
        buf[..count].copy_from_slice(&self.data[self.offset..self.offset + count]);
        self.offset += count;
        count
    }

    fn fill_bytes(&mut self, buf: &mut [u8]) -> usize {
        let count = (buf.len() / 2).min(self.remain());
        let samples = &self.data[self.offset..self.offset + count];
        for (chunk, sample) in buf.chunks_exact_mut(2).zip(samples) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
        self.offset += count;
        count * 2
    }

    /// Fill `buf` with interleaved samples
    ///
    /// Buffered samples go first; new frames are rendered until the buffer is
    /// full or the song finishes. A finished song renders one more frame per
    /// call, so callers can keep playing past the end.
    ///
    /// # Returns
    ///
    /// Values written
    pub fn render(&mut self, buf: &mut [i16]) -> Result<usize> {
        if self.executor.is_none() {
            return Err(FtmError::NotReady);
        }
        let mut written = self.fill(buf);
        while written < buf.len() {
            self.render_frame()?;
            written += self.fill(&mut buf[written..]);
            if self.is_finished() {
                break;
            }
        }
        Ok(written)
    }

    /// Like [`Self::render`], as little-endian bytes
    ///
    /// An odd trailing byte is left untouched.
    ///
    /// # Returns
    ///
    /// Bytes written
    pub fn render_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.executor.is_none() {
            return Err(FtmError::NotReady);
        }
        let len = buf.len() / 2 * 2;
        let mut written = self.fill_bytes(&mut buf[..len]);
        while written < len {
            self.render_frame()?;
            written += self.fill_bytes(&mut buf[written..len]);
            if self.is_finished() {
                break;
            }
        }
        Ok(written)
    }

    /// Hand out buffered samples, or render exactly one frame if none are left
    pub fn render_one_frame(&mut self, buf: &mut [i16]) -> Result<usize> {
        if self.executor.is_none() {
            return Err(FtmError::NotReady);
        }
        let mut written = self.fill(buf);
        if written == 0 {
            self.render_frame()?;
            written = self.fill(buf);
        }
        Ok(written)
    }

    /// Like [`Self::render_one_frame`], as little-endian bytes
    pub fn render_one_frame_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.executor.is_none() {
            return Err(FtmError::NotReady);
        }
        let mut written = self.fill_bytes(buf);
        if written == 0 {
            self.render_frame()?;
            written = self.fill_bytes(buf);
        }
        Ok(written)
    }

    /// Play `frames` frames without output, then drop anything buffered
    pub fn skip(&mut self, frames: usize) -> Result<()> {
        if self.executor.is_none() {
            return Err(FtmError::NotReady);
        }
        for _ in 0..frames {
            self.render_frame()?;
        }
        self.offset = 0;
        self.length = 0;
        Ok(())
    }

    /// Samples rendered but not yet handed out
    pub fn remain(&self) -> usize {
        self.length - self.offset
    }

    /// Set the playback speed factor
    ///
    /// # Errors
    ///
    /// [`FtmError::InvalidSpeed`] outside 0.1..=10; the speed is unchanged.
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        self.speed = check_speed(speed)?;
        self.reset_counter();
        Ok(())
    }

    /// Playback speed factor
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Back to normal speed
    pub fn reset_speed(&mut self) {
        self.speed = 1.0;
        self.reset_counter();
    }

    /// Executor, once a document is loaded
    pub fn executor(&self) -> Option<&FamiTrackerExecutor> {
        self.executor.as_ref()
    }

    /// Configuration the renderer was built with, channel levels included
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Whether the song looped, jumped backward or halted; `false` before
    /// a document is loaded
    pub fn is_finished(&self) -> bool {
        self.executor
            .as_ref()
            .is_some_and(FamiTrackerExecutor::is_finished)
    }

    /// Track being played (0 before a document is loaded)
    pub fn current_track(&self) -> usize {
        self.executor.as_ref().map_or(0, FamiTrackerExecutor::current_track)
    }

    /// Section being played (0 before a document is loaded)
    pub fn current_section(&self) -> usize {
        self.executor.as_ref().map_or(0, FamiTrackerExecutor::current_section)
    }

    /// Row being played (0 before a document is loaded)
    pub fn current_row(&self) -> usize {
        self.executor.as_ref().map_or(0, FamiTrackerExecutor::current_row)
    }

    /// Whether the last frame started a new row
    pub fn current_row_run_out(&self) -> bool {
        self.executor
            .as_ref()
            .is_some_and(FamiTrackerExecutor::current_row_run_out)
    }

    /// Section of the next row
    pub fn next_section(&self) -> usize {
        self.executor.as_ref().map_or(0, FamiTrackerExecutor::next_section)
    }

    /// Next row
    pub fn next_row(&self) -> usize {
        self.executor.as_ref().map_or(0, FamiTrackerExecutor::next_row)
    }

    /// Engine frames per second
    pub fn frame_rate(&self) -> u32 {
        self.param.frame_rate
    }

    /// Voices of the loaded document
    pub fn channel_codes(&self) -> Vec<ChannelCode> {
        self.executor
            .as_ref()
            .map(FamiTrackerExecutor::channel_codes)
            .unwrap_or_default()
    }

    /// Computed volume of a voice (0-240)
    pub fn channel_volume(&self, code: ChannelCode) -> Option<i32> {
        self.executor.as_ref()?.channel_volume(code)
    }

    /// Whether a voice is sounding a note
    pub fn is_channel_playing(&self, code: ChannelCode) -> bool {
        self.executor
            .as_ref()
            .is_some_and(|executor| executor.is_channel_playing(code))
    }

    /// Switch a mixer post-processing stage on or off
    ///
    /// Returns `false` when the mixer has no stage of that kind.
    pub fn set_interceptor_enabled(&mut self, kind: InterceptorKind, enabled: bool) -> bool {
        self.mixer.set_interceptor_enabled(kind, enabled)
    }

    /// Set the gain of a voice
    ///
    /// The level is kept across [`Self::ready`]. Returns `false` for
    /// negative or non-finite levels.
    pub fn set_channel_level(&mut self, code: ChannelCode, level: f32) -> bool {
        if !level.is_finite() || level < 0.0 {
            return false;
        }
        self.config.mixer.levels.insert(code, level);
        if let Some(id) = self.executor.as_ref().and_then(|e| e.mixer_id(code)) {
            self.mixer.set_level(id, level);
        }
        true
    }

    /// Output tracks (1 = mono, 2 = stereo)
    pub fn track_count(&self) -> usize {
        self.mixer.track_count()
    }
}

impl std::fmt::Debug for FamiTrackerRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamiTrackerRenderer")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("speed", &self.speed)
            .field("remain", &self.remain())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FtmAudioBuilder, FtmNote};

    fn renderer() -> FamiTrackerRenderer {
        let builder = FtmAudioBuilder::new();
        let mut track = builder.new_track(4);
        track.push_section(&[0]);
        track.set_note(0, 0, 0, FtmNote::pitch(46));
        let audio = Arc::new(builder.track(track).build().unwrap());
        let mut renderer = FamiTrackerRenderer::new(RendererConfig::default()).unwrap();
        renderer.ready(audio).unwrap();
        renderer
    }

    #[test]
    fn test_not_ready() {
        let mut renderer = FamiTrackerRenderer::new(RendererConfig::default()).unwrap();
        let mut buf = [0i16; 16];
        assert!(matches!(renderer.render(&mut buf), Err(FtmError::NotReady)));
        assert!(matches!(renderer.skip(1), Err(FtmError::NotReady)));
        assert!(matches!(renderer.ready_track(0), Err(FtmError::NotReady)));
        assert!(!renderer.is_finished());
        assert!(renderer.channel_codes().is_empty());
    }

    #[test]
    fn test_one_frame_is_800_samples_at_48k() {
        let mut renderer = renderer();
        let mut buf = vec![0i16; 2000];
        assert_eq!(renderer.render_one_frame(&mut buf).unwrap(), 800);
        assert_eq!(renderer.remain(), 0);
    }

    #[test]
    fn test_partial_reads_keep_remainder() {
        let mut renderer = renderer();
        let mut buf = vec![0i16; 300];
        assert_eq!(renderer.render_one_frame(&mut buf).unwrap(), 300);
        assert_eq!(renderer.remain(), 500);
        assert_eq!(renderer.render_one_frame(&mut buf).unwrap(), 300);
        assert_eq!(renderer.render_one_frame(&mut buf).unwrap(), 200);
        assert_eq!(renderer.remain(), 0);
    }

    #[test]
    fn test_speed_changes_frame_size() {
        let mut renderer = renderer();
        renderer.set_speed(2.0).unwrap();
        let mut buf = vec![0i16; 2000];
        assert_eq!(renderer.render_one_frame(&mut buf).unwrap(), 400);

        assert!(matches!(renderer.set_speed(0.0), Err(FtmError::InvalidSpeed(_))));
        assert_eq!(renderer.speed(), 2.0);
        renderer.reset_speed();
        assert_eq!(renderer.render_one_frame(&mut buf).unwrap(), 800);
    }

    #[test]
    fn test_bytes_are_little_endian_pairs() {
        let mut shorts = renderer();
        let mut bytes = renderer();
        let mut a = vec![0i16; 1000];
        let mut b = vec![0u8; 2001];
        assert_eq!(shorts.render(&mut a).unwrap(), 1000);
        assert_eq!(bytes.render_bytes(&mut b).unwrap(), 2000);
        for (i, sample) in a.iter().enumerate() {
            assert_eq!(i16::from_le_bytes([b[2 * i], b[2 * i + 1]]), *sample);
        }
    }

    #[test]
    fn test_channel_level_survives_ready() {
        let mut renderer = renderer();
        assert!(renderer.set_channel_level(ChannelCode::Pulse1, 0.5));
        assert!(!renderer.set_channel_level(ChannelCode::Pulse1, f32::NAN));
        assert_eq!(renderer.config().mixer.level_of(ChannelCode::Pulse1), 0.5);
        assert!(!renderer.set_interceptor_enabled(InterceptorKind::Echo, false));
    }
}
