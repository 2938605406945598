//! Frame executor
//!
//! Owns the channels of a document and the row fetcher, and runs the
//! per-frame pipeline in a fixed order:
//!
//! 1. fetch a row if one is due and publish its effects
//! 2. apply the row's global effects to the fetcher
//! 3. run every channel (effects, sequences, device write)
//! 4. advance the tempo accumulator
//!
//! Sound generation is a separate step ([`FamiTrackerExecutor::process_sounds`])
//! so the renderer can size each frame in CPU cycles.

use std::sync::Arc;

use log::{debug, trace};
use nes_apu::mixer::SoundMixer;
use nes_apu::ChannelCode;

use crate::channel::FtmChannel;
use crate::error::Result;
use crate::fetcher::FtmRowFetcher;
use crate::format::FtmAudio;

/// Playback state of one document
#[derive(Debug)]
pub struct FamiTrackerExecutor {
    audio: Arc<FtmAudio>,
    fetcher: FtmRowFetcher,
    channels: Vec<FtmChannel>,
    /// Mixer ids, parallel to `channels`
    mixer_ids: Vec<usize>,
}

impl FamiTrackerExecutor {
    /// Executor positioned at the start of track 0
    ///
    /// # Errors
    ///
    /// Fails when the document does not validate.
    pub fn new(audio: Arc<FtmAudio>) -> Result<Self> {
        audio.validate()?;
        let fetcher = FtmRowFetcher::new(Arc::clone(&audio), 0)?;
        let channels = Self::build_channels(&audio);
        debug!(
            "executor: {} channels, {} tracks, {} Hz",
            channels.len(),
            audio.track_count(),
            audio.frame_rate()
        );
        Ok(Self {
            audio,
            fetcher,
            channels,
            mixer_ids: Vec::new(),
        })
    }

    fn build_channels(audio: &FtmAudio) -> Vec<FtmChannel> {
        audio
            .channel_codes()
            .into_iter()
            .map(|code| FtmChannel::new(code, audio))
            .collect()
    }

    /// Load another document and start at `(track, section)`
    ///
    /// Channels are rebuilt, so mixer inputs must be attached again.
    /// On error the executor keeps playing the previous document.
    pub fn ready(&mut self, audio: Arc<FtmAudio>, track: usize, section: usize) -> Result<()> {
        audio.validate()?;
        let mut fetcher = FtmRowFetcher::new(Arc::clone(&audio), track)?;
        fetcher.ready(track, section)?;

        self.channels = Self::build_channels(&audio);
        self.mixer_ids.clear();
        self.fetcher = fetcher;
        self.audio = audio;
        Ok(())
    }

    /// Restart at `(track, section)`
    ///
    /// Channels return to their power-on state; every live effect is dropped.
    pub fn ready_track(&mut self, track: usize, section: usize) -> Result<()> {
        self.fetcher.ready(track, section)?;
        for channel in &mut self.channels {
            channel.reset();
        }
        Ok(())
    }

    /// Move the cursor to `(track, section)` without touching the channels
    ///
    /// Notes, live effects (pending `Gxx` included) and the mixer carry on;
    /// only speed and tempo are reloaded from the track.
    pub fn switch_to(&mut self, track: usize, section: usize) -> Result<()> {
        self.fetcher.ready(track, section)
    }

    /// Allocate one mixer input per channel
    pub fn attach_mixer(&mut self, mixer: &mut dyn SoundMixer) {
        self.mixer_ids = self
            .channels
            .iter()
            .map(|channel| mixer.allocate_channel(channel.code()))
            .collect();
    }

    /// Run one engine frame
    pub fn tick(&mut self) {
        let globals = self.fetcher.run_frame(&mut self.channels);
        for effect in globals.values() {
            effect.execute(&mut self.fetcher);
        }

        for channel in &mut self.channels {
            channel.play_note(&self.audio);
        }

        self.fetcher.update_state();

        if log::log_enabled!(log::Level::Trace) {
            let volumes: Vec<i32> = self.channels.iter().map(FtmChannel::current_volume).collect();
            trace!(
                "frame {:02X}:{:02X} volumes {:?}",
                self.fetcher.current_section(),
                self.fetcher.current_row(),
                volumes
            );
        }
    }

    /// Run every channel's generator for `cycles` CPU cycles into `mixer`
    ///
    /// Channels without a mixer input (before [`Self::attach_mixer`]) are
    /// skipped.
    pub fn process_sounds(&mut self, mixer: &mut dyn SoundMixer, cycles: u32) {
        for (channel, &id) in self.channels.iter_mut().zip(&self.mixer_ids) {
            channel.process_sound(mixer, id, cycles);
        }
    }

    /// Document being played
    pub fn audio(&self) -> &Arc<FtmAudio> {
        &self.audio
    }

    /// Row fetcher
    pub fn fetcher(&self) -> &FtmRowFetcher {
        &self.fetcher
    }

    /// Mutable row fetcher
    pub fn fetcher_mut(&mut self) -> &mut FtmRowFetcher {
        &mut self.fetcher
    }

    /// Channels in document order
    pub fn channels(&self) -> &[FtmChannel] {
        &self.channels
    }

    /// Channel playing a voice
    pub fn channel(&self, code: ChannelCode) -> Option<&FtmChannel> {
        self.channels.iter().find(|channel| channel.code() == code)
    }

    /// Voices in document order
    pub fn channel_codes(&self) -> Vec<ChannelCode> {
        self.channels.iter().map(FtmChannel::code).collect()
    }

    /// Computed volume of a voice (0-240); `None` for voices not in the document
    pub fn channel_volume(&self, code: ChannelCode) -> Option<i32> {
        self.channel(code).map(FtmChannel::current_volume)
    }

    /// Whether a voice is sounding a note
    pub fn is_channel_playing(&self, code: ChannelCode) -> bool {
        self.channel(code).is_some_and(FtmChannel::is_playing)
    }

    /// Mixer id of a voice, once attached
    pub fn mixer_id(&self, code: ChannelCode) -> Option<usize> {
        let index = self.channels.iter().position(|channel| channel.code() == code)?;
        self.mixer_ids.get(index).copied()
    }

    /// Whether the song looped, jumped backward or halted
    pub fn is_finished(&self) -> bool {
        self.fetcher.is_finished()
    }

    /// Track being played
    pub fn current_track(&self) -> usize {
        self.fetcher.track()
    }

    /// Section of the row being played
    pub fn current_section(&self) -> usize {
        self.fetcher.current_section()
    }

    /// Row being played
    pub fn current_row(&self) -> usize {
        self.fetcher.current_row()
    }

    /// Whether the last frame started a new row
    pub fn current_row_run_out(&self) -> bool {
        self.fetcher.need_row_update()
    }

    /// Section of the next row, pending jumps included
    pub fn next_section(&self) -> usize {
        self.fetcher.next_section()
    }

    /// Next row, pending jumps included
    pub fn next_row(&self) -> usize {
        self.fetcher.next_row()
    }

    /// Engine frames per second
    pub fn frame_rate(&self) -> u32 {
        self.fetcher.frame_rate()
    }
}
