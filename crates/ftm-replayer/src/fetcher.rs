//! Row/frame scheduler
//!
//! FamiTracker timing: a tempo accumulator decides on every engine frame
//! whether a new row is due. With `decrement = tempo * 24 / speed` and a
//! replenishment of `60 * frame_rate - remainder` per row, speed 6 at tempo
//! 150 plays one row every 6 frames at 60 Hz.
//!
//! The cursor always points at the row to fetch next. The section and row of
//! the most recent fetch are kept separately, which is what position queries
//! report. The song counts as finished on the fetch that moves back to an
//! earlier (or the same) section, so the last row still plays in full.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, trace};

use crate::channel::FtmChannel;
use crate::effect::{convert_row, FtmEffectType, GlobalEffect};
use crate::error::{FtmError, Result};
use crate::format::{FtmAudio, FtmTrack};

/// Tempo accumulator and pattern cursor
#[derive(Debug, Clone)]
pub struct FtmRowFetcher {
    audio: Arc<FtmAudio>,
    track: usize,

    /// Cursor: next section to fetch
    section: usize,
    /// Cursor: next row to fetch
    row: usize,
    /// Section of the last fetched row
    cur_section: usize,
    /// Last fetched row
    cur_row: usize,

    speed: u32,
    tempo: u32,
    accum: i64,
    decrement: i64,
    remainder: i64,
    frame_rate: u32,

    jump_section: Option<usize>,
    skip_row: Option<usize>,
    /// The cursor wrapped past the last section
    wrapped: bool,
    update_row: bool,
    finished: bool,
}

impl FtmRowFetcher {
    /// Fetcher positioned at the start of `track`
    pub fn new(audio: Arc<FtmAudio>, track: usize) -> Result<Self> {
        let frame_rate = audio.frame_rate();
        let mut fetcher = Self {
            audio,
            track: 0,
            section: 0,
            row: 0,
            cur_section: 0,
            cur_row: 0,
            speed: 1,
            tempo: 1,
            accum: 0,
            decrement: 0,
            remainder: 0,
            frame_rate,
            jump_section: None,
            skip_row: None,
            wrapped: false,
            update_row: false,
            finished: false,
        };
        fetcher.ready(track, 0)?;
        Ok(fetcher)
    }

    /// Reset to `(track, section)` with the track's speed and tempo
    ///
    /// # Errors
    ///
    /// [`FtmError::InvalidTrack`] or [`FtmError::InvalidSection`] when out of
    /// range; the fetcher is unchanged in that case.
    pub fn ready(&mut self, track: usize, section: usize) -> Result<()> {
        let data = self.audio.track(track)?;
        if section >= data.section_count() {
            return Err(FtmError::InvalidSection {
                index: section,
                available: data.section_count(),
            });
        }
        let (speed, tempo) = (data.speed, data.tempo);

        self.track = track;
        self.section = section;
        self.row = 0;
        self.cur_section = section;
        self.cur_row = 0;
        self.speed = speed.max(1);
        self.tempo = tempo.max(1);
        self.accum = 0;
        self.jump_section = None;
        self.skip_row = None;
        self.wrapped = false;
        self.update_row = false;
        self.finished = false;
        self.frame_rate = self.audio.frame_rate();
        self.setup_speed();
        debug!(
            "fetcher ready: track {} section {} speed {} tempo {}",
            track, section, self.speed, self.tempo
        );
        Ok(())
    }

    fn setup_speed(&mut self) {
        let ticks = self.tempo as i64 * 24;
        self.decrement = ticks / self.speed as i64;
        self.remainder = ticks % self.speed as i64;
    }

    fn current_track(&self) -> &FtmTrack {
        // Index checked in ready()
        &self.audio.tracks[self.track]
    }

    /// First half of a frame: fetch and publish a row if one is due
    ///
    /// Returns the global effects of the fetched row, keyed by slot; empty
    /// when no row was fetched.
    pub fn run_frame(&mut self, channels: &mut [FtmChannel]) -> BTreeMap<FtmEffectType, GlobalEffect> {
        if self.accum > 0 {
            self.update_row = false;
            return BTreeMap::new();
        }
        self.update_row = true;
        // A pending jump decides on its own whether it loops
        if std::mem::take(&mut self.wrapped) && self.jump_section.is_none() && self.skip_row.is_none() {
            self.finished = true;
        }
        self.handle_jump();
        let globals = self.store_row(channels);
        self.advance_row();
        globals
    }

    /// Second half of a frame: advance the tempo accumulator
    pub fn update_state(&mut self) {
        if self.accum <= 0 {
            self.accum += 60 * self.frame_rate as i64 - self.remainder;
        }
        self.accum -= self.decrement;
    }

    fn handle_jump(&mut self) {
        let sections = self.current_track().section_count();
        if let Some(row) = self.skip_row.take() {
            let target = self.jump_section.take().unwrap_or(self.cur_section + 1);
            self.section = self.wrap_section(target, sections);
            self.row = if row < self.current_track().length { row } else { 0 };
            debug!("skip to section {} row {}", self.section, self.row);
        } else if let Some(target) = self.jump_section.take() {
            self.section = self.wrap_section(target, sections);
            self.row = 0;
            debug!("jump to section {}", self.section);
        }
    }

    /// Wrap a jump target into the order list, flagging loops back
    fn wrap_section(&mut self, target: usize, sections: usize) -> usize {
        let target = if target >= sections { 0 } else { target };
        if target <= self.cur_section {
            self.finished = true;
        }
        target
    }

    fn store_row(&mut self, channels: &mut [FtmChannel]) -> BTreeMap<FtmEffectType, GlobalEffect> {
        self.cur_section = self.section;
        self.cur_row = self.row;
        trace!("row {:02X}:{:02X}", self.section, self.row);

        let split = self.audio.split;
        let mut globals = BTreeMap::new();
        for (index, channel) in channels.iter_mut().enumerate() {
            let Some(note) = self.audio.note(self.track, self.section, index, self.row) else {
                continue;
            };
            let row = convert_row(
                note,
                split,
                channel.is_playing(),
                channel.effect(FtmEffectType::Slide),
            );
            for effect in row.global {
                globals.insert(effect.kind(), effect);
            }
            channel.publish(row.channel, row.delay);
            trace!(
                "  {}: {:?}",
                channel.code(),
                channel.effect_types().collect::<Vec<_>>()
            );
        }
        globals
    }

    fn advance_row(&mut self) {
        let (length, sections) = {
            let track = self.current_track();
            (track.length, track.section_count())
        };
        self.row += 1;
        if self.row >= length {
            self.row = 0;
            self.section += 1;
            if self.section >= sections {
                self.section = 0;
                self.wrapped = true;
            }
        }
    }

    /// Change the speed (frames per row at tempo 150)
    pub fn set_speed(&mut self, speed: u32) {
        self.speed = speed.max(1);
        self.setup_speed();
        debug!("speed {}", self.speed);
    }

    /// Change the tempo
    pub fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo.max(1);
        self.setup_speed();
        debug!("tempo {}", self.tempo);
    }

    /// Request a jump to `section` before the next fetch
    pub fn jump_to_section(&mut self, section: usize) {
        self.jump_section = Some(section);
    }

    /// Request a skip to `row` of the following section before the next fetch
    pub fn skip_rows(&mut self, row: usize) {
        self.skip_row = Some(row);
    }

    /// Halt: flag the song as finished
    pub fn stop(&mut self) {
        debug!("halt at section {} row {}", self.cur_section, self.cur_row);
        self.finished = true;
    }

    /// Whether the song looped, jumped backward or halted
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the last frame fetched a row
    pub fn need_row_update(&self) -> bool {
        self.update_row
    }

    /// Track being played
    pub fn track(&self) -> usize {
        self.track
    }

    /// Section of the last fetched row
    pub fn current_section(&self) -> usize {
        self.cur_section
    }

    /// Last fetched row
    pub fn current_row(&self) -> usize {
        self.cur_row
    }

    /// Section the next fetch reads, pending jumps included
    pub fn next_section(&self) -> usize {
        let sections = self.current_track().section_count();
        let target = if self.skip_row.is_some() {
            self.jump_section.unwrap_or(self.cur_section + 1)
        } else if let Some(section) = self.jump_section {
            section
        } else {
            return self.section;
        };
        if target >= sections {
            0
        } else {
            target
        }
    }

    /// Row the next fetch reads, pending jumps included
    pub fn next_row(&self) -> usize {
        match (self.skip_row, self.jump_section) {
            (Some(row), _) if row < self.current_track().length => row,
            (Some(_), _) | (None, Some(_)) => 0,
            (None, None) => self.row,
        }
    }

    /// Current speed
    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Current tempo
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    /// Engine frame rate
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Tempo accumulator
    pub fn accumulator(&self) -> i64 {
        self.accum
    }
}
