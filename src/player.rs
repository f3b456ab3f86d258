use serde::{Deserialize, Serialize};

use crate::sample::Sample;

/// Playback state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// The frame handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame<'a> {
    Sample(&'a Sample),
    NoData,
}

/// Result of one playback tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cursor moved forward to this index
    Advanced(usize),
    /// Pass complete: cursor wrapped to 0 and playback stopped
    Finished,
    /// Tick arrived while stopped
    Ignored,
}

/// Cursor over the recorded log.
///
/// Playback is a single pass: a tick at the final frame wraps the cursor to
/// 0 and stops. Manual navigation saturates at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    state: PlaybackState,
    current_index: usize,
}

impl Player {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_index: 0,
        }
    }

    /// Rehydrate a cursor, clamped into the restored log
    pub fn restore(current_index: usize, len: usize) -> Self {
        let mut player = Self::new();
        player.current_index = current_index;
        player.clamp(len);
        player
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Returns true when playback actually started
    pub fn play(&mut self, len: usize) -> bool {
        if len == 0 || self.is_playing() {
            return false;
        }
        self.clamp(len);
        self.state = PlaybackState::Playing;
        true
    }

    /// Returns true when playback was running
    pub fn pause(&mut self) -> bool {
        let was_playing = self.is_playing();
        self.state = PlaybackState::Stopped;
        was_playing
    }

    /// Same as pause: the cursor stays where it is
    pub fn stop(&mut self) -> bool {
        self.pause()
    }

    pub fn advance(&mut self, len: usize) -> bool {
        if len == 0 || self.current_index + 1 >= len {
            return false;
        }
        self.current_index += 1;
        true
    }

    pub fn retreat(&mut self, len: usize) -> bool {
        if len == 0 || self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    pub fn seek(&mut self, index: usize, len: usize) {
        self.current_index = index;
        self.clamp(len);
    }

    pub fn reset(&mut self) {
        self.current_index = 0;
    }

    /// Pull the cursor back into `[0, len-1]` after the log changed
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.current_index = 0;
        } else if self.current_index >= len {
            self.current_index = len - 1;
        }
    }

    pub fn tick(&mut self, len: usize) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Ignored;
        }
        if self.advance(len) {
            return TickOutcome::Advanced(self.current_index);
        }
        self.current_index = 0;
        self.state = PlaybackState::Stopped;
        TickOutcome::Finished
    }

    pub fn current_frame<'a>(&self, log: &'a [Sample]) -> Frame<'a> {
        match log.get(self.current_index) {
            Some(sample) => Frame::Sample(sample),
            None => Frame::NoData,
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}
