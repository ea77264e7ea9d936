//! Transport state and the per-frame time readout.

use cutline_core::RationalTime;
use cutline_media::PlaybackEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Timeline auto-scroll policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FollowMode {
    #[default]
    Off,
    KeepSelectionVisible,
    CenterOnPlayhead,
}

/// Conditions under which the engine clock must not reach the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackGates {
    pub scrubbing: bool,
    pub awaiting_seek_commit: bool,
    pub rebuilding: bool,
}

impl PlaybackGates {
    pub fn is_clear(&self) -> bool {
        !(self.scrubbing || self.awaiting_seek_commit || self.rebuilding)
    }
}

/// Owns the engine handle and the displayed playhead.
pub struct PlaybackController {
    engine: Arc<dyn PlaybackEngine>,
    state: PlaybackState,
    follow: FollowMode,
    gates: PlaybackGates,
    display_time: RationalTime,
}

impl PlaybackController {
    pub fn new(engine: Arc<dyn PlaybackEngine>) -> Self {
        Self {
            engine,
            state: PlaybackState::Idle,
            follow: FollowMode::Off,
            gates: PlaybackGates::default(),
            display_time: RationalTime::ZERO,
        }
    }

    pub fn engine(&self) -> &Arc<dyn PlaybackEngine> {
        &self.engine
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn follow(&self) -> FollowMode {
        self.follow
    }

    pub fn set_follow(&mut self, follow: FollowMode) {
        self.follow = follow;
    }

    pub fn gates(&self) -> PlaybackGates {
        self.gates
    }

    pub fn set_scrubbing(&mut self, on: bool) {
        self.gates.scrubbing = on;
    }

    pub fn set_awaiting_seek_commit(&mut self, on: bool) {
        self.gates.awaiting_seek_commit = on;
    }

    pub fn set_rebuilding(&mut self, on: bool) {
        self.gates.rebuilding = on;
    }

    pub fn display_time(&self) -> RationalTime {
        self.display_time
    }

    /// Set the displayed playhead directly, e.g. when a seek lands.
    pub fn set_display_time(&mut self, time: RationalTime) {
        self.display_time = time;
    }

    /// Start playback. Returns false if already playing.
    ///
    /// While a rebuild is outstanding the engine is left paused; the
    /// rebuild resumes it once its corrective seek lands.
    pub fn play(&mut self) -> bool {
        if self.is_playing() {
            return false;
        }
        self.state = PlaybackState::Playing;
        self.follow = FollowMode::CenterOnPlayhead;
        if !self.gates.rebuilding {
            self.engine.play();
        }
        info!(at = %self.display_time, "Playback started");
        true
    }

    pub fn pause(&mut self) {
        self.engine.pause();
        self.state = PlaybackState::Paused;
        self.follow = FollowMode::Off;
        debug!(at = %self.display_time, "Playback paused");
    }

    /// Restart the engine if the transport still wants to play.
    pub fn resume_engine(&self) {
        if self.is_playing() {
            self.engine.play();
        }
    }

    /// Per-frame tick. Copies the engine clock to the display unless a gate
    /// is closed; a suppressed write is dropped, not deferred. Reaching
    /// `total` while playing pauses there. Returns whether the display was
    /// written.
    pub fn on_frame(&mut self, total: RationalTime) -> bool {
        if !self.gates.is_clear() {
            return false;
        }
        let now = self.engine.current_time().clamp(RationalTime::ZERO, total.max(RationalTime::ZERO));
        self.display_time = now;
        if self.is_playing() && now >= total {
            self.engine.pause();
            self.state = PlaybackState::Paused;
            self.follow = FollowMode::Off;
            info!(at = %now, "Reached end of timeline");
        }
        true
    }
}
