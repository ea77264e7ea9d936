//! Interactive scrubbing: `Idle → Scrubbing → Committing → Idle`.
//!
//! Drag input only records the latest requested time. A per-frame pacer
//! turns it into tolerant seeks, throttled to one per half frame of drift.
//! Ending the gesture commits with exactly one precise seek, retried once if
//! the engine lands too far from the target.

use cutline_core::{CutlineError, RationalTime, Result};
use tracing::{debug, info, warn};

use crate::controller::FollowMode;

/// State captured when a scrub begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrubSession {
    pub was_playing: bool,
    pub prior_follow: FollowMode,
    /// Latest requested time, clamped to the timeline
    pub requested: RationalTime,
    /// Target of the last tolerant seek issued
    pub last_issued: RationalTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrubPhase {
    #[default]
    Idle,
    Scrubbing(ScrubSession),
    Committing { session: ScrubSession, retried: bool },
}

/// What to do after the commit seek lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitVerdict {
    /// Landing missed by more than the threshold; seek precisely again
    Retry(RationalTime),
    Finished {
        resume: bool,
        follow: FollowMode,
        landed: RationalTime,
    },
}

#[derive(Debug, Clone)]
pub struct ScrubController {
    phase: ScrubPhase,
    retry_threshold: RationalTime,
}

impl ScrubController {
    pub fn new(retry_threshold: RationalTime) -> Self {
        Self {
            phase: ScrubPhase::Idle,
            retry_threshold,
        }
    }

    pub fn phase(&self) -> ScrubPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != ScrubPhase::Idle
    }

    pub fn is_scrubbing(&self) -> bool {
        matches!(self.phase, ScrubPhase::Scrubbing(_))
    }

    pub fn is_committing(&self) -> bool {
        matches!(self.phase, ScrubPhase::Committing { .. })
    }

    /// Open a session starting at `at`.
    pub fn begin(&mut self, was_playing: bool, prior_follow: FollowMode, at: RationalTime) -> Result<()> {
        if self.is_active() {
            return Err(CutlineError::SessionActive("scrub already in progress".into()));
        }
        self.phase = ScrubPhase::Scrubbing(ScrubSession {
            was_playing,
            prior_follow,
            requested: at,
            last_issued: at,
        });
        info!(at = %at, was_playing, "Scrub started");
        Ok(())
    }

    /// Record a drag position. Returns the clamped request.
    pub fn scrub(&mut self, time: RationalTime, total: RationalTime) -> Result<RationalTime> {
        let ScrubPhase::Scrubbing(session) = &mut self.phase else {
            return Err(CutlineError::NoSession("no scrub in progress".into()));
        };
        session.requested = time.clamp(RationalTime::ZERO, total.max(RationalTime::ZERO));
        Ok(session.requested)
    }

    /// Per-frame pacing. Returns a target for a tolerant seek when the
    /// request has drifted more than half of `frame` from the last one.
    pub fn pace(&mut self, frame: RationalTime) -> Option<RationalTime> {
        let ScrubPhase::Scrubbing(session) = &mut self.phase else {
            return None;
        };
        if session.requested.distance(session.last_issued) <= frame.half() {
            return None;
        }
        session.last_issued = session.requested;
        debug!(target = %session.requested, "Scrub seek");
        Some(session.requested)
    }

    /// Stop pacing and return the target of the precise commit seek.
    pub fn end(&mut self) -> Result<RationalTime> {
        let ScrubPhase::Scrubbing(session) = self.phase else {
            return Err(CutlineError::NoSession("no scrub in progress".into()));
        };
        self.phase = ScrubPhase::Committing {
            session,
            retried: false,
        };
        info!(target = %session.requested, "Scrub committing");
        Ok(session.requested)
    }

    /// Feed the landing of the commit seek. `None` when not committing.
    pub fn landed(&mut self, landed: RationalTime) -> Option<CommitVerdict> {
        let ScrubPhase::Committing { session, retried } = &mut self.phase else {
            return None;
        };
        let miss = landed.distance(session.requested);
        if miss > self.retry_threshold && !*retried {
            *retried = true;
            warn!(target = %session.requested, landed = %landed, "Scrub commit missed, retrying");
            return Some(CommitVerdict::Retry(session.requested));
        }
        let verdict = CommitVerdict::Finished {
            resume: session.was_playing,
            follow: session.prior_follow,
            landed,
        };
        self.phase = ScrubPhase::Idle;
        Some(verdict)
    }
}

impl Default for ScrubController {
    fn default() -> Self {
        Self::new(RationalTime::millis(120))
    }
}
