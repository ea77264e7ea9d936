//! Gesture-scoped trimming for clips, overlays and audio tracks.
//!
//! A trim session snapshots the target's placement when the gesture starts;
//! every update applies the *cumulative* handle deltas to that baseline and
//! re-quantizes the result to the frame grid, so long drags made of many
//! small deltas never drift.

use cutline_core::{CutlineError, FrameRate, RationalTime, Result};
use tracing::{debug, info};

use crate::clip::MediaKind;
use crate::ids::EntityRef;
use crate::lane::LaneEntity;
use crate::overlay::Schedule;
use crate::project::{Project, Timeline};

/// What lies beyond one edge of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRule {
    /// The edge stops where the source material ends.
    SourceBounded,
    /// The edge may grow the entity's nominal duration.
    Extensible,
}

/// Edge rules for both handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPolicy {
    pub left: EdgeRule,
    pub right: EdgeRule,
}

impl TrimPolicy {
    /// Video and audio: both edges limited by source material.
    pub const SOURCE_BOUNDED: Self = Self {
        left: EdgeRule::SourceBounded,
        right: EdgeRule::SourceBounded,
    };

    /// Text, captions and photos: both edges can grow the schedule.
    pub const EXTENSIBLE: Self = Self {
        left: EdgeRule::Extensible,
        right: EdgeRule::Extensible,
    };

    /// Photo clips: the left edge keeps the clip in place, the right edge
    /// stretches the still.
    pub const STILL_CLIP: Self = Self {
        left: EdgeRule::SourceBounded,
        right: EdgeRule::Extensible,
    };
}

/// Bounds a trim is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct TrimLimits {
    pub frame_rate: FrameRate,
    /// Shortest visible length
    pub min_length: RationalTime,
    /// End of the project, limiting rightward growth
    pub project_end: RationalTime,
}

fn quantize_within(
    value: RationalTime,
    rate: FrameRate,
    lo: RationalTime,
    hi: RationalTime,
) -> RationalTime {
    value.quantize(rate).min(hi).max(lo)
}

/// Apply cumulative handle deltas to `baseline`.
///
/// Positive deltas move a handle to the right. The result always satisfies
/// `0 ≤ trim_in < trim_out ≤ duration` with at least `min_length` visible,
/// and its visible window never starts before the timeline origin.
pub fn trim_schedule(
    baseline: &Schedule,
    policy: TrimPolicy,
    left: Option<RationalTime>,
    right: Option<RationalTime>,
    limits: &TrimLimits,
) -> Schedule {
    let rate = limits.frame_rate;
    let min_len = limits.min_length;
    let mut next = *baseline;

    if let Some(delta) = left {
        let requested = baseline.trim_in + delta;
        // trim_in may not expose anything before the timeline origin
        let floor = (-baseline.start).max(RationalTime::ZERO);
        let ceiling = baseline.trim_out - min_len;
        if requested >= floor {
            next.trim_in = quantize_within(requested, rate, floor, ceiling);
        } else {
            next.trim_in = floor;
            if policy.left == EdgeRule::Extensible && floor.is_zero() {
                let room = baseline.start;
                let extension = quantize_within(-requested, rate, RationalTime::ZERO, room);
                next.start = baseline.start - extension;
                next.duration = baseline.duration + extension;
                next.trim_out = baseline.trim_out + extension;
            }
        }
    }

    if let Some(delta) = right {
        let requested = next.trim_out + delta;
        let lo = next.trim_in + min_len;
        match policy.right {
            EdgeRule::SourceBounded => {
                next.trim_out = quantize_within(requested, rate, lo, next.duration);
            }
            EdgeRule::Extensible => {
                let quantized = requested.quantize(rate);
                if quantized > next.duration {
                    let limit_end = limits.project_end.max(baseline.visible_end());
                    let max_out = (limit_end - next.start).max(next.duration);
                    let out = quantized.min(max_out).max(lo);
                    next.duration = next.duration.max(out);
                    next.trim_out = out;
                } else {
                    next.trim_out = quantized.min(next.duration).max(lo);
                }
            }
        }
    }

    next
}

/// An open trim gesture.
#[derive(Debug, Clone)]
pub struct TrimSession {
    pub target: EntityRef,
    baseline: Schedule,
    policy: TrimPolicy,
    /// Timeline before the gesture, for undo
    before: Timeline,
    changed: bool,
}

impl TrimSession {
    pub fn baseline(&self) -> &Schedule {
        &self.baseline
    }

    pub fn policy(&self) -> TrimPolicy {
        self.policy
    }
}

/// Result of closing a trim session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOutcome {
    pub target: EntityRef,
    /// Whether the gesture changed anything
    pub changed: bool,
}

/// Placement of a clip expressed in timeline units, so clips trim with the
/// same rules as lane entities. `start` is derived and never written back.
fn clip_schedule(timeline: &Timeline, entity: EntityRef) -> Option<Schedule> {
    let id = entity.as_clip()?;
    let clip = timeline.clip(id)?;
    let speed = clip.speed();
    Some(Schedule {
        start: timeline.start_of(id)?,
        duration: clip.native_duration() / speed,
        trim_in: clip.trim_start() / speed,
        trim_out: clip.trim_end() / speed,
    })
}

fn resolve(timeline: &Timeline, entity: EntityRef) -> Option<(Schedule, TrimPolicy)> {
    match entity {
        EntityRef::Clip(id) => {
            let policy = match timeline.clip(id)?.source.kind {
                MediaKind::Video => TrimPolicy::SOURCE_BOUNDED,
                MediaKind::Photo => TrimPolicy::STILL_CLIP,
            };
            clip_schedule(timeline, entity).map(|s| (s, policy))
        }
        EntityRef::Text(id) => timeline
            .text_overlays()
            .get(id)
            .map(|e| (e.schedule, e.trim_policy())),
        EntityRef::Media(id) => timeline
            .media_overlays()
            .get(id)
            .map(|e| (e.schedule, e.trim_policy())),
        EntityRef::Caption(id) => timeline
            .captions()
            .get(id)
            .map(|e| (e.schedule, e.trim_policy())),
        EntityRef::Audio(id) => timeline
            .audio_tracks()
            .get(id)
            .map(|e| (e.schedule, e.trim_policy())),
    }
}

impl Project {
    /// The open trim session, if any.
    pub fn trim_session(&self) -> Option<&TrimSession> {
        self.trim.as_ref()
    }

    /// Open a trim gesture on `target`, snapshotting its baseline.
    pub fn begin_trim(&mut self, target: EntityRef) -> Result<()> {
        if let Some(open) = &self.trim {
            return Err(CutlineError::SessionActive(format!(
                "trim on {} is still open",
                open.target
            )));
        }
        let (baseline, policy) = resolve(&self.timeline, target)
            .ok_or_else(|| CutlineError::NotFound(target.to_string()))?;
        info!(target = %target, start = %baseline.start, trim_in = %baseline.trim_in, trim_out = %baseline.trim_out, "Trim began");
        self.trim = Some(TrimSession {
            target,
            baseline,
            policy,
            before: self.timeline.clone(),
            changed: false,
        });
        Ok(())
    }

    /// Apply cumulative handle deltas (relative to the baseline) to the open
    /// session's target. Returns the target's new placement.
    pub fn apply_trim(
        &mut self,
        left: Option<RationalTime>,
        right: Option<RationalTime>,
    ) -> Result<Schedule> {
        let session = self
            .trim
            .as_ref()
            .ok_or_else(|| CutlineError::NoSession("no trim in progress".into()))?;
        let target = session.target;
        let next = trim_schedule(&session.baseline, session.policy, left, right, &self.trim_limits(target));
        self.write_schedule(target, next)?;

        if let Some(session) = self.trim.as_mut() {
            session.changed = next != session.baseline;
        }
        debug!(target = %target, trim_in = %next.trim_in, trim_out = %next.trim_out, duration = %next.duration, "Trim applied");
        Ok(next)
    }

    /// Close the open trim gesture, recording it for undo if anything changed.
    pub fn end_trim(&mut self) -> Result<TrimOutcome> {
        let session = self
            .trim
            .take()
            .ok_or_else(|| CutlineError::NoSession("no trim in progress".into()))?;
        if session.changed {
            self.history.push(session.before);
        }
        info!(target = %session.target, changed = session.changed, "Trim ended");
        Ok(TrimOutcome {
            target: session.target,
            changed: session.changed,
        })
    }

    /// Abandon the open trim gesture and restore the baseline.
    pub fn cancel_trim(&mut self) -> Result<()> {
        let session = self
            .trim
            .take()
            .ok_or_else(|| CutlineError::NoSession("no trim in progress".into()))?;
        self.timeline = session.before;
        info!(target = %session.target, "Trim cancelled");
        Ok(())
    }

    /// One-shot trim outside a gesture. Returns whether anything changed.
    pub(crate) fn trim_once(
        &mut self,
        target: EntityRef,
        left: Option<RationalTime>,
        right: Option<RationalTime>,
    ) -> Result<bool> {
        let Some((baseline, policy)) = resolve(&self.timeline, target) else {
            return Ok(false);
        };
        let next = trim_schedule(&baseline, policy, left, right, &self.trim_limits(target));
        if next == baseline {
            return Ok(false);
        }
        self.write_schedule(target, next)?;
        Ok(true)
    }

    /// A main-track clip pushes later clips along instead of running into
    /// the project end, so photo clips are bounded by the longest still.
    fn trim_limits(&self, target: EntityRef) -> TrimLimits {
        let project_end = match target.as_clip() {
            Some(id) => self
                .timeline
                .start_of(id)
                .map(|start| start + self.config.max_still_duration)
                .unwrap_or_else(|| self.timeline.total_duration()),
            None => self.timeline.total_duration(),
        };
        TrimLimits {
            frame_rate: self.timeline.frame_rate(),
            min_length: self.min_length(),
            project_end,
        }
    }

    /// Store a trimmed placement. Clip schedules are converted back to
    /// source units; their `start` is derived and ignored. An edge that
    /// did not move keeps its exact source time.
    fn write_schedule(&mut self, target: EntityRef, next: Schedule) -> Result<()> {
        match target {
            EntityRef::Clip(id) => {
                let clip = self
                    .timeline
                    .clip_mut(id)
                    .ok_or_else(|| CutlineError::NotFound(target.to_string()))?;
                let speed = clip.speed();
                if next.duration > clip.native_duration() / speed {
                    clip.set_still_duration(next.duration * speed)?;
                }
                let start = if next.trim_in == clip.trim_start() / speed {
                    clip.trim_start()
                } else {
                    (next.trim_in * speed).max(RationalTime::ZERO)
                };
                let end = if next.trim_out == clip.trim_end() / speed {
                    clip.trim_end()
                } else {
                    (next.trim_out * speed).min(clip.native_duration())
                };
                clip.set_trim(start, end)
            }
            _ => {
                let schedule = self
                    .timeline
                    .lane_schedule_mut(target)
                    .ok_or_else(|| CutlineError::NotFound(target.to_string()))?;
                *schedule = next;
                Ok(())
            }
        }
    }
}
