//! Splitting clips at the playhead and inserting media between them.

use cutline_core::{FrameRate, RationalTime, Result};
use tracing::info;

use crate::clip::Clip;
use crate::ids::{ClipId, EntityRef};
use crate::project::Project;

/// Where a time falls relative to the main track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayheadHit {
    /// On (or within half a frame of) the boundary before clip `index`;
    /// `index == len` is the end of the track.
    Boundary { index: usize },
    /// Strictly inside clip `index`, `offset` into its effective duration.
    Inside { index: usize, offset: RationalTime },
}

/// Locate `time` on the main track.
///
/// Offsets are snapped to the frame grid. A cut that would leave either
/// half shorter than one frame resolves to the nearer boundary.
pub fn locate(clips: &[Clip], time: RationalTime, rate: FrameRate) -> PlayheadHit {
    let time = time.max(RationalTime::ZERO);
    let frame = rate.frame_duration();
    let tolerance = frame.half();
    let mut start = RationalTime::ZERO;

    for (index, clip) in clips.iter().enumerate() {
        let duration = clip.effective_duration();
        let end = start + duration;
        if time.distance(start) <= tolerance {
            return PlayheadHit::Boundary { index };
        }
        if time < end {
            if time.distance(end) <= tolerance {
                return PlayheadHit::Boundary { index: index + 1 };
            }
            let offset = (time - start).quantize(rate);
            if offset < frame {
                return PlayheadHit::Boundary { index };
            }
            if duration - offset < frame {
                return PlayheadHit::Boundary { index: index + 1 };
            }
            return PlayheadHit::Inside { index, offset };
        }
        start = end;
    }
    PlayheadHit::Boundary { index: clips.len() }
}

/// Result of splitting one clip in two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Identity of the clip that was split; it no longer exists.
    pub retired: ClipId,
    pub left: ClipId,
    pub right: ClipId,
    /// Index of the left half
    pub index: usize,
}

/// Result of inserting a clip at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub index: usize,
    /// Split performed to make room, if the time fell inside a clip
    pub split: Option<SplitOutcome>,
}

impl Project {
    /// Split the clip under `time`. `None` when `time` is on a boundary.
    pub(crate) fn split_at(&mut self, time: RationalTime) -> Result<Option<SplitOutcome>> {
        match locate(self.timeline.clips(), time, self.timeline.frame_rate()) {
            PlayheadHit::Boundary { .. } => Ok(None),
            PlayheadHit::Inside { index, offset } => self.split_clip(index, offset).map(Some),
        }
    }

    /// Insert `clip` at `time`, splitting the clip underneath if needed.
    pub(crate) fn insert_clip_at(&mut self, time: RationalTime, clip: Clip) -> Result<InsertOutcome> {
        let outcome = match locate(self.timeline.clips(), time, self.timeline.frame_rate()) {
            PlayheadHit::Boundary { index } => InsertOutcome { index, split: None },
            PlayheadHit::Inside { index, offset } => {
                let split = self.split_clip(index, offset)?;
                InsertOutcome {
                    index: split.index + 1,
                    split: Some(split),
                }
            }
        };
        info!(clip = %clip.id, index = outcome.index, split = outcome.split.is_some(), "Inserted clip");
        self.timeline.clips_mut().insert(outcome.index, clip);
        Ok(outcome)
    }

    /// Replace clip `index` with two halves cut `offset` into its effective
    /// duration. The original identity is retired before the halves get theirs.
    fn split_clip(&mut self, index: usize, offset: RationalTime) -> Result<SplitOutcome> {
        let original = self.timeline.clips()[index].clone();
        let cut = original.trim_start() + offset * original.speed();

        self.retire(EntityRef::Clip(original.id));

        let mut left = original.with_id(self.ids.clip_id());
        left.set_trim(original.trim_start(), cut)?;
        let mut right = original.with_id(self.ids.clip_id());
        right.set_trim(cut, original.trim_end())?;

        let outcome = SplitOutcome {
            retired: original.id,
            left: left.id,
            right: right.id,
            index,
        };
        self.timeline.clips_mut().splice(index..=index, [left, right]);
        info!(retired = %original.id, left = %outcome.left, right = %outcome.right, at = %offset, "Split clip");
        Ok(outcome)
    }
}
