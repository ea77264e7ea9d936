//! Edit commands and snapshot-based undo/redo.
//!
//! Every structural mutation of a project is expressed as an [`EditCommand`]
//! and applied through [`Project::apply`]. Commands that refer to ids no
//! longer in the project are no-ops; commands that would break an
//! invariant are rejected before anything is touched.

use cutline_core::{CutlineError, RationalTime, Result, Speed};
use smallvec::{smallvec, SmallVec};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::audio::AudioTrack;
use crate::clip::Clip;
use crate::ids::{ClipId, EntityRef};
use crate::lane::{Lane, LaneEntity};
use crate::overlay::{Caption, MediaOverlay, Schedule, TextOverlay};
use crate::project::{Project, RenderConfig, Timeline};

/// An edit operation on a project.
#[derive(Debug, Clone)]
pub enum EditCommand {
    /// Add a clip at the end of the main track.
    Append { clip: Clip },
    /// Insert a clip at a time, splitting the clip underneath if needed.
    InsertClipAt { at: RationalTime, clip: Clip },
    /// Split the clip under a time in two.
    SplitAt { at: RationalTime },
    /// Move one or both edges of an entity by the given deltas.
    Trim {
        target: EntityRef,
        left: Option<RationalTime>,
        right: Option<RationalTime>,
    },
    Delete { target: EntityRef },
    /// Copy an entity next to the original under a fresh identity.
    Duplicate { target: EntityRef },
    /// Reorder a clip on the main track.
    MoveClip { id: ClipId, to_index: usize },
    /// Move a lane entity so its visible window starts at `visible_start`.
    Reschedule {
        target: EntityRef,
        visible_start: RationalTime,
    },
    SetSpeed { target: EntityRef, speed: Speed },
    SetPreservesPitch { target: EntityRef, preserves: bool },
    SetMuted { id: ClipId, muted: bool },
    SetVolume { target: EntityRef, volume: f32 },
    AddText { overlay: TextOverlay },
    AddMedia { overlay: MediaOverlay },
    AddCaption { caption: Caption },
    AddAudioTrack { track: AudioTrack },
    /// Move a clip's embedded audio to its own track and mute the clip.
    ExtractAudio { id: ClipId },
    SetRenderConfig { config: RenderConfig },
}

impl EditCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Append { .. } => "append",
            Self::InsertClipAt { .. } => "insert_clip_at",
            Self::SplitAt { .. } => "split_at",
            Self::Trim { .. } => "trim",
            Self::Delete { .. } => "delete",
            Self::Duplicate { .. } => "duplicate",
            Self::MoveClip { .. } => "move_clip",
            Self::Reschedule { .. } => "reschedule",
            Self::SetSpeed { .. } => "set_speed",
            Self::SetPreservesPitch { .. } => "set_preserves_pitch",
            Self::SetMuted { .. } => "set_muted",
            Self::SetVolume { .. } => "set_volume",
            Self::AddText { .. } => "add_text",
            Self::AddMedia { .. } => "add_media",
            Self::AddCaption { .. } => "add_caption",
            Self::AddAudioTrack { .. } => "add_audio_track",
            Self::ExtractAudio { .. } => "extract_audio",
            Self::SetRenderConfig { .. } => "set_render_config",
        }
    }
}

/// Identities touched by an edit.
pub type EntityList = SmallVec<[EntityRef; 2]>;

/// What an applied edit did. Any `Changed` outcome requires exactly one
/// composition rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Unchanged,
    Changed {
        /// Identities that now exist and did not before
        created: EntityList,
        /// Identities that were retired
        retired: EntityList,
    },
}

impl EditOutcome {
    fn changed() -> Self {
        Self::Changed {
            created: SmallVec::new(),
            retired: SmallVec::new(),
        }
    }

    fn created(created: EntityList) -> Self {
        Self::Changed {
            created,
            retired: SmallVec::new(),
        }
    }

    fn from_flag(changed: bool) -> Self {
        if changed {
            Self::changed()
        } else {
            Self::Unchanged
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    pub fn created_entities(&self) -> &[EntityRef] {
        match self {
            Self::Changed { created, .. } => created,
            Self::Unchanged => &[],
        }
    }

    pub fn retired_entities(&self) -> &[EntityRef] {
        match self {
            Self::Changed { retired, .. } => retired,
            Self::Unchanged => &[],
        }
    }
}

/// Snapshot history of timeline states.
#[derive(Debug, Clone)]
pub struct UndoStack {
    /// States before each applied edit (most recent last).
    undo: Vec<Timeline>,
    /// States that were undone (most recent last).
    redo: Vec<Timeline>,
    max_depth: usize,
}

impl UndoStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            max_depth,
        }
    }

    /// Record the state from before an edit. Clears the redo history.
    pub fn push(&mut self, before: Timeline) {
        self.redo.clear();
        self.undo.push(before);
        if self.undo.len() > self.max_depth {
            self.undo.remove(0);
        }
    }

    /// Swap `current` for the most recent recorded state.
    pub fn undo(&mut self, current: Timeline) -> Option<Timeline> {
        let previous = self.undo.pop()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Swap `current` for the most recently undone state.
    pub fn redo(&mut self, current: Timeline) -> Option<Timeline> {
        let next = self.redo.pop()?;
        self.undo.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(200)
    }
}

fn duplicate_in_lane<T: LaneEntity>(
    lane: &mut Lane<T>,
    id: T::Id,
    new_id: T::Id,
) -> bool {
    let Some(original) = lane.get(id) else {
        return false;
    };
    let mut copy = original.with_id(new_id);
    let end = original.schedule().visible_end();
    copy.schedule_mut().move_visible_start_to(end);
    lane.insert_above(id, copy);
    true
}

fn reschedule_in_lane<T: LaneEntity>(lane: &mut Lane<T>, id: T::Id, visible_start: RationalTime) -> bool {
    let Some(entity) = lane.get_mut(id) else {
        return false;
    };
    let before = *entity.schedule();
    entity.schedule_mut().move_visible_start_to(visible_start);
    *entity.schedule() != before
}

impl Project {
    /// Apply an edit, recording it for undo when it changes anything.
    ///
    /// Rejected while a trim session is open.
    pub fn apply(&mut self, command: EditCommand) -> Result<EditOutcome> {
        if let Some(session) = &self.trim {
            return Err(CutlineError::SessionActive(format!(
                "cannot {} while trimming {}",
                command.name(),
                session.target
            )));
        }
        let name = command.name();
        let before = self.timeline.clone();
        let outcome = self.dispatch(command)?;
        if outcome.is_changed() {
            self.history.push(before);
            info!(command = name, total = %self.total_duration(), "Applied edit");
        } else {
            debug!(command = name, "Edit changed nothing");
        }
        Ok(outcome)
    }

    /// Restore the state before the most recent edit.
    pub fn undo(&mut self) -> Result<EditOutcome> {
        self.ensure_no_trim("undo")?;
        let current = self.timeline.clone();
        match self.history.undo(current) {
            Some(previous) => Ok(self.restore(previous)),
            None => Ok(EditOutcome::Unchanged),
        }
    }

    /// Re-apply the most recently undone edit.
    pub fn redo(&mut self) -> Result<EditOutcome> {
        self.ensure_no_trim("redo")?;
        let current = self.timeline.clone();
        match self.history.redo(current) {
            Some(next) => Ok(self.restore(next)),
            None => Ok(EditOutcome::Unchanged),
        }
    }

    fn ensure_no_trim(&self, action: &str) -> Result<()> {
        match &self.trim {
            Some(session) => Err(CutlineError::SessionActive(format!(
                "cannot {action} while trimming {}",
                session.target
            ))),
            None => Ok(()),
        }
    }

    /// Swap in a history state, retiring identities that disappear.
    fn restore(&mut self, timeline: Timeline) -> EditOutcome {
        let old: HashSet<EntityRef> = self.timeline.entities().into_iter().collect();
        let new: HashSet<EntityRef> = timeline.entities().into_iter().collect();
        let retired: EntityList = old.difference(&new).copied().collect();
        let created: EntityList = new.difference(&old).copied().collect();
        for entity in &retired {
            self.retire(*entity);
        }
        self.timeline = timeline;
        info!(created = created.len(), retired = retired.len(), "Restored history state");
        EditOutcome::Changed { created, retired }
    }

    fn dispatch(&mut self, command: EditCommand) -> Result<EditOutcome> {
        match command {
            EditCommand::Append { clip } => {
                self.check_new_clip(&clip)?;
                let id = clip.id;
                self.timeline.clips_mut().push(clip);
                Ok(EditOutcome::created(smallvec![EntityRef::Clip(id)]))
            }

            EditCommand::InsertClipAt { at, clip } => {
                self.check_new_clip(&clip)?;
                let id = clip.id;
                let outcome = self.insert_clip_at(at, clip)?;
                let mut created: EntityList = smallvec![EntityRef::Clip(id)];
                let mut retired = EntityList::new();
                if let Some(split) = outcome.split {
                    created.push(EntityRef::Clip(split.left));
                    created.push(EntityRef::Clip(split.right));
                    retired.push(EntityRef::Clip(split.retired));
                }
                Ok(EditOutcome::Changed { created, retired })
            }

            EditCommand::SplitAt { at } => Ok(match self.split_at(at)? {
                Some(split) => EditOutcome::Changed {
                    created: smallvec![EntityRef::Clip(split.left), EntityRef::Clip(split.right)],
                    retired: smallvec![EntityRef::Clip(split.retired)],
                },
                None => EditOutcome::Unchanged,
            }),

            EditCommand::Trim {
                target,
                left,
                right,
            } => Ok(EditOutcome::from_flag(self.trim_once(target, left, right)?)),

            EditCommand::Delete { target } => Ok(self.delete(target)),

            EditCommand::Duplicate { target } => Ok(self.duplicate(target)),

            EditCommand::MoveClip { id, to_index } => {
                let Some(from) = self.timeline.clip_index(id) else {
                    return Ok(EditOutcome::Unchanged);
                };
                let last = self.timeline.clips().len() - 1;
                let to = to_index.min(last);
                if from == to {
                    return Ok(EditOutcome::Unchanged);
                }
                let clips = self.timeline.clips_mut();
                let clip = clips.remove(from);
                clips.insert(to, clip);
                Ok(EditOutcome::changed())
            }

            EditCommand::Reschedule {
                target,
                visible_start,
            } => {
                let timeline = &mut self.timeline;
                let changed = match target {
                    EntityRef::Clip(_) => {
                        return Err(CutlineError::InvalidParameter(
                            "clips are positioned by their order on the main track".into(),
                        ))
                    }
                    EntityRef::Text(id) => {
                        reschedule_in_lane(timeline.text_overlays_mut(), id, visible_start)
                    }
                    EntityRef::Media(id) => {
                        reschedule_in_lane(timeline.media_overlays_mut(), id, visible_start)
                    }
                    EntityRef::Caption(id) => {
                        reschedule_in_lane(timeline.captions_mut(), id, visible_start)
                    }
                    EntityRef::Audio(id) => {
                        reschedule_in_lane(timeline.audio_tracks_mut(), id, visible_start)
                    }
                };
                Ok(EditOutcome::from_flag(changed))
            }

            EditCommand::SetSpeed { target, speed } => {
                let min = self.min_length();
                match target {
                    EntityRef::Clip(id) => match self.timeline.clip_mut(id) {
                        Some(clip) if clip.speed() != speed => {
                            clip.set_speed(speed, min)?;
                            Ok(EditOutcome::changed())
                        }
                        _ => Ok(EditOutcome::Unchanged),
                    },
                    EntityRef::Audio(id) => match self.timeline.audio_tracks_mut().get_mut(id) {
                        Some(track) if track.speed() != speed => {
                            track.set_speed(speed, min)?;
                            Ok(EditOutcome::changed())
                        }
                        _ => Ok(EditOutcome::Unchanged),
                    },
                    other => Err(CutlineError::InvalidParameter(format!(
                        "{} entities have no speed",
                        other.kind()
                    ))),
                }
            }

            EditCommand::SetPreservesPitch { target, preserves } => {
                let slot = match target {
                    EntityRef::Clip(id) => self
                        .timeline
                        .clip_mut(id)
                        .map(|clip| &mut clip.preserves_pitch),
                    EntityRef::Audio(id) => self
                        .timeline
                        .audio_tracks_mut()
                        .get_mut(id)
                        .map(|track| &mut track.preserves_pitch),
                    other => {
                        return Err(CutlineError::InvalidParameter(format!(
                            "{} entities have no audio pitch",
                            other.kind()
                        )))
                    }
                };
                Ok(match slot {
                    Some(value) if *value != preserves => {
                        *value = preserves;
                        EditOutcome::changed()
                    }
                    _ => EditOutcome::Unchanged,
                })
            }

            EditCommand::SetMuted { id, muted } => Ok(match self.timeline.clip_mut(id) {
                Some(clip) if clip.audio.muted != muted => {
                    clip.audio.muted = muted;
                    EditOutcome::changed()
                }
                _ => EditOutcome::Unchanged,
            }),

            EditCommand::SetVolume { target, volume } => {
                if !volume.is_finite() {
                    return Err(CutlineError::InvalidParameter(format!(
                        "volume must be finite, got {volume}"
                    )));
                }
                let volume = volume.clamp(0.0, 1.0);
                let slot = match target {
                    EntityRef::Clip(id) => self.timeline.clip_mut(id).map(|clip| &mut clip.audio.volume),
                    EntityRef::Audio(id) => self
                        .timeline
                        .audio_tracks_mut()
                        .get_mut(id)
                        .map(|track| &mut track.volume),
                    other => {
                        return Err(CutlineError::InvalidParameter(format!(
                            "{} entities have no volume",
                            other.kind()
                        )))
                    }
                };
                Ok(match slot {
                    Some(value) if *value != volume => {
                        *value = volume;
                        EditOutcome::changed()
                    }
                    _ => EditOutcome::Unchanged,
                })
            }

            EditCommand::AddText { overlay } => {
                let entity = EntityRef::Text(overlay.id);
                self.check_new_schedule(entity, &overlay.schedule)?;
                self.timeline.text_overlays_mut().push(overlay);
                Ok(EditOutcome::created(smallvec![entity]))
            }

            EditCommand::AddMedia { overlay } => {
                let entity = EntityRef::Media(overlay.id);
                self.check_new_schedule(entity, &overlay.schedule)?;
                self.timeline.media_overlays_mut().push(overlay);
                Ok(EditOutcome::created(smallvec![entity]))
            }

            EditCommand::AddCaption { caption } => {
                let entity = EntityRef::Caption(caption.id);
                self.check_new_schedule(entity, &caption.schedule)?;
                self.timeline.captions_mut().push(caption);
                Ok(EditOutcome::created(smallvec![entity]))
            }

            EditCommand::AddAudioTrack { track } => {
                let entity = EntityRef::Audio(track.id);
                self.check_new_schedule(entity, &track.schedule)?;
                self.timeline.audio_tracks_mut().push(track);
                Ok(EditOutcome::created(smallvec![entity]))
            }

            EditCommand::ExtractAudio { id } => self.extract_audio(id),

            EditCommand::SetRenderConfig { config } => {
                if self.timeline.render == config {
                    return Ok(EditOutcome::Unchanged);
                }
                self.timeline.render = config;
                Ok(EditOutcome::changed())
            }
        }
    }

    fn check_new_clip(&self, clip: &Clip) -> Result<()> {
        if self.timeline.clip(clip.id).is_some() {
            return Err(CutlineError::InvalidParameter(format!(
                "clip {} is already on the timeline",
                clip.id
            )));
        }
        if clip.effective_duration() < self.min_length() {
            return Err(CutlineError::InvalidParameter(format!(
                "clip {} is shorter than {}",
                clip.id,
                self.min_length()
            )));
        }
        Ok(())
    }

    fn check_new_schedule(&self, entity: EntityRef, schedule: &Schedule) -> Result<()> {
        if self.timeline.contains(entity) {
            return Err(CutlineError::InvalidParameter(format!(
                "{entity} is already on the timeline"
            )));
        }
        if !schedule.is_valid(self.min_length()) || schedule.visible_start().is_negative() {
            return Err(CutlineError::InvalidParameter(format!(
                "{entity} has an invalid schedule: {schedule:?}"
            )));
        }
        Ok(())
    }

    fn delete(&mut self, target: EntityRef) -> EditOutcome {
        let timeline = &mut self.timeline;
        let removed = match target {
            EntityRef::Clip(id) => match timeline.clip_index(id) {
                Some(index) => {
                    timeline.clips_mut().remove(index);
                    true
                }
                None => false,
            },
            EntityRef::Text(id) => timeline.text_overlays_mut().remove(id).is_some(),
            EntityRef::Media(id) => timeline.media_overlays_mut().remove(id).is_some(),
            EntityRef::Caption(id) => timeline.captions_mut().remove(id).is_some(),
            EntityRef::Audio(id) => timeline.audio_tracks_mut().remove(id).is_some(),
        };
        if !removed {
            return EditOutcome::Unchanged;
        }
        self.retire(target);
        EditOutcome::Changed {
            created: SmallVec::new(),
            retired: smallvec![target],
        }
    }

    fn duplicate(&mut self, target: EntityRef) -> EditOutcome {
        let created = match target {
            EntityRef::Clip(id) => {
                let Some(index) = self.timeline.clip_index(id) else {
                    return EditOutcome::Unchanged;
                };
                let copy = self.timeline.clips()[index].with_id(self.ids.clip_id());
                let created = EntityRef::Clip(copy.id);
                self.timeline.clips_mut().insert(index + 1, copy);
                created
            }
            EntityRef::Text(id) => {
                let new_id = self.ids.overlay_id();
                if !duplicate_in_lane(self.timeline.text_overlays_mut(), id, new_id) {
                    return EditOutcome::Unchanged;
                }
                EntityRef::Text(new_id)
            }
            EntityRef::Media(id) => {
                let new_id = self.ids.overlay_id();
                if !duplicate_in_lane(self.timeline.media_overlays_mut(), id, new_id) {
                    return EditOutcome::Unchanged;
                }
                EntityRef::Media(new_id)
            }
            EntityRef::Caption(id) => {
                let new_id = self.ids.overlay_id();
                if !duplicate_in_lane(self.timeline.captions_mut(), id, new_id) {
                    return EditOutcome::Unchanged;
                }
                EntityRef::Caption(new_id)
            }
            EntityRef::Audio(id) => {
                let new_id = self.ids.audio_track_id();
                if !duplicate_in_lane(self.timeline.audio_tracks_mut(), id, new_id) {
                    return EditOutcome::Unchanged;
                }
                EntityRef::Audio(new_id)
            }
        };
        EditOutcome::created(smallvec![created])
    }

    fn extract_audio(&mut self, id: ClipId) -> Result<EditOutcome> {
        let Some(clip) = self.timeline.clip(id) else {
            return Ok(EditOutcome::Unchanged);
        };
        if !clip.has_audible_audio() {
            return Ok(EditOutcome::Unchanged);
        }
        let Some(start) = self.timeline.start_of(id) else {
            return Ok(EditOutcome::Unchanged);
        };

        let speed = clip.speed();
        let mut track = AudioTrack::new(self.ids.audio_track_id(), clip.source.clone(), start);
        track.set_speed(speed, self.min_length())?;
        track.schedule.trim_in = clip.trim_start() / speed;
        track.schedule.trim_out = clip.trim_end() / speed;
        track.schedule.move_visible_start_to(start);
        track.volume = clip.audio.volume;
        track.preserves_pitch = clip.preserves_pitch;
        track.extracted_from = Some(id);
        track.waveform = clip.waveform.clone();
        let entity = EntityRef::Audio(track.id);

        if let Some(clip) = self.timeline.clip_mut(id) {
            clip.audio.muted = true;
        }
        self.timeline.audio_tracks_mut().push(track);
        Ok(EditOutcome::created(smallvec![entity]))
    }
}
