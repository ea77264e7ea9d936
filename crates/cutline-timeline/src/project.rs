//! The project aggregate: clips, overlay lanes, render settings and the
//! editing state that goes with them.

use cutline_core::{CutlineError, FrameRate, RationalTime, Result, Size, TimeRange};
use serde::{Deserialize, Serialize};

use crate::audio::AudioTrack;
use crate::clip::{Clip, MediaSource, WaveformPeaks};
use crate::edit::UndoStack;
use crate::ids::{ClipId, EntityRef, IdFactory};
use crate::lane::{Lane, LaneEntity};
use crate::overlay::{Caption, MediaOverlay, Schedule, TextOverlay};
use crate::trim::TrimSession;

/// Slowest frame rate a composition is built at.
pub const MIN_COMPOSITION_RATE: FrameRate = FrameRate::FPS_24;
/// Fastest frame rate a composition is built at.
pub const MAX_COMPOSITION_RATE: FrameRate = FrameRate::FPS_60;
/// Frame rate of a project without clips.
pub const DEFAULT_COMPOSITION_RATE: FrameRate = FrameRate::FPS_30;

/// Target frame shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Use the first clip's upright shape
    Original,
    #[default]
    Portrait9x16,
    Landscape16x9,
    Square,
    Portrait4x5,
}

impl AspectRatio {
    /// `(width, height)` ratio terms, or `None` for `Original`.
    pub fn terms(self) -> Option<(f32, f32)> {
        match self {
            Self::Original => None,
            Self::Portrait9x16 => Some((9.0, 16.0)),
            Self::Landscape16x9 => Some((16.0, 9.0)),
            Self::Square => Some((1.0, 1.0)),
            Self::Portrait4x5 => Some((4.0, 5.0)),
        }
    }
}

/// How a source frame is fitted into the render frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Scale to cover, crop the overflow around the center
    #[default]
    Fill,
    /// Scale to fit entirely, letterbox the rest
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub aspect: AspectRatio,
    pub mode: RenderMode,
    /// Pixels along the longer side of the render frame
    pub long_edge: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            aspect: AspectRatio::default(),
            mode: RenderMode::default(),
            long_edge: 1920,
        }
    }
}

impl RenderConfig {
    /// Render frame size; `first` supplies the shape for `AspectRatio::Original`.
    pub fn render_size(&self, first: Option<&MediaSource>) -> Size {
        let (w, h) = match (self.aspect.terms(), first) {
            (Some(terms), _) => terms,
            (None, Some(source)) => {
                let size = source.oriented_size();
                if size.is_empty() {
                    (16.0, 9.0)
                } else {
                    (size.width, size.height)
                }
            }
            (None, None) => (16.0, 9.0),
        };
        let long = self.long_edge as f32;
        let even = |v: f32| (v / 2.0).round() * 2.0;
        if w >= h {
            Size::new(long, even(long * h / w))
        } else {
            Size::new(even(long * w / h), long)
        }
    }
}

/// Clips, lanes and render settings. Everything derived from it (total
/// duration, absolute starts, frame rate) is computed on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    clips: Vec<Clip>,
    text_overlays: Lane<TextOverlay>,
    media_overlays: Lane<MediaOverlay>,
    captions: Lane<Caption>,
    audio_tracks: Lane<AudioTrack>,
    pub render: RenderConfig,
}

impl Timeline {
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    pub fn clip_index(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|clip| clip.id == id)
    }

    pub fn text_overlays(&self) -> &Lane<TextOverlay> {
        &self.text_overlays
    }

    pub fn media_overlays(&self) -> &Lane<MediaOverlay> {
        &self.media_overlays
    }

    pub fn captions(&self) -> &Lane<Caption> {
        &self.captions
    }

    pub fn audio_tracks(&self) -> &Lane<AudioTrack> {
        &self.audio_tracks
    }

    /// Sum of clip effective durations.
    pub fn total_duration(&self) -> RationalTime {
        self.clips.iter().map(Clip::effective_duration).sum()
    }

    /// Absolute start of a clip: the effective durations of every clip before it.
    pub fn start_of(&self, id: ClipId) -> Option<RationalTime> {
        let index = self.clip_index(id)?;
        Some(self.clips[..index].iter().map(Clip::effective_duration).sum())
    }

    /// Absolute timeline range of a clip.
    pub fn clip_range(&self, id: ClipId) -> Option<TimeRange> {
        let start = self.start_of(id)?;
        let clip = self.clip(id)?;
        Some(TimeRange::new(start, clip.effective_duration()))
    }

    /// Fastest nominal clip rate, clamped to the composition range.
    pub fn frame_rate(&self) -> FrameRate {
        self.clips
            .iter()
            .map(|clip| clip.source.frame_rate)
            .reduce(FrameRate::max_fps)
            .map(|rate| rate.clamp_fps(MIN_COMPOSITION_RATE, MAX_COMPOSITION_RATE))
            .unwrap_or(DEFAULT_COMPOSITION_RATE)
    }

    pub fn frame_duration(&self) -> RationalTime {
        self.frame_rate().frame_duration()
    }

    /// Whether `entity` exists.
    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Clip(id) => self.clip(id).is_some(),
            EntityRef::Text(id) => self.text_overlays.contains(id),
            EntityRef::Media(id) => self.media_overlays.contains(id),
            EntityRef::Caption(id) => self.captions.contains(id),
            EntityRef::Audio(id) => self.audio_tracks.contains(id),
        }
    }

    /// Every entity in the timeline.
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut out: Vec<EntityRef> = self.clips.iter().map(|c| EntityRef::Clip(c.id)).collect();
        out.extend(self.text_overlays.ids().into_iter().map(EntityRef::Text));
        out.extend(self.media_overlays.ids().into_iter().map(EntityRef::Media));
        out.extend(self.captions.ids().into_iter().map(EntityRef::Caption));
        out.extend(self.audio_tracks.ids().into_iter().map(EntityRef::Audio));
        out
    }

    /// Check the trim invariants of every entity against `min_visible`.
    pub fn check_invariants(&self, min_visible: RationalTime) -> Result<()> {
        for clip in &self.clips {
            let ok = !clip.trim_start().is_negative()
                && clip.trim_start() < clip.trim_end()
                && clip.trim_end() <= clip.native_duration()
                && clip.effective_duration() >= min_visible;
            if !ok {
                return Err(CutlineError::Timeline(format!(
                    "clip {} violates trim invariants: {}..{} of {}",
                    clip.id,
                    clip.trim_start(),
                    clip.trim_end(),
                    clip.native_duration()
                )));
            }
        }
        let schedules = self
            .text_overlays
            .iter()
            .map(|e| (EntityRef::Text(e.id), e.schedule))
            .chain(self.media_overlays.iter().map(|e| (EntityRef::Media(e.id), e.schedule)))
            .chain(self.captions.iter().map(|e| (EntityRef::Caption(e.id), e.schedule)))
            .chain(self.audio_tracks.iter().map(|e| (EntityRef::Audio(e.id), e.schedule)));
        for (entity, schedule) in schedules {
            if !schedule.is_valid(min_visible) {
                return Err(CutlineError::Timeline(format!(
                    "{entity} violates trim invariants: {schedule:?}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn clips_mut(&mut self) -> &mut Vec<Clip> {
        &mut self.clips
    }

    pub(crate) fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|clip| clip.id == id)
    }

    pub(crate) fn text_overlays_mut(&mut self) -> &mut Lane<TextOverlay> {
        &mut self.text_overlays
    }

    pub(crate) fn media_overlays_mut(&mut self) -> &mut Lane<MediaOverlay> {
        &mut self.media_overlays
    }

    pub(crate) fn captions_mut(&mut self) -> &mut Lane<Caption> {
        &mut self.captions
    }

    pub(crate) fn audio_tracks_mut(&mut self) -> &mut Lane<AudioTrack> {
        &mut self.audio_tracks
    }

    /// Schedule of a lane entity; `None` for clips and unknown ids.
    pub(crate) fn lane_schedule_mut(&mut self, entity: EntityRef) -> Option<&mut Schedule> {
        match entity {
            EntityRef::Clip(_) => None,
            EntityRef::Text(id) => self.text_overlays.get_mut(id).map(LaneEntity::schedule_mut),
            EntityRef::Media(id) => self.media_overlays.get_mut(id).map(LaneEntity::schedule_mut),
            EntityRef::Caption(id) => self.captions.get_mut(id).map(LaneEntity::schedule_mut),
            EntityRef::Audio(id) => self.audio_tracks.get_mut(id).map(LaneEntity::schedule_mut),
        }
    }
}

/// What the editor is doing. Selection lives here, so at most one entity
/// can ever be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EditMode {
    #[default]
    None,
    /// The next picked media is inserted at the playhead
    Insert,
    Edit(EntityRef),
    /// The annotation editor owns input
    Draw,
}

impl EditMode {
    pub fn selection(&self) -> Option<EntityRef> {
        match self {
            Self::Edit(entity) => Some(*entity),
            Self::None | Self::Insert | Self::Draw => None,
        }
    }
}

/// Tunables for editing.
#[derive(Debug, Clone, Copy)]
pub struct ProjectConfig {
    /// Shortest visible length a trim may leave, before frame rounding
    pub min_trim_floor: RationalTime,
    /// Undo history depth
    pub undo_depth: usize,
    /// Longest a photo clip may be stretched to by its right handle
    pub max_still_duration: RationalTime,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            min_trim_floor: RationalTime::millis(30),
            undo_depth: 200,
            max_still_duration: RationalTime::seconds(60),
        }
    }
}

/// The aggregate root. All structural mutation goes through
/// [`Project::apply`] and the trim session methods.
#[derive(Debug)]
pub struct Project {
    pub(crate) timeline: Timeline,
    pub(crate) ids: IdFactory,
    pub(crate) mode: EditMode,
    pub(crate) trim: Option<TrimSession>,
    pub(crate) history: UndoStack,
    pub(crate) config: ProjectConfig,
}

impl Project {
    /// Create an empty project whose identities cancel against `ids`' registry.
    pub fn new(ids: IdFactory) -> Self {
        Self::with_config(ids, ProjectConfig::default())
    }

    pub fn with_config(ids: IdFactory, config: ProjectConfig) -> Self {
        Self {
            timeline: Timeline::default(),
            ids,
            mode: EditMode::None,
            trim: None,
            history: UndoStack::new(config.undo_depth),
            config,
        }
    }

    /// Adopt an existing timeline, e.g. one loaded from an export manifest.
    pub fn from_timeline(ids: IdFactory, timeline: Timeline) -> Self {
        Self {
            timeline,
            ..Self::new(ids)
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn ids(&self) -> &IdFactory {
        &self.ids
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn total_duration(&self) -> RationalTime {
        self.timeline.total_duration()
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.timeline.frame_rate()
    }

    /// Shortest visible length any entity may be trimmed to: the floor
    /// rounded up to whole frames, and never less than one frame.
    pub fn min_length(&self) -> RationalTime {
        let rate = self.timeline.frame_rate();
        let frame = rate.frame_duration();
        let floor = self.config.min_trim_floor.max(frame);
        let frames = floor.to_frames(rate);
        let snapped = RationalTime::from_frames(frames, rate);
        if snapped < floor {
            RationalTime::from_frames(frames + 1, rate)
        } else {
            snapped
        }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn selection(&self) -> Option<EntityRef> {
        self.mode.selection()
    }

    /// Switch modes. Selecting an entity that does not exist is rejected.
    pub fn set_mode(&mut self, mode: EditMode) -> Result<()> {
        if let EditMode::Edit(entity) = mode {
            if !self.timeline.contains(entity) {
                return Err(CutlineError::NotFound(entity.to_string()));
            }
        }
        self.mode = mode;
        Ok(())
    }

    /// Select an entity, or clear the selection with `None`.
    pub fn select(&mut self, entity: Option<EntityRef>) -> Result<()> {
        self.set_mode(entity.map_or(EditMode::None, EditMode::Edit))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ── Entity factories ───────────────────────────────────────

    /// A new clip over the whole of `source`, not yet placed.
    pub fn make_clip(&self, source: MediaSource) -> Clip {
        Clip::new(self.ids.clip_id(), source)
    }

    pub fn make_text(
        &self,
        text: impl Into<String>,
        start: RationalTime,
        duration: RationalTime,
    ) -> TextOverlay {
        TextOverlay::new(self.ids.overlay_id(), text, Schedule::new(start, duration))
    }

    pub fn make_caption(
        &self,
        text: impl Into<String>,
        start: RationalTime,
        duration: RationalTime,
    ) -> Caption {
        Caption::new(self.ids.overlay_id(), text, Schedule::new(start, duration))
    }

    pub fn make_media_overlay(
        &self,
        source: MediaSource,
        start: RationalTime,
        nominal: RationalTime,
    ) -> MediaOverlay {
        MediaOverlay::new(self.ids.overlay_id(), source, start, nominal)
    }

    pub fn make_audio_track(&self, source: MediaSource, start: RationalTime) -> AudioTrack {
        AudioTrack::new(self.ids.audio_track_id(), source, start)
    }

    /// Cache decoded waveform peaks on a clip or audio track. Not an edit:
    /// history is untouched. Returns false if the entity is gone.
    pub fn attach_waveform(&mut self, entity: EntityRef, peaks: WaveformPeaks) -> bool {
        match entity {
            EntityRef::Clip(id) => self
                .timeline
                .clip_mut(id)
                .map(|clip| clip.waveform = Some(peaks))
                .is_some(),
            EntityRef::Audio(id) => self
                .timeline
                .audio_tracks_mut()
                .get_mut(id)
                .map(|track| track.waveform = Some(peaks))
                .is_some(),
            _ => false,
        }
    }

    /// Retire an identity that is leaving the timeline and drop it from the
    /// selection.
    pub(crate) fn retire(&mut self, entity: EntityRef) {
        self.ids.retire(entity);
        if self.mode.selection() == Some(entity) {
            self.mode = EditMode::None;
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(IdFactory::default())
    }
}
