//! Translation of a timeline into a renderable multi-track composition.
//!
//! Building is a pure function of the timeline: equal timelines produce
//! equal compositions, so the editor simply rebuilds after every
//! structural edit.

use cutline_core::{FrameRate, RationalTime, Size, Speed, TimeRange, Transform2D};
use cutline_timeline::{
    AudioTrackId, ClipId, MediaKind, MediaSource, OverlayId, RenderMode, Timeline,
};
use tracing::debug;

/// One clip's placement on the concatenated video track.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSegment {
    pub clip: ClipId,
    pub uri: String,
    pub kind: MediaKind,
    pub source_range: TimeRange,
    pub timeline_range: TimeRange,
    /// Source range is scaled to fill `timeline_range` when not 1x
    pub speed: Speed,
    /// Natural frame pixels to render-frame pixels
    pub transform: Transform2D,
}

/// Where an audio segment comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOrigin {
    /// Embedded audio of a main-track clip
    Clip(ClipId),
    Track(AudioTrackId),
}

/// One audio track of the composition.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub origin: AudioOrigin,
    pub uri: String,
    pub source_range: TimeRange,
    pub timeline_range: TimeRange,
    pub speed: Speed,
    pub preserves_pitch: bool,
    pub volume: f32,
}

/// A video overlay layered over the main track.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayVideoTrack {
    pub overlay: OverlayId,
    pub uri: String,
    pub source_range: TimeRange,
    pub timeline_range: TimeRange,
    pub transform: Transform2D,
}

/// The structure handed to playback and export.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub duration: RationalTime,
    pub frame_rate: FrameRate,
    pub render_size: Size,
    pub video: Vec<VideoSegment>,
    pub audio: Vec<AudioSegment>,
    pub overlays: Vec<OverlayVideoTrack>,
}

impl Composition {
    /// A composition with nothing in it.
    pub fn empty(frame_rate: FrameRate, render_size: Size) -> Self {
        Self {
            duration: RationalTime::ZERO,
            frame_rate,
            render_size,
            video: Vec::new(),
            audio: Vec::new(),
            overlays: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_empty()
    }

    /// Video segment playing at `time`.
    pub fn segment_at(&self, time: RationalTime) -> Option<&VideoSegment> {
        self.video
            .iter()
            .find(|segment| segment.timeline_range.contains(time))
    }
}

/// Place an upright, scaled copy of `source` in a `render` frame.
///
/// Fill scales to cover and crops around the center; fit scales to contain
/// and letterboxes.
pub fn fit_transform(source: &MediaSource, render: Size, mode: RenderMode) -> Transform2D {
    let oriented = source.oriented_size();
    if oriented.is_empty() || render.is_empty() {
        return Transform2D::IDENTITY;
    }
    let sx = render.width / oriented.width;
    let sy = render.height / oriented.height;
    let scale = match mode {
        RenderMode::Fill => sx.max(sy),
        RenderMode::Fit => sx.min(sy),
    };
    let dx = (render.width - oriented.width * scale) * 0.5;
    let dy = (render.height - oriented.height * scale) * 0.5;
    source
        .orientation
        .preferred_transform(source.natural_size)
        .then(Transform2D::scale_uniform(scale))
        .then(Transform2D::translate(dx, dy))
}

/// Builds a [`Composition`] from a timeline.
pub struct CompositionBuilder<'a> {
    timeline: &'a Timeline,
}

impl<'a> CompositionBuilder<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self { timeline }
    }

    pub fn build(&self) -> Composition {
        let timeline = self.timeline;
        let render = timeline.render;
        let render_size = render.render_size(timeline.clips().first().map(|c| &c.source));
        let mut composition = Composition::empty(timeline.frame_rate(), render_size);
        if timeline.clips().is_empty() {
            debug!("Built empty composition");
            return composition;
        }

        let mut start = RationalTime::ZERO;
        for clip in timeline.clips() {
            let effective = clip.effective_duration();
            composition.video.push(VideoSegment {
                clip: clip.id,
                uri: clip.source.uri.clone(),
                kind: clip.source.kind,
                source_range: clip.source_range(),
                timeline_range: TimeRange::new(start, effective),
                speed: clip.speed(),
                transform: fit_transform(&clip.source, render_size, render.mode),
            });

            if clip.has_audible_audio() {
                // Embedded audio is not retimed; it stops at the clip's end
                let length = clip.trimmed_duration().min(effective);
                composition.audio.push(AudioSegment {
                    origin: AudioOrigin::Clip(clip.id),
                    uri: clip.source.uri.clone(),
                    source_range: TimeRange::new(clip.trim_start(), length),
                    timeline_range: TimeRange::new(start, length),
                    speed: Speed::NORMAL,
                    preserves_pitch: clip.preserves_pitch,
                    volume: clip.audio.volume,
                });
            }
            start += effective;
        }
        let end = start;
        composition.duration = end;

        for track in timeline.audio_tracks().iter() {
            let Some(window) = track.schedule.visible_range().truncate_to(end) else {
                continue;
            };
            let speed = track.speed();
            composition.audio.push(AudioSegment {
                origin: AudioOrigin::Track(track.id),
                uri: track.source.uri.clone(),
                source_range: TimeRange::new(track.source_in(), window.duration * speed),
                timeline_range: window,
                speed,
                preserves_pitch: track.preserves_pitch,
                volume: track.volume,
            });
        }

        for overlay in timeline.media_overlays().iter() {
            if overlay.kind() != MediaKind::Video {
                continue;
            }
            let Some(window) = overlay.schedule.visible_range().truncate_to(end) else {
                continue;
            };
            let source = &overlay.source;
            let upright = source.orientation.preferred_transform(source.natural_size);
            let placed = overlay
                .transform
                .to_affine(source.oriented_size(), render_size);
            composition.overlays.push(OverlayVideoTrack {
                overlay: overlay.id,
                uri: source.uri.clone(),
                source_range: TimeRange::new(overlay.schedule.trim_in, window.duration),
                timeline_range: window,
                transform: upright.then(placed),
            });
        }

        debug!(
            duration = %composition.duration,
            video = composition.video.len(),
            audio = composition.audio.len(),
            overlays = composition.overlays.len(),
            "Built composition"
        );
        composition
    }
}
