//! Time-scheduled overlays: text, media and captions.

use cutline_core::{RationalTime, TimeRange, Transform2D, Vec2};
use serde::{Deserialize, Serialize};

use crate::clip::{MediaKind, MediaSource};
use crate::ids::OverlayId;
use crate::lane::LaneEntity;
use crate::trim::TrimPolicy;

/// Absolute placement of a lane entity.
///
/// `duration` is the nominal length of the entity; `[trim_in, trim_out)` is
/// the part of it that is shown, so the entity is visible on the timeline
/// over `[start + trim_in, start + trim_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub start: RationalTime,
    pub duration: RationalTime,
    pub trim_in: RationalTime,
    pub trim_out: RationalTime,
}

impl Schedule {
    /// Untrimmed schedule.
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self {
            start,
            duration,
            trim_in: RationalTime::ZERO,
            trim_out: duration,
        }
    }

    pub fn visible_start(&self) -> RationalTime {
        self.start + self.trim_in
    }

    pub fn visible_end(&self) -> RationalTime {
        self.start + self.trim_out
    }

    pub fn visible_duration(&self) -> RationalTime {
        self.trim_out - self.trim_in
    }

    pub fn visible_range(&self) -> TimeRange {
        TimeRange::from_start_end(self.visible_start(), self.visible_end())
    }

    /// Move so the visible window starts at `visible_start` (floored at zero).
    pub fn move_visible_start_to(&mut self, visible_start: RationalTime) {
        let visible_start = visible_start.max(RationalTime::ZERO);
        self.start = visible_start - self.trim_in;
    }

    /// `0 ≤ trim_in < trim_out ≤ duration` and at least `min_visible` shown.
    pub fn is_valid(&self, min_visible: RationalTime) -> bool {
        !self.trim_in.is_negative()
            && self.trim_in < self.trim_out
            && self.trim_out <= self.duration
            && self.visible_duration() >= min_visible
    }
}

/// Placement of a media overlay on the canvas, in normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayTransform {
    /// Center position, (0,0) top-left to (1,1) bottom-right
    pub position: Vec2,
    pub scale: f32,
    /// Radians, clockwise
    pub rotation: f32,
}

impl OverlayTransform {
    /// Affine transform for a render canvas of `canvas` pixels, applied to
    /// a layer whose upright size is `layer`.
    pub fn to_affine(&self, layer: cutline_core::Size, canvas: cutline_core::Size) -> Transform2D {
        let center = Vec2::new(layer.width * 0.5, layer.height * 0.5);
        let target = Vec2::new(
            self.position.x * canvas.width,
            self.position.y * canvas.height,
        );
        Transform2D::translate(-center.x, -center.y)
            .then(Transform2D::from_trs(target, self.rotation, Vec2::splat(self.scale)))
    }
}

impl Default for OverlayTransform {
    fn default() -> Self {
        Self {
            position: Vec2::new(0.5, 0.5),
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

/// Text styling carried through to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font: String,
    pub size: f32,
    pub color: [u8; 4],
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: "System".into(),
            size: 48.0,
            color: [255, 255, 255, 255],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub id: OverlayId,
    pub text: String,
    pub style: TextStyle,
    pub transform: OverlayTransform,
    pub schedule: Schedule,
}

impl TextOverlay {
    pub fn new(id: OverlayId, text: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id,
            text: text.into(),
            style: TextStyle::default(),
            transform: OverlayTransform::default(),
            schedule,
        }
    }
}

/// A secondary photo or video layered over the main track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaOverlay {
    pub id: OverlayId,
    pub source: MediaSource,
    pub transform: OverlayTransform,
    pub schedule: Schedule,
}

impl MediaOverlay {
    /// Place `source` at `start`. Video overlays span their native duration;
    /// photos use `nominal` instead.
    pub fn new(
        id: OverlayId,
        source: MediaSource,
        start: RationalTime,
        nominal: RationalTime,
    ) -> Self {
        let duration = match source.kind {
            MediaKind::Video => source.duration,
            MediaKind::Photo => nominal,
        };
        Self {
            id,
            source,
            transform: OverlayTransform::default(),
            schedule: Schedule::new(start, duration),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.source.kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub id: OverlayId,
    pub text: String,
    pub schedule: Schedule,
}

impl Caption {
    pub fn new(id: OverlayId, text: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id,
            text: text.into(),
            schedule,
        }
    }
}

impl LaneEntity for TextOverlay {
    type Id = OverlayId;

    fn id(&self) -> OverlayId {
        self.id
    }
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }
    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }
    fn trim_policy(&self) -> TrimPolicy {
        TrimPolicy::EXTENSIBLE
    }
    fn with_id(&self, id: OverlayId) -> Self {
        Self { id, ..self.clone() }
    }
}

impl LaneEntity for MediaOverlay {
    type Id = OverlayId;

    fn id(&self) -> OverlayId {
        self.id
    }
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }
    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }
    fn trim_policy(&self) -> TrimPolicy {
        match self.kind() {
            MediaKind::Video => TrimPolicy::SOURCE_BOUNDED,
            MediaKind::Photo => TrimPolicy::EXTENSIBLE,
        }
    }
    fn with_id(&self, id: OverlayId) -> Self {
        Self { id, ..self.clone() }
    }
}

impl LaneEntity for Caption {
    type Id = OverlayId;

    fn id(&self) -> OverlayId {
        self.id
    }
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }
    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }
    fn trim_policy(&self) -> TrimPolicy {
        TrimPolicy::EXTENSIBLE
    }
    fn with_id(&self, id: OverlayId) -> Self {
        Self { id, ..self.clone() }
    }
}
