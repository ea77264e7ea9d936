//! What the UI sees of the editor.

use cutline_core::{FrameRate, RationalTime};
use cutline_timeline::{EditMode, EntityRef};
use serde::Serialize;

use crate::controller::{FollowMode, PlaybackState};

/// A consistent read of the editor state, published over a `watch` channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EditorSnapshot {
    pub display_time: RationalTime,
    pub total_duration: RationalTime,
    pub frame_rate: FrameRate,
    pub playback: PlaybackState,
    pub follow: FollowMode,
    pub mode: EditMode,
    /// Target of the open trim gesture
    pub trimming: Option<EntityRef>,
    pub scrubbing: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub zoom: f32,
    pub clip_count: usize,
    /// Composition revision
    pub revision: u64,
}
