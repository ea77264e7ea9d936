//! Cutline Timeline - Timeline data model
//!
//! Implements the editable timeline behind the editor:
//! - An ordered main track of trimmed, retimed clips
//! - Id-keyed overlay lanes (text, media, captions, audio)
//! - Gesture-scoped trimming and playhead splitting
//! - Edit commands with snapshot undo/redo
//! - A versioned export manifest

pub mod audio;
pub mod clip;
pub mod edit;
pub mod ids;
pub mod lane;
pub mod overlay;
pub mod project;
pub mod serialization;
pub mod split;
pub mod trim;

pub use audio::AudioTrack;
pub use clip::{Clip, EmbeddedAudio, MediaKind, MediaSource, WaveformPeaks};
pub use edit::{EditCommand, EditOutcome, UndoStack};
pub use ids::{
    AudioTrackId, ClipId, EntityRef, IdFactory, OverlayId, WorkKey, WorkKind, WorkRegistry,
    WorkTicket,
};
pub use lane::{Lane, LaneEntity};
pub use overlay::{Caption, MediaOverlay, OverlayTransform, Schedule, TextOverlay, TextStyle};
pub use project::{
    AspectRatio, EditMode, Project, ProjectConfig, RenderConfig, RenderMode, Timeline,
};
pub use serialization::{ExportManifest, ResolvedClip, ResolvedWindow, CURRENT_VERSION};
pub use split::{locate, InsertOutcome, PlayheadHit, SplitOutcome};
pub use trim::{trim_schedule, EdgeRule, TrimLimits, TrimOutcome, TrimPolicy, TrimSession};
