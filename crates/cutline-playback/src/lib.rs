//! Cutline Playback - The interactive editor runtime
//!
//! This crate provides:
//! - Transport state with gated per-frame time readout
//! - The scrub state machine with paced seeks and a precise commit
//! - `Editor`, the single owning context for all mutation
//! - `EditorHandle`, an actor front-end publishing `EditorSnapshot`s

pub mod controller;
pub mod editor;
pub mod handle;
pub mod scrub;
pub mod snapshot;

pub use controller::{FollowMode, PlaybackController, PlaybackGates, PlaybackState};
pub use editor::{Editor, EditorConfig, MediaServices, MAX_ZOOM, MIN_ZOOM};
pub use handle::EditorHandle;
pub use scrub::{CommitVerdict, ScrubController, ScrubPhase, ScrubSession};
pub use snapshot::EditorSnapshot;
