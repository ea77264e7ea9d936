//! The playback engine seam.

use cutline_core::RationalTime;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::composition::Composition;

/// How the engine resolves seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Frame-accurate, may be slow
    #[default]
    Standard,
    /// Nearest cheaply decodable frame, for interactive scrubbing
    LowLatency,
}

/// Completion of one seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOutcome {
    pub target: RationalTime,
    /// Where playback actually ended up
    pub landed: RationalTime,
    /// False when a later seek interrupted this one
    pub finished: bool,
}

/// A platform playback engine presenting a [`Composition`].
///
/// Implementations are internally synchronized; every method may be called
/// from the owning context without holding a lock.
pub trait PlaybackEngine: Send + Sync {
    /// Swap the presented composition. Playback position is undefined
    /// afterwards until the next seek lands.
    fn replace_composition(&self, composition: Arc<Composition>);

    fn play(&self);

    fn pause(&self);

    /// Current presentation time.
    fn current_time(&self) -> RationalTime;

    fn set_seek_mode(&self, mode: SeekMode);

    /// Seek to `target`, accepting any frame within `tolerance`. Zero
    /// tolerance requests a precise seek.
    fn seek(&self, target: RationalTime, tolerance: RationalTime) -> oneshot::Receiver<SeekOutcome>;
}
