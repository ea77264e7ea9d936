//! Still-frame extraction and asset probing seams.

use cutline_core::{RationalTime, Result, Size};
use cutline_timeline::MediaSource;
use std::sync::Arc;

/// A decoded preview image.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    /// Source time the frame was taken from
    pub source_time: RationalTime,
    /// RGBA8 pixels, row-major
    pub pixels: Arc<[u8]>,
}

/// Decodes single frames for the thumbnail strip.
pub trait FrameExtractor: Send + Sync {
    /// Frame of `source` at `at`, scaled to fit `max_size`. `None` when the
    /// frame cannot be decoded.
    fn extract(&self, source: &MediaSource, at: RationalTime, max_size: Size) -> Option<Thumbnail>;
}

/// Describes imported assets.
pub trait AssetProber: Send + Sync {
    /// Inspect `uri` and describe it as a media source.
    fn probe(&self, uri: &str) -> Result<MediaSource>;
}
