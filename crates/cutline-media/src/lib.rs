//! Cutline Media - Everything between the timeline and the platform
//!
//! This crate handles:
//! - Building engine compositions from a timeline
//! - The playback engine, frame extractor and asset prober seams
//! - Progressive thumbnail strips and waveform peaks
//! - Deterministic in-process collaborators for headless use

pub mod composition;
pub mod engine;
pub mod extract;
pub mod sim;
pub mod thumbnails;
pub mod waveform;

pub use composition::{
    fit_transform, AudioOrigin, AudioSegment, Composition, CompositionBuilder, OverlayVideoTrack,
    VideoSegment,
};
pub use engine::{PlaybackEngine, SeekMode, SeekOutcome};
pub use extract::{AssetProber, FrameExtractor, Thumbnail};
pub use sim::{SeekFault, SeekRecord, SimEngine, SimExtractor, SimProber, SimWaveforms};
pub use thumbnails::{
    sample_times, slot_count, ClipStrip, MAX_SLOTS_PER_CLIP, ThumbnailConfig, ThumbnailPipeline, ThumbnailUpdate,
};
pub use waveform::{
    downsample_peaks, samples_per_bucket, CachedWaveforms, WaveformProvider,
    DEFAULT_BUCKETS_PER_SECOND,
};
