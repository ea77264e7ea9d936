//! Clip types for the main track.

use cutline_core::{
    CutlineError, FrameRate, Orientation, RationalTime, Result, Size, Speed, TimeRange,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ids::ClipId;

/// Kind of visual media behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Photo,
}

/// Description of a decodable media source, as reported by the asset prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Location understood by the playback engine
    pub uri: String,
    pub kind: MediaKind,
    /// Native duration of the source material
    pub duration: RationalTime,
    /// Nominal frame rate of the video track
    pub frame_rate: FrameRate,
    /// Stored pixel size, before orientation is applied
    pub natural_size: Size,
    pub orientation: Orientation,
    /// Whether the source carries an audio track
    pub has_audio: bool,
}

impl MediaSource {
    /// A landscape 1080p, 30 fps video source with audio.
    pub fn video(uri: impl Into<String>, duration: RationalTime) -> Self {
        Self {
            uri: uri.into(),
            kind: MediaKind::Video,
            duration,
            frame_rate: FrameRate::FPS_30,
            natural_size: Size::new(1920.0, 1080.0),
            orientation: Orientation::Up,
            has_audio: true,
        }
    }

    /// A still image shown for a nominal duration.
    pub fn photo(uri: impl Into<String>, duration: RationalTime) -> Self {
        Self {
            uri: uri.into(),
            kind: MediaKind::Photo,
            duration,
            frame_rate: FrameRate::FPS_30,
            natural_size: Size::new(1080.0, 1080.0),
            orientation: Orientation::Up,
            has_audio: false,
        }
    }

    /// Size as displayed, with orientation applied.
    pub fn oriented_size(&self) -> Size {
        self.orientation.oriented_size(self.natural_size)
    }
}

/// Settings for a clip's embedded audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedAudio {
    pub muted: bool,
    /// Linear gain, 0.0..=1.0
    pub volume: f32,
}

impl Default for EmbeddedAudio {
    fn default() -> Self {
        Self {
            muted: false,
            volume: 1.0,
        }
    }
}

/// Downsampled amplitude envelope, filled lazily by the waveform provider.
pub type WaveformPeaks = Arc<[f32]>;

/// A clip on the main track.
///
/// A clip has no stored position: its absolute start is the sum of the
/// effective durations of the clips before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub source: MediaSource,
    /// Source in point
    trim_start: RationalTime,
    /// Source out point (exclusive)
    trim_end: RationalTime,
    speed: Speed,
    /// Keep pitch when speed is not 1x
    pub preserves_pitch: bool,
    pub audio: EmbeddedAudio,
    #[serde(skip)]
    pub waveform: Option<WaveformPeaks>,
}

impl Clip {
    /// Create a clip covering the whole source.
    pub fn new(id: ClipId, source: MediaSource) -> Self {
        let trim_end = source.duration;
        let audio = EmbeddedAudio {
            muted: !source.has_audio,
            ..EmbeddedAudio::default()
        };
        Self {
            id,
            source,
            trim_start: RationalTime::ZERO,
            trim_end,
            speed: Speed::NORMAL,
            preserves_pitch: true,
            audio,
            waveform: None,
        }
    }

    /// Copy every field except identity.
    pub fn with_id(&self, id: ClipId) -> Self {
        Self { id, ..self.clone() }
    }

    pub fn trim_start(&self) -> RationalTime {
        self.trim_start
    }

    pub fn trim_end(&self) -> RationalTime {
        self.trim_end
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Native duration of the source.
    pub fn native_duration(&self) -> RationalTime {
        self.source.duration
    }

    /// Length of the selected source range.
    pub fn trimmed_duration(&self) -> RationalTime {
        self.trim_end - self.trim_start
    }

    /// What actually elapses on the timeline.
    pub fn effective_duration(&self) -> RationalTime {
        self.trimmed_duration() / self.speed
    }

    /// Selected source range.
    pub fn source_range(&self) -> TimeRange {
        TimeRange::from_start_end(self.trim_start, self.trim_end)
    }

    /// Whether embedded audio contributes to the mix.
    pub fn has_audible_audio(&self) -> bool {
        self.source.has_audio && !self.audio.muted
    }

    /// Set the source range. Rejects ranges outside `0 ≤ start < end ≤ native`.
    pub fn set_trim(&mut self, start: RationalTime, end: RationalTime) -> Result<()> {
        if start.is_negative() || start >= end || end > self.native_duration() {
            return Err(CutlineError::InvalidParameter(format!(
                "trim {start}..{end} outside source of {}",
                self.native_duration()
            )));
        }
        self.trim_start = start;
        self.trim_end = end;
        Ok(())
    }

    /// Stretch or shrink a still's nominal duration. Only photo sources have
    /// one, and it may not cut into the selected range.
    pub fn set_still_duration(&mut self, duration: RationalTime) -> Result<()> {
        if self.source.kind != MediaKind::Photo {
            return Err(CutlineError::InvalidParameter(format!(
                "{} is not a still",
                self.source.uri
            )));
        }
        if duration < self.trim_end {
            return Err(CutlineError::InvalidParameter(format!(
                "still duration {duration} ends before trim end {}",
                self.trim_end
            )));
        }
        self.source.duration = duration;
        Ok(())
    }

    /// Change speed, refusing values that would shrink the clip below `min_effective`.
    pub fn set_speed(&mut self, speed: Speed, min_effective: RationalTime) -> Result<()> {
        if self.trimmed_duration() / speed < min_effective {
            return Err(CutlineError::InvalidParameter(format!(
                "speed {speed} leaves less than {min_effective} on the timeline"
            )));
        }
        self.speed = speed;
        Ok(())
    }
}
