//! User-added audio tracks.

use cutline_core::{CutlineError, RationalTime, Result, Speed};
use serde::{Deserialize, Serialize};

use crate::clip::{MediaSource, WaveformPeaks};
use crate::ids::{AudioTrackId, ClipId};
use crate::lane::LaneEntity;
use crate::overlay::Schedule;
use crate::trim::TrimPolicy;

/// An audio bed, voice-over or extracted clip audio.
///
/// The schedule is kept in timeline units: `duration` is the native source
/// duration divided by `speed`, and trims are offsets into that span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    pub id: AudioTrackId,
    pub source: MediaSource,
    pub schedule: Schedule,
    pub volume: f32,
    speed: Speed,
    pub preserves_pitch: bool,
    /// Clip this track was extracted from. Relation only; the clip may be gone.
    pub extracted_from: Option<ClipId>,
    #[serde(skip)]
    pub waveform: Option<WaveformPeaks>,
}

impl AudioTrack {
    /// Place the whole of `source` at `start`.
    pub fn new(id: AudioTrackId, source: MediaSource, start: RationalTime) -> Self {
        let schedule = Schedule::new(start, source.duration);
        Self {
            id,
            source,
            schedule,
            volume: 1.0,
            speed: Speed::NORMAL,
            preserves_pitch: true,
            extracted_from: None,
            waveform: None,
        }
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Source offset where the audible window begins.
    pub fn source_in(&self) -> RationalTime {
        self.schedule.trim_in * self.speed
    }

    /// Change speed, rescaling the schedule so the same source range stays
    /// selected and starts at the same timeline position.
    pub fn set_speed(&mut self, speed: Speed, min_visible: RationalTime) -> Result<()> {
        let source_in = self.schedule.trim_in * self.speed;
        let source_out = self.schedule.trim_out * self.speed;
        if (source_out - source_in) / speed < min_visible {
            return Err(CutlineError::InvalidParameter(format!(
                "speed {speed} leaves less than {min_visible} of audio"
            )));
        }
        let visible_start = self.schedule.visible_start();
        self.speed = speed;
        self.schedule.duration = self.source.duration / speed;
        self.schedule.trim_in = source_in / speed;
        self.schedule.trim_out = source_out / speed;
        self.schedule.move_visible_start_to(visible_start);
        Ok(())
    }
}

impl LaneEntity for AudioTrack {
    type Id = AudioTrackId;

    fn id(&self) -> AudioTrackId {
        self.id
    }
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }
    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }
    fn trim_policy(&self) -> TrimPolicy {
        TrimPolicy::SOURCE_BOUNDED
    }
    fn with_id(&self, id: AudioTrackId) -> Self {
        Self { id, ..self.clone() }
    }
}
