//! In-process collaborators for headless runs and tests.
//!
//! The simulated engine keeps a clock that only moves when told to, lands
//! seeks on the frame grid and records every seek it was asked for. Precise
//! seeks can be made to land off target, report an interruption or never
//! complete.

use cutline_core::{CutlineError, FrameRate, RationalTime, Result, Size};
use cutline_timeline::{MediaKind, MediaSource, WaveformPeaks};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::composition::Composition;
use crate::engine::{PlaybackEngine, SeekMode, SeekOutcome};
use crate::extract::{AssetProber, FrameExtractor, Thumbnail};
use crate::waveform::{downsample_peaks, samples_per_bucket, WaveformProvider, DEFAULT_BUCKETS_PER_SECOND};

/// A seek as the engine received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRecord {
    pub target: RationalTime,
    pub tolerance: RationalTime,
    pub mode: SeekMode,
}

/// How an upcoming precise seek misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFault {
    /// Completes with `finished: false`, still at the previous position
    Interrupted,
    /// The completion channel is dropped without an outcome
    Dropped,
}

#[derive(Default)]
struct SimState {
    composition: Option<Arc<Composition>>,
    playing: bool,
    time: RationalTime,
    mode: SeekMode,
    seeks: Vec<SeekRecord>,
    /// Landing errors applied to upcoming precise seeks, in order
    landing_errors: Vec<RationalTime>,
    /// Faults applied to upcoming precise seeks, in order
    faults: Vec<SeekFault>,
    hold: bool,
    held: Vec<(oneshot::Sender<SeekOutcome>, SeekOutcome)>,
    replacements: usize,
}

/// A deterministic [`PlaybackEngine`].
#[derive(Clone, Default)]
pub struct SimEngine {
    state: Arc<Mutex<SimState>>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward while playing, stopping at the end.
    pub fn advance(&self, delta: RationalTime) {
        let mut state = self.state.lock();
        if !state.playing {
            return;
        }
        let duration = state
            .composition
            .as_ref()
            .map_or(RationalTime::ZERO, |c| c.duration);
        state.time = (state.time + delta).min(duration);
    }

    /// Make the next precise seek land `error` away from its target.
    pub fn push_landing_error(&self, error: RationalTime) {
        self.state.lock().landing_errors.push(error);
    }

    /// Make the next precise seek misbehave.
    pub fn push_seek_fault(&self, fault: SeekFault) {
        self.state.lock().faults.push(fault);
    }

    /// Hold seek completions until [`SimEngine::release_seeks`].
    pub fn hold_seeks(&self, hold: bool) {
        self.state.lock().hold = hold;
    }

    /// Complete every held seek. Returns how many were released.
    pub fn release_seeks(&self) -> usize {
        let held: Vec<_> = std::mem::take(&mut self.state.lock().held);
        let count = held.len();
        for (tx, outcome) in held {
            let _ = tx.send(outcome);
        }
        count
    }

    pub fn seeks(&self) -> Vec<SeekRecord> {
        self.state.lock().seeks.clone()
    }

    pub fn clear_seeks(&self) {
        self.state.lock().seeks.clear();
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn seek_mode(&self) -> SeekMode {
        self.state.lock().mode
    }

    pub fn composition(&self) -> Option<Arc<Composition>> {
        self.state.lock().composition.clone()
    }

    /// How many times the composition was replaced.
    pub fn replacements(&self) -> usize {
        self.state.lock().replacements
    }
}

impl PlaybackEngine for SimEngine {
    fn replace_composition(&self, composition: Arc<Composition>) {
        let mut state = self.state.lock();
        state.composition = Some(composition);
        state.replacements += 1;
    }

    fn play(&self) {
        self.state.lock().playing = true;
    }

    fn pause(&self) {
        self.state.lock().playing = false;
    }

    fn current_time(&self) -> RationalTime {
        self.state.lock().time
    }

    fn set_seek_mode(&self, mode: SeekMode) {
        self.state.lock().mode = mode;
    }

    fn seek(&self, target: RationalTime, tolerance: RationalTime) -> oneshot::Receiver<SeekOutcome> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        let (duration, rate) = state
            .composition
            .as_ref()
            .map_or((RationalTime::ZERO, FrameRate::default()), |c| (c.duration, c.frame_rate));
        let mode = state.mode;
        state.seeks.push(SeekRecord {
            target,
            tolerance,
            mode,
        });

        let fault = if tolerance.is_zero() && !state.faults.is_empty() {
            Some(state.faults.remove(0))
        } else {
            None
        };
        let outcome = match fault {
            Some(SeekFault::Dropped) => {
                debug!(target = %target, "Sim seek dropped");
                return rx;
            }
            Some(SeekFault::Interrupted) => SeekOutcome {
                target,
                landed: state.time,
                finished: false,
            },
            None => {
                let mut landed = target.clamp(RationalTime::ZERO, duration).quantize(rate);
                if tolerance.is_zero() && !state.landing_errors.is_empty() {
                    let error = state.landing_errors.remove(0);
                    landed = (landed + error).clamp(RationalTime::ZERO, duration);
                }
                state.time = landed;
                SeekOutcome {
                    target,
                    landed,
                    finished: true,
                }
            }
        };
        debug!(target = %target, landed = %outcome.landed, finished = outcome.finished, tolerance = %tolerance, "Sim seek");

        if state.hold {
            state.held.push((tx, outcome));
        } else {
            let _ = tx.send(outcome);
        }
        rx
    }
}

/// Solid-color frames; uris containing `corrupt` fail to decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimExtractor;

impl FrameExtractor for SimExtractor {
    fn extract(&self, source: &MediaSource, at: RationalTime, max_size: Size) -> Option<Thumbnail> {
        if source.uri.contains("corrupt") || at > source.duration {
            return None;
        }
        let oriented = source.oriented_size();
        let scale = (max_size.width / oriented.width)
            .min(max_size.height / oriented.height)
            .min(1.0);
        let width = (oriented.width * scale).round().max(1.0) as u32;
        let height = (oriented.height * scale).round().max(1.0) as u32;
        let shade = (at.to_seconds_f64() * 10.0) as u8;
        Some(Thumbnail {
            width,
            height,
            source_time: at,
            pixels: vec![shade; (width * height * 4) as usize].into(),
        })
    }
}

/// Synthesizes a sine envelope for sources with audio.
#[derive(Debug, Clone, Copy)]
pub struct SimWaveforms {
    pub sample_rate: u32,
}

impl Default for SimWaveforms {
    fn default() -> Self {
        Self { sample_rate: 8_000 }
    }
}

impl WaveformProvider for SimWaveforms {
    fn peaks(&self, source: &MediaSource) -> Result<Option<WaveformPeaks>> {
        if !source.has_audio {
            return Ok(None);
        }
        let count = (source.duration.to_seconds_f64() * f64::from(self.sample_rate)) as usize;
        let samples: Vec<f32> = (0..count)
            .map(|i| (i as f32 * 0.05).sin() * 0.8)
            .collect();
        let per_bucket = samples_per_bucket(self.sample_rate, DEFAULT_BUCKETS_PER_SECOND);
        Ok(Some(downsample_peaks(&samples, per_bucket).into()))
    }
}

/// Serves registered descriptions by uri.
#[derive(Debug, Default)]
pub struct SimProber {
    sources: Mutex<HashMap<String, MediaSource>>,
}

impl SimProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: MediaSource) {
        self.sources.lock().insert(source.uri.clone(), source);
    }
}

impl AssetProber for SimProber {
    fn probe(&self, uri: &str) -> Result<MediaSource> {
        let source = self
            .sources
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| CutlineError::Media(format!("cannot open {uri}")))?;
        if source.duration <= RationalTime::ZERO && source.kind == MediaKind::Video {
            return Err(CutlineError::Media(format!("{uri} has no video frames")));
        }
        Ok(source)
    }
}
