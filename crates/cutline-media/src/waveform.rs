//! Waveform peaks for timeline audio visualization.

use cutline_core::Result;
use cutline_timeline::{MediaSource, WaveformPeaks};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Peak buckets per second of source audio.
pub const DEFAULT_BUCKETS_PER_SECOND: u32 = 50;

/// Produces downsampled amplitude envelopes.
pub trait WaveformProvider: Send + Sync {
    /// Peaks for the whole of `source`, or `None` if it has no decodable audio.
    fn peaks(&self, source: &MediaSource) -> Result<Option<WaveformPeaks>>;
}

/// Reduce mono samples to one peak (max absolute amplitude) per bucket.
pub fn downsample_peaks(samples: &[f32], samples_per_bucket: usize) -> Vec<f32> {
    if samples_per_bucket == 0 || samples.is_empty() {
        return Vec::new();
    }
    samples
        .chunks(samples_per_bucket)
        .map(|chunk| chunk.iter().fold(0.0f32, |peak, s| peak.max(s.abs())))
        .collect()
}

/// Samples per bucket for a sample rate and bucket density.
pub fn samples_per_bucket(sample_rate: u32, buckets_per_second: u32) -> usize {
    (sample_rate / buckets_per_second.max(1)).max(1) as usize
}

/// Memoizes another provider by source uri.
pub struct CachedWaveforms<P> {
    inner: P,
    cache: Mutex<HashMap<String, Option<WaveformPeaks>>>,
}

impl<P: WaveformProvider> CachedWaveforms<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }
}

impl<P: WaveformProvider> WaveformProvider for CachedWaveforms<P> {
    fn peaks(&self, source: &MediaSource) -> Result<Option<WaveformPeaks>> {
        if let Some(hit) = self.cache.lock().get(&source.uri) {
            return Ok(hit.clone());
        }
        let peaks = self.inner.peaks(source)?;
        debug!(uri = %source.uri, buckets = peaks.as_ref().map_or(0, |p| p.len()), "Generated waveform");
        self.cache.lock().insert(source.uri.clone(), peaks.clone());
        Ok(peaks)
    }
}
