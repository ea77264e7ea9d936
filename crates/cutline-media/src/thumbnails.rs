//! Progressive, cancellable thumbnail strips for main-track clips.
//!
//! Each clip gets a strip of evenly spaced preview slots sized to the
//! current zoom. Slots start empty and are filled by a blocking worker; every
//! result carries the generation of the job that produced it, and results
//! from superseded or cancelled jobs are dropped on arrival.

use cutline_core::{RationalTime, Size};
use cutline_timeline::{Clip, ClipId, EntityRef, WorkKey, WorkKind, WorkRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::extract::{FrameExtractor, Thumbnail};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailConfig {
    /// Width of one strip tile in points
    pub tile_width: f32,
    /// Bounding box passed to the extractor
    pub max_size: Size,
    /// Relative zoom change that triggers regeneration
    pub rezoom_threshold: f32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            tile_width: 60.0,
            max_size: Size::new(120.0, 214.0),
            rezoom_threshold: 0.10,
        }
    }
}

/// One decoded slot arriving from a worker.
#[derive(Debug, Clone)]
pub struct ThumbnailUpdate {
    pub clip: ClipId,
    pub generation: u64,
    pub index: usize,
    pub image: Thumbnail,
}

/// Preview slots for one clip.
#[derive(Debug, Clone)]
pub struct ClipStrip {
    pub generation: u64,
    /// Zoom (points per second) the strip was laid out for
    pub zoom: f32,
    /// Source times of each slot
    pub times: Vec<RationalTime>,
    /// `None` is a placeholder
    pub slots: Vec<Option<Thumbnail>>,
}

impl ClipStrip {
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Most slots a single strip lays out, whatever the zoom.
pub const MAX_SLOTS_PER_CLIP: usize = 512;

/// Number of tiles needed to cover `effective` at `zoom` points per second,
/// between 1 and [`MAX_SLOTS_PER_CLIP`].
pub fn slot_count(effective: RationalTime, zoom: f32, tile_width: f32) -> usize {
    let width = effective.to_seconds_f64() * f64::from(zoom);
    let count = (width / f64::from(tile_width.max(1.0))).ceil();
    if !count.is_finite() && count > 0.0 {
        MAX_SLOTS_PER_CLIP
    } else if count >= 1.0 {
        count.min(MAX_SLOTS_PER_CLIP as f64) as usize
    } else {
        1
    }
}

/// Source times for `count` evenly spaced tiles over `clip`'s effective
/// window.
pub fn sample_times(clip: &Clip, count: usize) -> Vec<RationalTime> {
    let count = count.max(1);
    let effective = clip.effective_duration();
    (0..count)
        .map(|i| {
            let offset = effective * i as i64 / count as i64;
            clip.trim_start() + offset * clip.speed()
        })
        .collect()
}

pub struct ThumbnailPipeline {
    config: ThumbnailConfig,
    extractor: Arc<dyn FrameExtractor>,
    work: WorkRegistry,
    strips: HashMap<ClipId, ClipStrip>,
    updates: mpsc::UnboundedSender<ThumbnailUpdate>,
}

impl ThumbnailPipeline {
    /// Workers deliver into `updates`; the owner feeds them back through
    /// [`ThumbnailPipeline::apply`].
    pub fn new(
        config: ThumbnailConfig,
        extractor: Arc<dyn FrameExtractor>,
        work: WorkRegistry,
        updates: mpsc::UnboundedSender<ThumbnailUpdate>,
    ) -> Self {
        Self {
            config,
            extractor,
            work,
            strips: HashMap::new(),
            updates,
        }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    pub fn strip(&self, clip: ClipId) -> Option<&ClipStrip> {
        self.strips.get(&clip)
    }

    /// Whether `clip` has no strip yet or its strip was laid out for a zoom
    /// more than the threshold away from `zoom`.
    pub fn needs_regeneration(&self, clip: ClipId, zoom: f32) -> bool {
        match self.strips.get(&clip) {
            None => true,
            Some(strip) if strip.zoom <= 0.0 => true,
            Some(strip) => ((zoom - strip.zoom) / strip.zoom).abs() > self.config.rezoom_threshold,
        }
    }

    /// Generate if the strip is missing or stale for `zoom`. Returns the new
    /// generation when a job was started.
    pub fn request(&mut self, clip: &Clip, zoom: f32) -> Option<u64> {
        if self.needs_regeneration(clip.id, zoom) {
            Some(self.generate(clip, zoom))
        } else {
            None
        }
    }

    /// Regenerate every stale strip in `clips` for a new zoom.
    pub fn rezoom(&mut self, clips: &[Clip], zoom: f32) -> usize {
        clips
            .iter()
            .filter_map(|clip| self.request(clip, zoom))
            .count()
    }

    /// Cancel in-flight work for `clip`, lay out fresh placeholder slots and
    /// start filling them in the background.
    pub fn generate(&mut self, clip: &Clip, zoom: f32) -> u64 {
        let key = WorkKey::new(EntityRef::Clip(clip.id), WorkKind::Thumbnails);
        let ticket = self.work.begin(key);
        let generation = ticket.generation;
        let count = slot_count(clip.effective_duration(), zoom, self.config.tile_width);
        let times = sample_times(clip, count);

        self.strips.insert(
            clip.id,
            ClipStrip {
                generation,
                zoom,
                times: times.clone(),
                slots: vec![None; count],
            },
        );
        info!(clip = %clip.id, generation, slots = count, zoom, "Generating thumbnails");

        let extractor = Arc::clone(&self.extractor);
        let updates = self.updates.clone();
        let source = clip.source.clone();
        let max_size = self.config.max_size;
        let clip_id = clip.id;
        tokio::task::spawn_blocking(move || {
            for (index, at) in times.into_iter().enumerate() {
                if ticket.is_cancelled() {
                    debug!(clip = %clip_id, generation = ticket.generation, "Thumbnail job cancelled");
                    return;
                }
                let Some(image) = extractor.extract(&source, at, max_size) else {
                    warn!(clip = %clip_id, at = %at, "Thumbnail decode failed");
                    continue;
                };
                let update = ThumbnailUpdate {
                    clip: clip_id,
                    generation: ticket.generation,
                    index,
                    image,
                };
                if updates.send(update).is_err() {
                    return;
                }
            }
        });
        generation
    }

    /// Store a worker result. Stale results are discarded; returns whether
    /// the update was applied.
    pub fn apply(&mut self, update: ThumbnailUpdate) -> bool {
        let key = WorkKey::new(EntityRef::Clip(update.clip), WorkKind::Thumbnails);
        if !self.work.is_current(key, update.generation) {
            debug!(clip = %update.clip, generation = update.generation, "Dropped stale thumbnail");
            return false;
        }
        let Some(strip) = self.strips.get_mut(&update.clip) else {
            return false;
        };
        if strip.generation != update.generation {
            return false;
        }
        match strip.slots.get_mut(update.index) {
            Some(slot) => {
                *slot = Some(update.image);
                true
            }
            None => false,
        }
    }

    /// Drop the strip for `clip` and cancel its work.
    pub fn forget(&mut self, clip: ClipId) {
        self.work
            .cancel(WorkKey::new(EntityRef::Clip(clip), WorkKind::Thumbnails));
        self.strips.remove(&clip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_timeline::{IdFactory, MediaSource};

    struct Solid;

    impl FrameExtractor for Solid {
        fn extract(
            &self,
            source: &cutline_timeline::MediaSource,
            at: RationalTime,
            _max_size: Size,
        ) -> Option<Thumbnail> {
            if source.uri.contains("corrupt") {
                return None;
            }
            Some(Thumbnail {
                width: 2,
                height: 2,
                source_time: at,
                pixels: Arc::from(vec![0u8; 16]),
            })
        }
    }

    fn clip(secs: i64) -> Clip {
        Clip::new(
            IdFactory::default().clip_id(),
            MediaSource::video("clip.mp4", RationalTime::seconds(secs)),
        )
    }

    fn pipeline() -> (ThumbnailPipeline, mpsc::UnboundedReceiver<ThumbnailUpdate>, WorkRegistry) {
        let (tx, rx) = mpsc::unbounded_channel();
        let work = WorkRegistry::new();
        let pipeline = ThumbnailPipeline::new(ThumbnailConfig::default(), Arc::new(Solid), work.clone(), tx);
        (pipeline, rx, work)
    }

    #[test]
    fn test_slot_count() {
        assert_eq!(slot_count(RationalTime::seconds(4), 30.0, 60.0), 2);
        assert_eq!(slot_count(RationalTime::millis(100), 30.0, 60.0), 1);
        assert_eq!(slot_count(RationalTime::seconds(10), 61.0, 60.0), 11);
    }

    #[test]
    fn test_slot_count_is_bounded() {
        assert_eq!(slot_count(RationalTime::seconds(3600), 1.0e6, 60.0), MAX_SLOTS_PER_CLIP);
        assert_eq!(slot_count(RationalTime::seconds(10), f32::MAX, 60.0), MAX_SLOTS_PER_CLIP);
        assert_eq!(slot_count(RationalTime::seconds(10), f32::INFINITY, 60.0), MAX_SLOTS_PER_CLIP);
        assert_eq!(slot_count(RationalTime::seconds(10), f32::NAN, 60.0), 1);
        assert_eq!(slot_count(RationalTime::seconds(10), -5.0, 60.0), 1);
    }

    #[test]
    fn test_sample_times_map_to_source() {
        let mut c = clip(10);
        c.set_trim(RationalTime::seconds(2), RationalTime::seconds(6))
            .unwrap();
        let times = sample_times(&c, 4);
        assert_eq!(
            times,
            vec![2, 3, 4, 5].into_iter().map(RationalTime::seconds).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_generate_fills_every_slot() {
        let (mut pipeline, mut rx, _work) = pipeline();
        let c = clip(4);
        let generation = pipeline.generate(&c, 60.0);
        assert_eq!(pipeline.strip(c.id).unwrap().slots.len(), 4);

        for _ in 0..4 {
            let update = rx.recv().await.unwrap();
            assert_eq!(update.generation, generation);
            assert!(pipeline.apply(update));
        }
        assert_eq!(pipeline.strip(c.id).unwrap().filled(), 4);
    }

    #[tokio::test]
    async fn test_superseded_results_are_dropped() {
        let (mut pipeline, mut rx, _work) = pipeline();
        let c = clip(2);
        let first = pipeline.generate(&c, 60.0);
        let second = pipeline.generate(&c, 120.0);
        assert_ne!(first, second);

        let stale = ThumbnailUpdate {
            clip: c.id,
            generation: first,
            index: 0,
            image: Solid
                .extract(&c.source, RationalTime::ZERO, Size::new(1.0, 1.0))
                .unwrap(),
        };
        assert!(!pipeline.apply(stale));

        while let Ok(Some(update)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await
        {
            let current = update.generation == second;
            assert_eq!(pipeline.apply(update), current);
        }
    }

    #[test]
    fn test_rezoom_threshold() {
        let (mut pipeline, _rx, _work) = pipeline();
        let c = clip(4);
        pipeline.strips.insert(
            c.id,
            ClipStrip {
                generation: 1,
                zoom: 100.0,
                times: Vec::new(),
                slots: Vec::new(),
            },
        );
        assert!(!pipeline.needs_regeneration(c.id, 109.0));
        assert!(pipeline.needs_regeneration(c.id, 111.0));
        assert!(pipeline.needs_regeneration(c.id, 89.0));
    }

    #[tokio::test]
    async fn test_retired_clip_results_are_dropped() {
        let (mut pipeline, _rx, work) = pipeline();
        let ids = IdFactory::new(work);
        let c = clip(2);
        let generation = pipeline.generate(&c, 60.0);
        ids.retire(EntityRef::Clip(c.id));

        let update = ThumbnailUpdate {
            clip: c.id,
            generation,
            index: 0,
            image: Solid
                .extract(&c.source, RationalTime::ZERO, Size::new(1.0, 1.0))
                .unwrap(),
        };
        assert!(!pipeline.apply(update));
    }

    #[tokio::test]
    async fn test_decode_failure_leaves_placeholder() {
        let (mut pipeline, mut rx, _work) = pipeline();
        let c = Clip::new(
            IdFactory::default().clip_id(),
            MediaSource::video("corrupt.mp4", RationalTime::seconds(2)),
        );
        pipeline.generate(&c, 60.0);
        let nothing = tokio::time::timeout(std::time::Duration::from_millis(100), rx.recv()).await;
        assert!(nothing.is_err());
        assert_eq!(pipeline.strip(c.id).unwrap().filled(), 0);
    }
}
