//! The owning context: one `Editor` holds the project, the engine handle
//! and every session, and is the only place structural mutation happens.
//!
//! Engine seeks and background jobs report back as events. Seek landings
//! carry the sequence number they were issued under and anything but the
//! latest is ignored; background results carry work generations and are
//! dropped once superseded. A precise seek the engine reports as
//! interrupted, or never completes, is issued again.

use cutline_core::{RationalTime, Result};
use cutline_media::{
    sample_times, slot_count, AssetProber, Composition, CompositionBuilder, FrameExtractor,
    PlaybackEngine, SeekMode, SeekOutcome, ThumbnailConfig, ThumbnailPipeline, ThumbnailUpdate,
    WaveformProvider,
};
use cutline_timeline::{
    ClipId, EditCommand, EditMode, EditOutcome, EntityRef, ExportManifest, IdFactory,
    MediaSource, Project, ProjectConfig, Schedule, Timeline, TrimOutcome, WaveformPeaks, WorkKey,
    WorkKind, WorkRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::controller::{FollowMode, PlaybackController};
use crate::scrub::{CommitVerdict, ScrubController};
use crate::snapshot::EditorSnapshot;

/// Times an interrupted or dropped precise seek is re-issued before its
/// target is taken as reached.
const MAX_SEEK_ATTEMPTS: u8 = 3;

/// Zoom bounds in points per second.
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 2000.0;

/// Tunables for the editor runtime.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Timeline zoom in points per second
    pub zoom: f32,
    /// Period of the per-frame tick
    pub frame_interval: Duration,
    /// A scrub commit landing further than this from its target is retried once
    pub commit_retry_threshold: RationalTime,
    pub thumbnails: ThumbnailConfig,
    pub project: ProjectConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            zoom: 60.0,
            frame_interval: Duration::from_millis(16),
            commit_retry_threshold: RationalTime::millis(120),
            thumbnails: ThumbnailConfig::default(),
            project: ProjectConfig::default(),
        }
    }
}

/// External collaborators the editor drives.
#[derive(Clone)]
pub struct MediaServices {
    pub engine: Arc<dyn PlaybackEngine>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub waveforms: Arc<dyn WaveformProvider>,
    pub prober: Arc<dyn AssetProber>,
}

/// Results marshaled back to the owning context.
#[derive(Debug)]
pub(crate) enum EditorEvent {
    SeekLanded {
        seq: u64,
        outcome: SeekOutcome,
    },
    /// The engine dropped a precise seek without reporting an outcome
    SeekDropped {
        seq: u64,
    },
    Waveform {
        entity: EntityRef,
        generation: u64,
        peaks: Option<WaveformPeaks>,
    },
    Probed {
        uri: String,
        at: RationalTime,
        result: Result<MediaSource>,
    },
}

/// The precise seek currently outstanding and everything waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSeek {
    seq: u64,
    /// Re-issues after an interrupted or dropped completion
    attempt: u8,
    target: RationalTime,
    /// A user seek; clears the commit gate on landing
    plain: bool,
    /// The final seek of a scrub
    commit: bool,
    /// The corrective seek after a composition swap
    rebuild: bool,
}

pub struct Editor {
    config: EditorConfig,
    project: Project,
    playback: PlaybackController,
    scrub: ScrubController,
    thumbnails: ThumbnailPipeline,
    waveforms: Arc<dyn WaveformProvider>,
    prober: Arc<dyn AssetProber>,
    work: WorkRegistry,
    composition: Arc<Composition>,
    revision: u64,
    seek_seq: u64,
    pending_seek: Option<PendingSeek>,
    events_tx: mpsc::UnboundedSender<EditorEvent>,
    pub(crate) events_rx: mpsc::UnboundedReceiver<EditorEvent>,
    pub(crate) thumbnail_rx: mpsc::UnboundedReceiver<ThumbnailUpdate>,
    snapshots: watch::Sender<EditorSnapshot>,
}

impl Editor {
    /// An editor over an empty project. Must be created inside a tokio
    /// runtime.
    pub fn new(config: EditorConfig, services: MediaServices) -> Self {
        let work = WorkRegistry::new();
        let project = Project::with_config(IdFactory::new(work.clone()), config.project);
        Self::with_project(config, services, work, project)
    }

    /// An editor over an existing timeline, e.g. one loaded from a manifest.
    pub fn open(config: EditorConfig, services: MediaServices, timeline: Timeline) -> Self {
        let work = WorkRegistry::new();
        let project = Project::from_timeline(IdFactory::new(work.clone()), timeline);
        let mut editor = Self::with_project(config, services, work, project);
        let entities = editor.project.timeline().entities();
        for entity in entities {
            editor.request_waveform(entity);
        }
        editor.refresh_thumbnails();
        editor
    }

    fn with_project(
        config: EditorConfig,
        services: MediaServices,
        work: WorkRegistry,
        project: Project,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (thumbnail_tx, thumbnail_rx) = mpsc::unbounded_channel();
        let thumbnails = ThumbnailPipeline::new(
            config.thumbnails,
            services.extractor,
            work.clone(),
            thumbnail_tx,
        );
        let composition = Arc::new(CompositionBuilder::new(project.timeline()).build());
        services.engine.replace_composition(Arc::clone(&composition));

        let mut editor = Self {
            playback: PlaybackController::new(services.engine),
            scrub: ScrubController::new(config.commit_retry_threshold),
            thumbnails,
            waveforms: services.waveforms,
            prober: services.prober,
            work,
            composition,
            revision: 1,
            seek_seq: 0,
            pending_seek: None,
            events_tx,
            events_rx,
            thumbnail_rx,
            snapshots: watch::channel(EditorSnapshot::default()).0,
            config,
            project,
        };
        editor.publish();
        editor
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn scrub(&self) -> &ScrubController {
        &self.scrub
    }

    pub fn thumbnails(&self) -> &ThumbnailPipeline {
        &self.thumbnails
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }

    /// Bumped on every composition swap.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn display_time(&self) -> RationalTime {
        self.playback.display_time()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            display_time: self.playback.display_time(),
            total_duration: self.project.total_duration(),
            frame_rate: self.project.frame_rate(),
            playback: self.playback.state(),
            follow: self.playback.follow(),
            mode: self.project.mode(),
            trimming: self.project.trim_session().map(|s| s.target),
            scrubbing: self.scrub.is_active(),
            can_undo: self.project.can_undo(),
            can_redo: self.project.can_redo(),
            zoom: self.config.zoom,
            clip_count: self.project.timeline().clips().len(),
            revision: self.revision,
        }
    }

    /// Push the current snapshot to subscribers if it changed.
    pub fn publish(&self) {
        let next = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    pub fn export_manifest(&self) -> ExportManifest {
        ExportManifest::from_project(&self.project)
    }

    // ── Transport ──────────────────────────────────────────────

    pub fn play(&mut self) {
        let total = self.project.total_duration();
        if total.is_zero() {
            return;
        }
        if !self.playback.is_playing() && self.playback.display_time() >= total {
            self.seek(RationalTime::ZERO);
        }
        self.playback.play();
    }

    pub fn pause(&mut self) {
        self.playback.pause();
    }

    /// Precise seek to `time`, clamped to the timeline. The display jumps
    /// immediately; engine readouts are gated until the seek lands.
    pub fn seek(&mut self, time: RationalTime) {
        let target = time.clamp(RationalTime::ZERO, self.project.total_duration());
        self.playback.set_display_time(target);
        self.playback.set_awaiting_seek_commit(true);
        self.issue_precise(PendingSeek {
            seq: 0,
            attempt: 0,
            target,
            plain: true,
            commit: false,
            rebuild: false,
        });
    }

    /// Per-frame work: pace the scrub, then read the engine clock.
    pub fn tick(&mut self) {
        let frame = self.project.timeline().frame_duration();
        if let Some(target) = self.scrub.pace(frame) {
            // Tolerant seeks are fire-and-forget; only the commit is awaited.
            drop(self.playback.engine().seek(target, frame));
        }
        self.playback.on_frame(self.project.total_duration());
    }

    // ── Scrubbing ──────────────────────────────────────────────

    pub fn begin_scrub(&mut self) -> Result<()> {
        let at = self.playback.display_time();
        self.scrub
            .begin(self.playback.is_playing(), self.playback.follow(), at)?;
        self.playback.pause();
        self.playback.set_scrubbing(true);
        self.playback.engine().set_seek_mode(SeekMode::LowLatency);
        Ok(())
    }

    /// Record a drag position; the pacer issues the seek.
    pub fn scrub_to(&mut self, time: RationalTime) -> Result<RationalTime> {
        let requested = self.scrub.scrub(time, self.project.total_duration())?;
        self.playback.set_display_time(requested);
        Ok(requested)
    }

    pub fn end_scrub(&mut self) -> Result<()> {
        let target = self.scrub.end()?;
        self.playback.engine().set_seek_mode(SeekMode::Standard);
        self.playback.set_scrubbing(false);
        self.playback.set_awaiting_seek_commit(true);
        self.playback.set_display_time(target);
        self.issue_precise(PendingSeek {
            seq: 0,
            attempt: 0,
            target,
            plain: false,
            commit: true,
            rebuild: false,
        });
        Ok(())
    }

    // ── Editing ────────────────────────────────────────────────

    pub fn apply(&mut self, command: EditCommand) -> Result<EditOutcome> {
        let name = command.name();
        let outcome = self.project.apply(command)?;
        debug!(command = name, changed = outcome.is_changed(), "Edit applied");
        self.after_edit(&outcome);
        Ok(outcome)
    }

    pub fn undo(&mut self) -> Result<EditOutcome> {
        let outcome = self.project.undo()?;
        self.after_edit(&outcome);
        Ok(outcome)
    }

    pub fn redo(&mut self) -> Result<EditOutcome> {
        let outcome = self.project.redo()?;
        self.after_edit(&outcome);
        Ok(outcome)
    }

    /// Split the clip under the playhead.
    pub fn split(&mut self) -> Result<EditOutcome> {
        let at = self.playback.display_time();
        self.apply(EditCommand::SplitAt { at })
    }

    /// Probe `uri` off-thread, then insert it at the playhead as of now.
    pub fn import(&mut self, uri: impl Into<String>) {
        let uri = uri.into();
        let at = self.playback.display_time();
        let prober = Arc::clone(&self.prober);
        let events = self.events_tx.clone();
        info!(uri = %uri, at = %at, "Importing");
        tokio::task::spawn_blocking(move || {
            let result = prober.probe(&uri);
            let _ = events.send(EditorEvent::Probed { uri, at, result });
        });
    }

    pub fn select(&mut self, entity: Option<EntityRef>) -> Result<()> {
        self.project.select(entity)?;
        if entity.is_some() && !self.playback.is_playing() {
            self.playback.set_follow(FollowMode::KeepSelectionVisible);
        }
        Ok(())
    }

    pub fn set_mode(&mut self, mode: EditMode) -> Result<()> {
        self.project.set_mode(mode)
    }

    /// Change the timeline zoom, clamped to [`MIN_ZOOM`, `MAX_ZOOM`]
    /// points per second. Non-finite or non-positive values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if !zoom.is_finite() || zoom <= 0.0 {
            warn!(zoom, "Ignored invalid zoom");
            return;
        }
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.config.zoom = zoom;
        let started = self
            .thumbnails
            .rezoom(self.project.timeline().clips(), zoom);
        debug!(zoom, regenerated = started, "Zoom changed");
    }

    // ── Trim gestures ──────────────────────────────────────────

    pub fn begin_trim(&mut self, target: EntityRef) -> Result<()> {
        self.project.begin_trim(target)
    }

    pub fn apply_trim(
        &mut self,
        left: Option<RationalTime>,
        right: Option<RationalTime>,
    ) -> Result<Schedule> {
        self.project.apply_trim(left, right)
    }

    /// Close the gesture; a changed trim costs exactly one rebuild.
    pub fn end_trim(&mut self) -> Result<TrimOutcome> {
        let outcome = self.project.end_trim()?;
        if outcome.changed {
            self.refresh_thumbnails();
            self.rebuild();
        }
        Ok(outcome)
    }

    pub fn cancel_trim(&mut self) -> Result<()> {
        self.project.cancel_trim()
    }

    // ── Events ─────────────────────────────────────────────────

    pub(crate) fn handle_event(&mut self, event: EditorEvent) {
        match event {
            EditorEvent::SeekLanded { seq, outcome } => self.seek_landed(seq, outcome),
            EditorEvent::SeekDropped { seq } => self.seek_dropped(seq),
            EditorEvent::Waveform {
                entity,
                generation,
                peaks,
            } => {
                let key = WorkKey::new(entity, WorkKind::Waveform);
                if !self.work.finish(key, generation) {
                    debug!(entity = %entity, generation, "Dropped stale waveform");
                    return;
                }
                if let Some(peaks) = peaks {
                    self.project.attach_waveform(entity, peaks);
                }
            }
            EditorEvent::Probed { uri, at, result } => match result {
                Ok(source) => {
                    let clip = self.project.make_clip(source);
                    if let Err(e) = self.apply(EditCommand::InsertClipAt { at, clip }) {
                        warn!(uri = %uri, error = %e, "Import insert failed");
                    }
                }
                Err(e) => warn!(uri = %uri, error = %e, "Import probe failed"),
            },
        }
    }

    pub(crate) fn handle_thumbnail(&mut self, update: ThumbnailUpdate) {
        self.thumbnails.apply(update);
    }

    /// Handle everything already queued. Returns how many events ran.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        while let Ok(update) = self.thumbnail_rx.try_recv() {
            self.handle_thumbnail(update);
            handled += 1;
        }
        handled
    }

    /// Handle events as they arrive until `done` holds or `timeout` passes.
    /// Returns whether `done` held.
    pub async fn settle_until(&mut self, mut done: impl FnMut(&Editor) -> bool, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.pump();
            if done(self) {
                return true;
            }
            tokio::select! {
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                Some(update) = self.thumbnail_rx.recv() => self.handle_thumbnail(update),
                _ = tokio::time::sleep_until(deadline) => return done(self),
            }
        }
    }

    // ── Internals ──────────────────────────────────────────────

    fn after_edit(&mut self, outcome: &EditOutcome) {
        if !outcome.is_changed() {
            return;
        }
        for entity in outcome.retired_entities() {
            if let EntityRef::Clip(id) = entity {
                self.thumbnails.forget(*id);
            }
        }
        for entity in outcome.created_entities() {
            self.request_waveform(*entity);
        }
        self.refresh_thumbnails();
        self.rebuild();
    }

    /// Regenerate strips that are missing or no longer match their clip's
    /// window at the current zoom.
    fn refresh_thumbnails(&mut self) {
        let zoom = self.config.zoom;
        let tile = self.config.thumbnails.tile_width;
        let stale: Vec<ClipId> = self
            .project
            .timeline()
            .clips()
            .iter()
            .filter(|clip| match self.thumbnails.strip(clip.id) {
                None => true,
                Some(strip) => {
                    let count = slot_count(clip.effective_duration(), zoom, tile);
                    strip.times != sample_times(clip, count)
                }
            })
            .map(|clip| clip.id)
            .collect();
        for id in stale {
            if let Some(clip) = self.project.timeline().clip(id) {
                self.thumbnails.generate(clip, zoom);
            }
        }
    }

    fn request_waveform(&mut self, entity: EntityRef) {
        let timeline = self.project.timeline();
        let source = match entity {
            EntityRef::Clip(id) => timeline
                .clip(id)
                .filter(|clip| clip.waveform.is_none())
                .map(|clip| clip.source.clone()),
            EntityRef::Audio(id) => timeline
                .audio_tracks()
                .get(id)
                .filter(|track| track.waveform.is_none())
                .map(|track| track.source.clone()),
            _ => None,
        };
        let Some(source) = source.filter(|s| s.has_audio) else {
            return;
        };

        let ticket = self.work.begin(WorkKey::new(entity, WorkKind::Waveform));
        let provider = Arc::clone(&self.waveforms);
        let events = self.events_tx.clone();
        tokio::task::spawn_blocking(move || {
            if ticket.is_cancelled() {
                return;
            }
            let peaks = match provider.peaks(&source) {
                Ok(peaks) => peaks,
                Err(e) => {
                    warn!(uri = %source.uri, error = %e, "Waveform generation failed");
                    None
                }
            };
            let _ = events.send(EditorEvent::Waveform {
                entity,
                generation: ticket.generation,
                peaks,
            });
        });
    }

    /// Swap in a freshly built composition without losing the playhead:
    /// pause, swap, seek precisely back, resume once it lands.
    fn rebuild(&mut self) {
        let at = self.playback.display_time();
        self.playback.set_rebuilding(true);
        self.playback.engine().pause();

        let composition = Arc::new(CompositionBuilder::new(self.project.timeline()).build());
        self.playback
            .engine()
            .replace_composition(Arc::clone(&composition));
        self.revision += 1;
        info!(
            revision = self.revision,
            duration = %composition.duration,
            segments = composition.video.len(),
            "Rebuilt composition"
        );

        let duration = composition.duration;
        self.composition = composition;
        let target = self
            .pending_seek
            .map_or(at, |pending| pending.target)
            .min(duration);
        if target != at {
            self.playback.set_display_time(target);
        }
        self.issue_precise(PendingSeek {
            seq: 0,
            attempt: 0,
            target,
            plain: false,
            commit: false,
            rebuild: true,
        });
    }

    /// Issue a precise seek, folding in whatever the superseded one was
    /// waiting for.
    fn issue_precise(&mut self, mut next: PendingSeek) {
        if let Some(previous) = self.pending_seek.take() {
            next.plain |= previous.plain;
            next.commit |= previous.commit;
            next.rebuild |= previous.rebuild;
        }
        self.seek_seq += 1;
        next.seq = self.seek_seq;
        self.pending_seek = Some(next);

        let rx = self.playback.engine().seek(next.target, RationalTime::ZERO);
        let events = self.events_tx.clone();
        let seq = next.seq;
        debug!(seq, target = %next.target, "Precise seek issued");
        tokio::spawn(async move {
            let event = match rx.await {
                Ok(outcome) => EditorEvent::SeekLanded { seq, outcome },
                Err(_) => EditorEvent::SeekDropped { seq },
            };
            let _ = events.send(event);
        });
    }

    /// Re-issue `pending` unchanged. False once its attempts are used up.
    fn retry_precise(&mut self, mut pending: PendingSeek) -> bool {
        if pending.attempt >= MAX_SEEK_ATTEMPTS {
            warn!(seq = pending.seq, target = %pending.target, "Precise seek kept failing, taking target as reached");
            return false;
        }
        pending.attempt += 1;
        debug!(seq = pending.seq, attempt = pending.attempt, target = %pending.target, "Retrying precise seek");
        self.pending_seek = None;
        self.issue_precise(pending);
        true
    }

    fn seek_dropped(&mut self, seq: u64) {
        let Some(pending) = self.pending_seek.filter(|p| p.seq == seq) else {
            return;
        };
        if !self.retry_precise(pending) {
            self.settle_seek(pending, pending.target);
        }
    }

    fn seek_landed(&mut self, seq: u64, outcome: SeekOutcome) {
        let Some(pending) = self.pending_seek.filter(|p| p.seq == seq) else {
            debug!(seq, "Ignored stale seek landing");
            return;
        };
        if outcome.finished {
            self.settle_seek(pending, outcome.landed);
        } else if !self.retry_precise(pending) {
            self.settle_seek(pending, pending.target);
        }
    }

    /// Release everything `pending` was holding, with the playhead at `landed`.
    fn settle_seek(&mut self, pending: PendingSeek, landed: RationalTime) {
        self.pending_seek = None;
        self.playback.set_display_time(landed);

        if pending.rebuild {
            self.playback.set_rebuilding(false);
        }
        if pending.commit {
            match self.scrub.landed(landed) {
                Some(CommitVerdict::Retry(target)) => {
                    self.issue_precise(PendingSeek {
                        seq: 0,
                        attempt: 0,
                        target,
                        plain: pending.plain,
                        commit: true,
                        rebuild: false,
                    });
                    return;
                }
                Some(CommitVerdict::Finished { resume, follow, landed }) => {
                    self.playback.set_awaiting_seek_commit(false);
                    if resume {
                        self.playback.play();
                    }
                    self.playback.set_follow(follow);
                    info!(landed = %landed, resume, "Scrub finished");
                }
                None => self.playback.set_awaiting_seek_commit(false),
            }
        } else if pending.plain {
            self.playback.set_awaiting_seek_commit(false);
        }
        if pending.rebuild && !self.scrub.is_active() {
            self.playback.resume_engine();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_media::{SeekFault, SimEngine, SimExtractor, SimProber, SimWaveforms};
    use cutline_timeline::MediaSource;

    const SETTLE: Duration = Duration::from_secs(2);

    fn editor() -> (Editor, SimEngine) {
        let engine = SimEngine::new();
        let services = MediaServices {
            engine: Arc::new(engine.clone()),
            extractor: Arc::new(SimExtractor),
            waveforms: Arc::new(SimWaveforms::default()),
            prober: Arc::new(SimProber::new()),
        };
        (Editor::new(EditorConfig::default(), services), engine)
    }

    fn append(editor: &mut Editor, secs: i64) -> ClipId {
        let clip = editor
            .project()
            .make_clip(MediaSource::video("a.mp4", RationalTime::seconds(secs)));
        let id = clip.id;
        editor.apply(EditCommand::Append { clip }).unwrap();
        id
    }

    fn idle(editor: &Editor) -> bool {
        editor.playback().gates().is_clear()
    }

    #[tokio::test]
    async fn test_edit_rebuilds_and_restores_playhead() {
        let (mut editor, engine) = editor();
        append(&mut editor, 4);
        assert!(editor.settle_until(idle, SETTLE).await);
        editor.seek(RationalTime::seconds(3));
        assert!(editor.settle_until(idle, SETTLE).await);

        let before = editor.revision();
        let replacements = engine.replacements();
        append(&mut editor, 2);
        assert_eq!(editor.revision(), before + 1);
        assert_eq!(engine.replacements(), replacements + 1);
        assert!(editor.playback().gates().rebuilding);

        assert!(editor.settle_until(idle, SETTLE).await);
        assert_eq!(editor.display_time(), RationalTime::seconds(3));
        assert_eq!(editor.composition().duration, RationalTime::seconds(6));
    }

    #[tokio::test]
    async fn test_rebuild_resumes_playback_after_landing() {
        let (mut editor, engine) = editor();
        append(&mut editor, 4);
        assert!(editor.settle_until(idle, SETTLE).await);
        editor.play();
        assert!(engine.is_playing());

        engine.hold_seeks(true);
        append(&mut editor, 1);
        assert!(!engine.is_playing());
        assert!(editor.playback().is_playing());

        engine.hold_seeks(false);
        engine.release_seeks();
        assert!(editor.settle_until(idle, SETTLE).await);
        assert!(engine.is_playing());
    }

    fn precise_seeks_to(engine: &SimEngine, target: RationalTime) -> usize {
        engine
            .seeks()
            .iter()
            .filter(|seek| seek.tolerance.is_zero() && seek.target == target)
            .count()
    }

    #[tokio::test]
    async fn test_interrupted_rebuild_seek_is_reissued() {
        let (mut editor, engine) = editor();
        append(&mut editor, 4);
        assert!(editor.settle_until(idle, SETTLE).await);
        editor.seek(RationalTime::seconds(3));
        assert!(editor.settle_until(idle, SETTLE).await);

        // a tolerant seek moved the engine away before the swap
        drop(engine.seek(RationalTime::seconds(1), RationalTime::millis(100)));
        engine.clear_seeks();
        engine.push_seek_fault(SeekFault::Interrupted);
        append(&mut editor, 2);

        assert!(editor.settle_until(idle, SETTLE).await);
        assert_eq!(editor.display_time(), RationalTime::seconds(3));
        assert_eq!(engine.current_time(), RationalTime::seconds(3));
        assert_eq!(precise_seeks_to(&engine, RationalTime::seconds(3)), 2);
    }

    #[tokio::test]
    async fn test_dropped_seek_does_not_wedge_the_gates() {
        let (mut editor, engine) = editor();
        append(&mut editor, 4);
        assert!(editor.settle_until(idle, SETTLE).await);

        engine.push_seek_fault(SeekFault::Dropped);
        editor.seek(RationalTime::seconds(2));
        assert!(editor.playback().gates().awaiting_seek_commit);

        assert!(editor.settle_until(idle, SETTLE).await);
        assert_eq!(editor.display_time(), RationalTime::seconds(2));
        assert_eq!(engine.current_time(), RationalTime::seconds(2));
        assert_eq!(precise_seeks_to(&engine, RationalTime::seconds(2)), 2);
    }

    #[tokio::test]
    async fn test_seek_that_never_completes_settles_at_target() {
        let (mut editor, engine) = editor();
        append(&mut editor, 4);
        assert!(editor.settle_until(idle, SETTLE).await);

        for _ in 0..=MAX_SEEK_ATTEMPTS {
            engine.push_seek_fault(SeekFault::Dropped);
        }
        editor.seek(RationalTime::seconds(2));

        assert!(editor.settle_until(idle, SETTLE).await);
        assert_eq!(editor.display_time(), RationalTime::seconds(2));
        assert_eq!(
            precise_seeks_to(&engine, RationalTime::seconds(2)),
            usize::from(MAX_SEEK_ATTEMPTS) + 1
        );
    }

    #[tokio::test]
    async fn test_zoom_is_clamped_and_strips_stay_bounded() {
        let (mut editor, _engine) = editor();
        let id = append(&mut editor, 120);

        editor.set_zoom(f32::MAX);
        assert_eq!(editor.snapshot().zoom, MAX_ZOOM);
        let strip = editor.thumbnails().strip(id).unwrap();
        assert_eq!(strip.slots.len(), cutline_media::MAX_SLOTS_PER_CLIP);

        editor.set_zoom(f32::NAN);
        editor.set_zoom(-3.0);
        assert_eq!(editor.snapshot().zoom, MAX_ZOOM);

        editor.set_zoom(0.01);
        assert_eq!(editor.snapshot().zoom, MIN_ZOOM);
        assert_eq!(editor.thumbnails().strip(id).unwrap().slots.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_seek_landing_is_ignored() {
        let (mut editor, engine) = editor();
        append(&mut editor, 10);
        assert!(editor.settle_until(idle, SETTLE).await);

        engine.hold_seeks(true);
        editor.seek(RationalTime::seconds(2));
        editor.seek(RationalTime::seconds(5));
        engine.hold_seeks(false);
        engine.release_seeks();

        assert!(editor.settle_until(idle, SETTLE).await);
        editor.pump();
        assert_eq!(editor.display_time(), RationalTime::seconds(5));
    }

    #[tokio::test]
    async fn test_scrub_commits_with_one_precise_seek() {
        let (mut editor, engine) = editor();
        append(&mut editor, 10);
        assert!(editor.settle_until(idle, SETTLE).await);
        editor.play();
        engine.clear_seeks();

        editor.begin_scrub().unwrap();
        assert!(!engine.is_playing());
        assert_eq!(engine.seek_mode(), SeekMode::LowLatency);
        for ms in [500, 510, 900, 2_000] {
            editor.scrub_to(RationalTime::millis(ms)).unwrap();
            editor.tick();
        }
        editor.end_scrub().unwrap();
        assert!(editor.settle_until(idle, SETTLE).await);

        let seeks = engine.seeks();
        let precise: Vec<_> = seeks.iter().filter(|s| s.tolerance.is_zero()).collect();
        assert_eq!(precise.len(), 1);
        assert_eq!(precise[0].target, RationalTime::seconds(2));
        assert!(seeks.iter().filter(|s| !s.tolerance.is_zero()).count() >= 2);
        assert!(engine.is_playing());
        assert_eq!(editor.playback().follow(), FollowMode::CenterOnPlayhead);
    }

    #[tokio::test]
    async fn test_scrub_commit_retries_a_far_landing_once() {
        let (mut editor, engine) = editor();
        append(&mut editor, 10);
        assert!(editor.settle_until(idle, SETTLE).await);
        engine.clear_seeks();
        engine.push_landing_error(RationalTime::millis(500));

        editor.begin_scrub().unwrap();
        editor.scrub_to(RationalTime::seconds(4)).unwrap();
        editor.end_scrub().unwrap();
        assert!(editor.settle_until(idle, SETTLE).await);

        let precise = engine
            .seeks()
            .iter()
            .filter(|s| s.tolerance.is_zero())
            .count();
        assert_eq!(precise, 2);
        assert_eq!(editor.display_time(), RationalTime::seconds(4));
        assert!(!editor.scrub().is_active());
    }

    #[tokio::test]
    async fn test_trim_gesture_rebuilds_once() {
        let (mut editor, engine) = editor();
        let id = append(&mut editor, 6);
        assert!(editor.settle_until(idle, SETTLE).await);
        let replacements = engine.replacements();

        editor.begin_trim(EntityRef::Clip(id)).unwrap();
        editor.apply_trim(None, Some(-RationalTime::seconds(1))).unwrap();
        editor.apply_trim(None, Some(-RationalTime::seconds(2))).unwrap();
        assert_eq!(engine.replacements(), replacements);
        assert!(editor.end_trim().unwrap().changed);
        assert_eq!(engine.replacements(), replacements + 1);
        assert_eq!(editor.composition().duration, RationalTime::seconds(4));
    }

    #[tokio::test]
    async fn test_split_swaps_thumbnail_strips() {
        let (mut editor, _engine) = editor();
        let id = append(&mut editor, 4);
        assert!(editor.thumbnails().strip(id).is_some());
        editor.seek(RationalTime::seconds(1));
        assert!(editor.settle_until(idle, SETTLE).await);

        let outcome = editor.split().unwrap();
        assert_eq!(outcome.retired_entities(), &[EntityRef::Clip(id)]);
        assert!(editor.thumbnails().strip(id).is_none());
        for entity in outcome.created_entities() {
            let half = entity.as_clip().unwrap();
            assert!(editor.thumbnails().strip(half).is_some());
        }
    }

    #[tokio::test]
    async fn test_waveform_attaches_to_clip() {
        let (mut editor, _engine) = editor();
        let id = append(&mut editor, 1);
        let loaded = editor
            .settle_until(
                |e| e.project().timeline().clip(id).is_some_and(|c| c.waveform.is_some()),
                SETTLE,
            )
            .await;
        assert!(loaded);
        // Only the thumbnail job stays registered.
        assert_eq!(editor.work.live_count(), 1);
    }

    #[tokio::test]
    async fn test_import_inserts_at_capture_time() {
        let engine = SimEngine::new();
        let prober = Arc::new(SimProber::new());
        prober.register(MediaSource::video("b.mp4", RationalTime::seconds(2)));
        let services = MediaServices {
            engine: Arc::new(engine),
            extractor: Arc::new(SimExtractor),
            waveforms: Arc::new(SimWaveforms::default()),
            prober,
        };
        let mut editor = Editor::new(EditorConfig::default(), services);
        append(&mut editor, 4);
        append(&mut editor, 6);
        editor.seek(RationalTime::seconds(5));
        assert!(editor.settle_until(idle, SETTLE).await);

        editor.import("b.mp4");
        editor.import("missing.mp4");
        assert!(
            editor
                .settle_until(|e| e.project().timeline().clips().len() == 4, SETTLE)
                .await
        );
        let start = editor
            .project()
            .timeline()
            .clips()
            .iter()
            .find(|c| c.source.uri == "b.mp4")
            .and_then(|c| editor.project().timeline().start_of(c.id));
        assert_eq!(start, Some(RationalTime::seconds(5)));
    }

    #[tokio::test]
    async fn test_snapshot_tracks_state() {
        let (mut editor, _engine) = editor();
        let mut rx = editor.subscribe();
        let id = append(&mut editor, 3);
        editor.select(Some(EntityRef::Clip(id))).unwrap();
        editor.publish();

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.total_duration, RationalTime::seconds(3));
        assert_eq!(snapshot.mode, EditMode::Edit(EntityRef::Clip(id)));
        assert_eq!(snapshot.follow, FollowMode::KeepSelectionVisible);
        assert!(snapshot.can_undo);
    }
}
