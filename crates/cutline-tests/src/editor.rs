//! End-to-end editor flows against the simulated engine.

use cutline_core::RationalTime;
use cutline_media::{AudioOrigin, SeekMode, SimEngine, SimExtractor, SimProber, SimWaveforms};
use cutline_playback::{Editor, EditorConfig, MediaServices, PlaybackState};
use cutline_timeline::{ClipId, EditCommand, MediaSource};
use std::sync::Arc;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(2);

// ── Helpers ────────────────────────────────────────────────────

fn secs(s: i64) -> RationalTime {
    RationalTime::seconds(s)
}

fn ms(m: i64) -> RationalTime {
    RationalTime::millis(m)
}

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

fn append(editor: &mut Editor, duration: RationalTime) -> ClipId {
    let clip = editor
        .project()
        .make_clip(MediaSource::video("media/clip.mp4", duration));
    let id = clip.id;
    editor.apply(EditCommand::Append { clip }).unwrap();
    id
}

fn settled(editor: &Editor) -> bool {
    editor.playback().gates().is_clear() && !editor.scrub().is_active()
}

// ── Scrubbing ──────────────────────────────────────────────────

#[tokio::test]
async fn scrub_paces_tolerant_seeks_and_commits_once() {
    let (mut editor, engine) = editor();
    append(&mut editor, secs(10));
    assert!(editor.settle_until(settled, SETTLE).await);
    engine.clear_seeks();

    editor.begin_scrub().unwrap();
    for step in 1..=60 {
        editor.scrub_to(ms(step * 7)).unwrap();
        editor.tick();
    }
    editor.end_scrub().unwrap();
    assert!(editor.settle_until(settled, SETTLE).await);

    let frame = editor.project().timeline().frame_duration();
    let seeks = engine.seeks();
    let (precise, tolerant): (Vec<&_>, Vec<&_>) =
        seeks.iter().partition(|seek| seek.tolerance.is_zero());

    assert_eq!(precise.len(), 1);
    assert_eq!(precise[0].target, ms(420));
    assert_eq!(precise[0].mode, SeekMode::Standard);

    assert!(!tolerant.is_empty());
    assert!(tolerant.iter().all(|seek| seek.mode == SeekMode::LowLatency));
    let mut last = RationalTime::ZERO;
    for seek in &tolerant {
        assert!(seek.target.distance(last) > frame.half());
        last = seek.target;
    }

    assert_eq!(
        editor.display_time(),
        ms(420).quantize(editor.project().frame_rate())
    );
    assert_eq!(editor.playback().state(), PlaybackState::Idle);
}

#[tokio::test]
async fn edit_during_scrub_commit_keeps_both_obligations() {
    let (mut editor, engine) = editor();
    append(&mut editor, secs(10));
    assert!(editor.settle_until(settled, SETTLE).await);

    engine.hold_seeks(true);
    editor.begin_scrub().unwrap();
    editor.scrub_to(secs(6)).unwrap();
    editor.end_scrub().unwrap();
    append(&mut editor, secs(2));
    assert!(editor.playback().gates().rebuilding);
    assert!(editor.playback().gates().awaiting_seek_commit);

    engine.hold_seeks(false);
    assert_eq!(engine.release_seeks(), 2);
    assert!(editor.settle_until(settled, SETTLE).await);

    assert_eq!(editor.display_time(), secs(6));
    assert_eq!(editor.composition().duration, secs(12));
}

// ── Transport ──────────────────────────────────────────────────

#[tokio::test]
async fn playback_stops_at_end_and_restarts_from_zero() {
    let (mut editor, engine) = editor();
    append(&mut editor, secs(4));
    assert!(editor.settle_until(settled, SETTLE).await);

    editor.play();
    assert!(engine.is_playing());
    engine.advance(secs(9));
    editor.tick();
    assert_eq!(editor.playback().state(), PlaybackState::Paused);
    assert_eq!(editor.display_time(), secs(4));
    assert!(!engine.is_playing());

    editor.play();
    assert_eq!(editor.display_time(), RationalTime::ZERO);
    assert!(editor.playback().is_playing());
    assert!(engine.is_playing());
    assert_eq!(engine.seeks().last().map(|s| s.target), Some(RationalTime::ZERO));
}

// ── Editing ────────────────────────────────────────────────────

#[tokio::test]
async fn undo_rebuilds_and_clamps_playhead() {
    let (mut editor, _engine) = editor();
    append(&mut editor, secs(4));
    append(&mut editor, secs(2));
    assert!(editor.settle_until(settled, SETTLE).await);
    editor.seek(secs(5));
    assert!(editor.settle_until(settled, SETTLE).await);

    let revision = editor.revision();
    editor.undo().unwrap();
    assert_eq!(editor.revision(), revision + 1);
    assert!(editor.settle_until(settled, SETTLE).await);
    assert_eq!(editor.composition().duration, secs(4));
    assert_eq!(editor.display_time(), secs(4));
    assert!(editor.snapshot().can_redo);

    editor.redo().unwrap();
    assert!(editor.settle_until(settled, SETTLE).await);
    assert_eq!(editor.composition().duration, secs(6));
    assert_eq!(editor.snapshot().clip_count, 2);
}

#[tokio::test]
async fn extracted_audio_moves_to_its_own_track() {
    let (mut editor, _engine) = editor();
    let id = append(&mut editor, secs(4));
    assert!(editor.settle_until(settled, SETTLE).await);

    editor.apply(EditCommand::ExtractAudio { id }).unwrap();
    assert!(editor.settle_until(settled, SETTLE).await);

    let audio = &editor.composition().audio;
    assert_eq!(audio.len(), 1);
    assert!(matches!(audio[0].origin, AudioOrigin::Track(_)));
    assert_eq!(audio[0].timeline_range.duration, secs(4));
    assert!(editor.project().timeline().clips()[0].audio.muted);
}
