//! Integration tests for composition building and export manifests.

use cutline_core::{RationalTime, Speed, TimeRange};
use cutline_media::{AudioOrigin, CompositionBuilder};
use cutline_timeline::{EditCommand, EntityRef, ExportManifest, MediaSource, Project};

// ── Helpers ────────────────────────────────────────────────────

fn secs(s: i64) -> RationalTime {
    RationalTime::seconds(s)
}

fn ms(m: i64) -> RationalTime {
    RationalTime::millis(m)
}

/// Three clips, a title, a music bed running past the end and a b-roll
/// overlay.
fn busy_project() -> Project {
    let mut project = Project::default();
    for (uri, d) in [("a.mp4", 4), ("b.mp4", 6), ("c.mp4", 3)] {
        let clip = project.make_clip(MediaSource::video(uri, secs(d)));
        project.apply(EditCommand::Append { clip }).unwrap();
    }
    let second = project.timeline().clips()[1].id;
    project
        .apply(EditCommand::SetSpeed {
            target: EntityRef::Clip(second),
            speed: Speed::new(2.0).unwrap(),
        })
        .unwrap();

    let overlay = project.make_text("Title", secs(1), secs(3));
    project.apply(EditCommand::AddText { overlay }).unwrap();
    let track = project.make_audio_track(MediaSource::video("music.m4a", secs(60)), secs(2));
    project.apply(EditCommand::AddAudioTrack { track }).unwrap();
    let overlay = project.make_media_overlay(MediaSource::video("broll.mov", secs(5)), secs(6), secs(5));
    project.apply(EditCommand::AddMedia { overlay }).unwrap();
    project
}

// ── Composition ────────────────────────────────────────────────

#[test]
fn speed_change_shifts_following_segments() {
    let project = busy_project();
    let composition = CompositionBuilder::new(project.timeline()).build();

    let ranges: Vec<TimeRange> = composition.video.iter().map(|s| s.timeline_range).collect();
    assert_eq!(
        ranges,
        vec![
            TimeRange::new(secs(0), secs(4)),
            TimeRange::new(secs(4), secs(3)),
            TimeRange::new(secs(7), secs(3)),
        ]
    );
    assert_eq!(composition.duration, secs(10));
    assert_eq!(composition.segment_at(secs(5)).unwrap().uri, "b.mp4");
}

#[test]
fn lane_media_is_truncated_at_project_end() {
    let project = busy_project();
    let composition = CompositionBuilder::new(project.timeline()).build();

    let music = composition
        .audio
        .iter()
        .find(|a| matches!(a.origin, AudioOrigin::Track(_)))
        .unwrap();
    assert_eq!(music.timeline_range, TimeRange::new(secs(2), secs(8)));
    assert_eq!(music.source_range.duration, secs(8));

    assert_eq!(composition.overlays.len(), 1);
    assert_eq!(
        composition.overlays[0].timeline_range,
        TimeRange::new(secs(6), secs(4))
    );
    assert!(composition
        .audio
        .iter()
        .all(|a| a.timeline_range.end() <= composition.duration));
}

#[test]
fn split_segments_play_the_same_source() {
    let mut project = busy_project();
    let before = CompositionBuilder::new(project.timeline()).build();
    project.apply(EditCommand::SplitAt { at: ms(5500) }).unwrap();
    let after = CompositionBuilder::new(project.timeline()).build();

    assert_eq!(after.video.len(), before.video.len() + 1);
    assert_eq!(after.duration, before.duration);
    let (left, right) = (&after.video[1], &after.video[2]);
    assert_eq!(left.source_range.end(), right.source_range.start);
    assert_eq!(left.timeline_range.end(), right.timeline_range.start);
    assert_eq!(
        left.source_range.duration + right.source_range.duration,
        before.video[1].source_range.duration
    );
}

#[test]
fn muting_removes_only_that_clips_audio() {
    let mut project = busy_project();
    let first = project.timeline().clips()[0].id;
    project
        .apply(EditCommand::SetMuted { id: first, muted: true })
        .unwrap();
    let composition = CompositionBuilder::new(project.timeline()).build();

    assert!(!composition
        .audio
        .iter()
        .any(|a| a.origin == AudioOrigin::Clip(first)));
    assert_eq!(
        composition
            .audio
            .iter()
            .filter(|a| matches!(a.origin, AudioOrigin::Clip(_)))
            .count(),
        2
    );
}

// ── Export manifest ────────────────────────────────────────────

#[test]
fn manifest_round_trip_rebuilds_identical_composition() {
    let project = busy_project();
    let original = CompositionBuilder::new(project.timeline()).build();

    let json = ExportManifest::from_project(&project).to_json().unwrap();
    let manifest = ExportManifest::from_json(&json).unwrap();
    assert_eq!(manifest.duration, secs(10));
    assert_eq!(manifest.clips.len(), 3);

    let timeline = manifest.into_timeline();
    let rebuilt = CompositionBuilder::new(&timeline).build();
    assert_eq!(rebuilt, original);
}

#[test]
fn manifest_windows_are_truncated() {
    let project = busy_project();
    let manifest = ExportManifest::from_project(&project);

    assert_eq!(manifest.windows.len(), 3);
    assert!(manifest
        .windows
        .iter()
        .all(|w| w.range.end() <= manifest.duration));
    let resolved: Vec<RationalTime> = manifest.clips.iter().map(|c| c.range.start).collect();
    assert_eq!(resolved, vec![secs(0), secs(4), secs(7)]);
}

#[test]
fn manifest_file_round_trip() {
    let project = busy_project();
    let path = std::env::temp_dir().join(format!("cutline-manifest-{}.json", std::process::id()));

    ExportManifest::from_project(&project).save_to_file(&path).unwrap();
    let loaded = ExportManifest::load_from_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.timeline.total_duration(), project.total_duration());
    assert_eq!(loaded.windows, ExportManifest::from_project(&project).windows);
}
