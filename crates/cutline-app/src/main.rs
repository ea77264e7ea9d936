//! Cutline - headless timeline runner
//!
//! `cutline [MANIFEST] [--out PATH]`
//!
//! Loads an export manifest (or assembles a demo timeline), drives it
//! through the editor runtime against the simulated engine, and logs the
//! resulting composition.

use anyhow::{Context, Result};
use cutline_core::{RationalTime, Speed};
use cutline_media::{Composition, SimEngine, SimExtractor, SimProber, SimWaveforms};
use cutline_playback::{Editor, EditorConfig, EditorHandle, MediaServices};
use cutline_timeline::{EditCommand, EntityRef, ExportManifest, MediaSource, Timeline};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Args {
    manifest: Option<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        manifest: None,
        out: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" => {
                let path = iter.next().context("--out needs a path")?;
                args.out = Some(PathBuf::from(path));
            }
            _ => args.manifest = Some(PathBuf::from(arg)),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    info!("Cutline starting...");

    let prober = Arc::new(SimProber::new());
    for source in demo_sources() {
        prober.register(source);
    }
    let services = MediaServices {
        engine: Arc::new(SimEngine::new()),
        extractor: Arc::new(SimExtractor),
        waveforms: Arc::new(SimWaveforms::default()),
        prober,
    };

    let (handle, task) = match &args.manifest {
        Some(path) => {
            let manifest = ExportManifest::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            info!(path = %path.display(), version = manifest.version, "Loaded manifest");
            let timeline: Timeline = manifest.into_timeline();
            EditorHandle::spawn(Editor::open(EditorConfig::default(), services, timeline))
        }
        None => {
            let (handle, task) = EditorHandle::spawn(Editor::new(EditorConfig::default(), services));
            assemble_demo(&handle).await?;
            (handle, task)
        }
    };

    let manifest = handle.export_manifest().await?;
    handle.shutdown().await?;
    let editor = task.await.context("editor task panicked")?;
    summarize(editor.composition());

    if let Some(out) = &args.out {
        manifest
            .save_to_file(out)
            .with_context(|| format!("writing {}", out.display()))?;
        info!(path = %out.display(), "Wrote manifest");
    }
    Ok(())
}

fn demo_sources() -> Vec<MediaSource> {
    vec![
        MediaSource::video("demo/opening.mp4", RationalTime::seconds(4)),
        MediaSource::video("demo/interview.mp4", RationalTime::seconds(6)),
        MediaSource::video("demo/broll.mp4", RationalTime::seconds(2)),
    ]
}

/// Import, cut and decorate a short timeline through the handle.
async fn assemble_demo(handle: &EditorHandle) -> Result<()> {
    for source in demo_sources().into_iter().take(2) {
        handle.import(source.uri.clone()).await?;
        wait_for_clips(handle, handle.snapshot().clip_count + 1).await?;
        let end = handle.snapshot().total_duration;
        handle.seek(end).await?;
    }

    handle.seek(RationalTime::seconds(5)).await?;
    handle.import("demo/broll.mp4").await?;
    wait_for_clips(handle, 4).await?;

    let manifest = handle.export_manifest().await?;
    if let Some(first) = manifest.clips.first() {
        let target = EntityRef::Clip(first.clip.id);
        handle
            .trim(target, Some(RationalTime::millis(500)), None)
            .await?;
        let speed = Speed::new(1.5)?;
        handle.apply(EditCommand::SetSpeed { target, speed }).await?;
    }

    let overlay = handle
        .call(|editor| {
            editor
                .project()
                .make_text("Cutline", RationalTime::seconds(1), RationalTime::seconds(3))
        })
        .await?;
    handle.apply(EditCommand::AddText { overlay }).await?;
    Ok(())
}

async fn wait_for_clips(handle: &EditorHandle, count: usize) -> Result<()> {
    let mut rx = handle.subscribe();
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while rx.borrow_and_update().clip_count < count {
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    if reached.is_err() {
        warn!(count, "Timed out waiting for import");
    }
    Ok(())
}

fn summarize(composition: &Composition) {
    info!(
        duration = %composition.duration,
        frame_rate = %composition.frame_rate,
        width = composition.render_size.width,
        height = composition.render_size.height,
        "Composition"
    );
    for segment in &composition.video {
        info!(
            uri = %segment.uri,
            start = %segment.timeline_range.start,
            duration = %segment.timeline_range.duration,
            speed = %segment.speed,
            "Video segment"
        );
    }
    info!(
        audio = composition.audio.len(),
        overlays = composition.overlays.len(),
        "Auxiliary tracks"
    );
}
