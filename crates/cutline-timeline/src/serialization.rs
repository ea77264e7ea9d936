//! Export manifest with versioning and migration.
//!
//! The manifest is what an export pipeline consumes: the timeline itself
//! plus every derived timing resolved to absolute values, so a reader does
//! not have to reimplement start-of-clip arithmetic.

use cutline_core::{CutlineError, FrameRate, RationalTime, Result, Size, TimeRange};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::clip::Clip;
use crate::ids::EntityRef;
use crate::lane::LaneEntity;
use crate::project::{Project, RenderConfig, Timeline};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// A clip with its absolute placement on the main track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedClip {
    /// Absolute timeline range
    pub range: TimeRange,
    /// Source range that plays over `range`
    pub source_range: TimeRange,
    pub clip: Clip,
}

/// Absolute visible window of a lane entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWindow {
    pub entity: EntityRef,
    pub range: TimeRange,
}

/// Versioned export description of a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    /// Schema version for migration.
    pub version: u32,
    /// Application version that wrote this manifest.
    pub app_version: String,
    pub render: RenderConfig,
    pub render_size: Size,
    pub frame_rate: FrameRate,
    pub duration: RationalTime,
    pub clips: Vec<ResolvedClip>,
    /// Visible windows of every lane entity, truncated to the project end
    pub windows: Vec<ResolvedWindow>,
    /// The full timeline, lanes included
    pub timeline: Timeline,
}

fn lane_windows<'a, T: LaneEntity + 'a>(
    items: impl Iterator<Item = &'a T> + 'a,
    wrap: fn(T::Id) -> EntityRef,
    end: RationalTime,
) -> impl Iterator<Item = ResolvedWindow> + 'a {
    items.filter_map(move |item| {
        let range = item.schedule().visible_range().truncate_to(end)?;
        Some(ResolvedWindow {
            entity: wrap(item.id()),
            range,
        })
    })
}

impl ExportManifest {
    /// Describe `project`'s current timeline.
    pub fn from_project(project: &Project) -> Self {
        Self::from_timeline(project.timeline())
    }

    pub fn from_timeline(timeline: &Timeline) -> Self {
        let duration = timeline.total_duration();
        let mut start = RationalTime::ZERO;
        let clips = timeline
            .clips()
            .iter()
            .map(|clip| {
                let range = TimeRange::new(start, clip.effective_duration());
                start += clip.effective_duration();
                ResolvedClip {
                    range,
                    source_range: clip.source_range(),
                    clip: clip.clone(),
                }
            })
            .collect();

        let windows = lane_windows(timeline.text_overlays().iter(), EntityRef::Text, duration)
            .chain(lane_windows(timeline.media_overlays().iter(), EntityRef::Media, duration))
            .chain(lane_windows(timeline.captions().iter(), EntityRef::Caption, duration))
            .chain(lane_windows(timeline.audio_tracks().iter(), EntityRef::Audio, duration))
            .collect();

        Self {
            version: CURRENT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            render: timeline.render,
            render_size: timeline
                .render
                .render_size(timeline.clips().first().map(|clip| &clip.source)),
            frame_rate: timeline.frame_rate(),
            duration,
            clips,
            windows,
            timeline: timeline.clone(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CutlineError::Serialization(format!("Failed to serialize manifest: {e}")))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| CutlineError::Serialization(format!("Invalid JSON: {e}")))?;

        let version = raw
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;

        if version > CURRENT_VERSION {
            return Err(CutlineError::Serialization(format!(
                "Manifest version {version} is newer than supported version {CURRENT_VERSION}"
            )));
        }

        let migrated = migrate(raw, version)?;
        let manifest: Self = serde_json::from_value(migrated)
            .map_err(|e| CutlineError::Serialization(format!("Failed to parse manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject manifests that parse but describe an impossible timeline.
    fn validate(&self) -> Result<()> {
        let rates = std::iter::once(self.frame_rate)
            .chain(self.timeline.clips().iter().map(|clip| clip.source.frame_rate));
        for rate in rates {
            if rate.numerator == 0 || rate.denominator == 0 {
                return Err(CutlineError::Serialization(format!(
                    "Invalid frame rate {}/{}",
                    rate.numerator, rate.denominator
                )));
            }
        }
        let timeline = &self.timeline;
        timeline
            .check_invariants(timeline.frame_duration())
            .map_err(|e| CutlineError::Serialization(format!("Invalid manifest timeline: {e}")))?;
        if self.duration != timeline.total_duration() {
            return Err(CutlineError::Serialization(format!(
                "Manifest duration {} does not match its timeline ({})",
                self.duration,
                timeline.total_duration()
            )));
        }
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    /// The timeline this manifest describes.
    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }
}

/// Apply sequential migrations from `from_version` to [`CURRENT_VERSION`].
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 was a bare timeline; derived timing is recomputed
                if data.get("version").is_none() {
                    let timeline: Timeline = serde_json::from_value(data).map_err(|e| {
                        CutlineError::Serialization(format!("Failed to parse v0 timeline: {e}"))
                    })?;
                    let mut upgraded = ExportManifest::from_timeline(&timeline);
                    upgraded.app_version = "0.0.0".into();
                    data = serde_json::to_value(upgraded).map_err(|e| {
                        CutlineError::Serialization(format!("Failed to upgrade manifest: {e}"))
                    })?;
                }
                version = 1;
            }
            _ => {
                return Err(CutlineError::Serialization(format!(
                    "No migration path from version {version}"
                )));
            }
        }
    }

    Ok(data)
}
