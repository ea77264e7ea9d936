//! Entity identities and the background-work registry.
//!
//! Every identity in a project is minted by [`IdFactory`], and every
//! identity leaves the project through [`IdFactory::retire`]. Retiring an
//! identity cancels the background work registered for it, so a split or
//! delete can never leave a worker writing into a slot that no longer exists.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// The underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identity of a clip on the main track.
    ClipId
);
entity_id!(
    /// Identity of a text, media or caption overlay.
    OverlayId
);
entity_id!(
    /// Identity of a user-added audio track.
    AudioTrackId
);

/// Reference to any selectable/trimmable entity in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Clip(ClipId),
    Text(OverlayId),
    Media(OverlayId),
    Caption(OverlayId),
    Audio(AudioTrackId),
}

impl EntityRef {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Clip(_) => "clip",
            Self::Text(_) => "text",
            Self::Media(_) => "media",
            Self::Caption(_) => "caption",
            Self::Audio(_) => "audio",
        }
    }

    /// The clip id, if this refers to a clip.
    pub fn as_clip(&self) -> Option<ClipId> {
        match self {
            Self::Clip(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clip(id) => write!(f, "clip:{id}"),
            Self::Text(id) => write!(f, "text:{id}"),
            Self::Media(id) => write!(f, "media:{id}"),
            Self::Caption(id) => write!(f, "caption:{id}"),
            Self::Audio(id) => write!(f, "audio:{id}"),
        }
    }
}

/// Kind of background work attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    Thumbnails,
    Waveform,
}

/// Key of one background job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkKey {
    pub entity: EntityRef,
    pub kind: WorkKind,
}

impl WorkKey {
    pub fn new(entity: EntityRef, kind: WorkKind) -> Self {
        Self { entity, kind }
    }
}

/// Handle given to a worker: its generation token plus a cancel flag it
/// polls between units of work.
#[derive(Debug, Clone)]
pub struct WorkTicket {
    pub key: WorkKey,
    pub generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl WorkTicket {
    /// Whether this ticket was cancelled or superseded.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    next_generation: u64,
    live: HashMap<WorkKey, WorkTicket>,
}

/// Shared table of in-flight background work, one ticket per slot.
///
/// Cloning yields another handle to the same table.
#[derive(Debug, Clone, Default)]
pub struct WorkRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new job for `key`, cancelling whatever was running there.
    pub fn begin(&self, key: WorkKey) -> WorkTicket {
        let mut state = self.state.lock();
        state.next_generation += 1;
        let ticket = WorkTicket {
            key,
            generation: state.next_generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        if let Some(previous) = state.live.insert(key, ticket.clone()) {
            previous.cancel();
            debug!(key = ?key, generation = previous.generation, "Superseded background work");
        }
        ticket
    }

    /// Cancel the job for `key`, if any. Returns whether one was running.
    pub fn cancel(&self, key: WorkKey) -> bool {
        match self.state.lock().live.remove(&key) {
            Some(ticket) => {
                ticket.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every job attached to `entity`. Returns how many were cancelled.
    pub fn cancel_entity(&self, entity: EntityRef) -> usize {
        let mut state = self.state.lock();
        let keys: Vec<WorkKey> = state
            .live
            .keys()
            .filter(|key| key.entity == entity)
            .copied()
            .collect();
        for key in &keys {
            if let Some(ticket) = state.live.remove(key) {
                ticket.cancel();
            }
        }
        keys.len()
    }

    /// Whether `generation` is still the live job for `key`.
    pub fn is_current(&self, key: WorkKey, generation: u64) -> bool {
        self.state
            .lock()
            .live
            .get(&key)
            .is_some_and(|ticket| ticket.generation == generation)
    }

    /// Mark the job for `key` complete if `generation` is still live.
    pub fn finish(&self, key: WorkKey, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.live.get(&key).is_some_and(|t| t.generation == generation) {
            state.live.remove(&key);
            true
        } else {
            false
        }
    }

    /// Number of live jobs.
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }
}

/// The single place identities are created and retired.
#[derive(Debug, Clone, Default)]
pub struct IdFactory {
    work: WorkRegistry,
}

impl IdFactory {
    /// Create a factory bound to a work registry.
    pub fn new(work: WorkRegistry) -> Self {
        Self { work }
    }

    /// The registry retirement cancels against.
    pub fn work(&self) -> &WorkRegistry {
        &self.work
    }

    pub fn clip_id(&self) -> ClipId {
        ClipId(Uuid::new_v4())
    }

    pub fn overlay_id(&self) -> OverlayId {
        OverlayId(Uuid::new_v4())
    }

    pub fn audio_track_id(&self) -> AudioTrackId {
        AudioTrackId(Uuid::new_v4())
    }

    /// Retire an identity: cancel its background work before anything
    /// replaces it.
    pub fn retire(&self, entity: EntityRef) {
        let cancelled = self.work.cancel_entity(entity);
        debug!(entity = %entity, cancelled, "Retired identity");
    }
}
