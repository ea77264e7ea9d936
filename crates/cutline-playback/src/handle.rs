//! Actor front-end for the [`Editor`].
//!
//! The editor runs on its own task; callers hold a cloneable handle and send
//! it closures. One loop interleaves requests, background results and the
//! frame ticker, and publishes a snapshot after each.

use cutline_core::{CutlineError, RationalTime, Result};
use cutline_timeline::{
    EditCommand, EditOutcome, EntityRef, ExportManifest, RenderConfig, Schedule, TrimOutcome,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::editor::Editor;
use crate::snapshot::EditorSnapshot;

type Job = Box<dyn FnOnce(&mut Editor) + Send>;

enum Request {
    Call(Job),
    Shutdown,
}

#[derive(Clone)]
pub struct EditorHandle {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<EditorSnapshot>,
}

impl EditorHandle {
    /// Move `editor` onto its own task. The join handle yields it back after
    /// shutdown.
    pub fn spawn(editor: Editor) -> (Self, JoinHandle<Editor>) {
        let (requests, rx) = mpsc::channel(64);
        let snapshots = editor.subscribe();
        let task = tokio::spawn(run(editor, rx));
        (Self { requests, snapshots }, task)
    }

    /// Run `f` on the editor task and return its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Editor) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |editor| {
            let _ = tx.send(f(editor));
        });
        self.requests
            .send(Request::Call(job))
            .await
            .map_err(|_| CutlineError::Internal("editor has stopped".into()))?;
        rx.await
            .map_err(|_| CutlineError::Internal("editor dropped the request".into()))
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> EditorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorSnapshot> {
        self.snapshots.clone()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.requests
            .send(Request::Shutdown)
            .await
            .map_err(|_| CutlineError::Internal("editor has stopped".into()))
    }

    // ── Transport ──────────────────────────────────────────────

    pub async fn play(&self) -> Result<()> {
        self.call(Editor::play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(Editor::pause).await
    }

    pub async fn seek(&self, time: RationalTime) -> Result<()> {
        self.call(move |e| e.seek(time)).await
    }

    pub async fn begin_scrub(&self) -> Result<()> {
        self.call(Editor::begin_scrub).await?
    }

    pub async fn scrub_to(&self, time: RationalTime) -> Result<RationalTime> {
        self.call(move |e| e.scrub_to(time)).await?
    }

    pub async fn end_scrub(&self) -> Result<()> {
        self.call(Editor::end_scrub).await?
    }

    // ── Trim ───────────────────────────────────────────────────

    pub async fn begin_trim(&self, target: EntityRef) -> Result<()> {
        self.call(move |e| e.begin_trim(target)).await?
    }

    pub async fn apply_trim(
        &self,
        left: Option<RationalTime>,
        right: Option<RationalTime>,
    ) -> Result<Schedule> {
        self.call(move |e| e.apply_trim(left, right)).await?
    }

    pub async fn end_trim(&self) -> Result<TrimOutcome> {
        self.call(Editor::end_trim).await?
    }

    pub async fn cancel_trim(&self) -> Result<()> {
        self.call(Editor::cancel_trim).await?
    }

    /// One-shot trim outside a gesture.
    pub async fn trim(
        &self,
        target: EntityRef,
        left: Option<RationalTime>,
        right: Option<RationalTime>,
    ) -> Result<EditOutcome> {
        self.apply(EditCommand::Trim {
            target,
            left,
            right,
        })
        .await
    }

    // ── Editing ────────────────────────────────────────────────

    pub async fn apply(&self, command: EditCommand) -> Result<EditOutcome> {
        self.call(move |e| e.apply(command)).await?
    }

    pub async fn split(&self) -> Result<EditOutcome> {
        self.call(Editor::split).await?
    }

    pub async fn undo(&self) -> Result<EditOutcome> {
        self.call(Editor::undo).await?
    }

    pub async fn redo(&self) -> Result<EditOutcome> {
        self.call(Editor::redo).await?
    }

    pub async fn select(&self, entity: Option<EntityRef>) -> Result<()> {
        self.call(move |e| e.select(entity)).await?
    }

    pub async fn set_render_config(&self, config: RenderConfig) -> Result<EditOutcome> {
        self.apply(EditCommand::SetRenderConfig { config }).await
    }

    pub async fn set_zoom(&self, zoom: f32) -> Result<()> {
        self.call(move |e| e.set_zoom(zoom)).await
    }

    /// Queue an import at the current playhead.
    pub async fn import(&self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        self.call(move |e| e.import(uri)).await
    }

    pub async fn export_manifest(&self) -> Result<ExportManifest> {
        self.call(|e| e.export_manifest()).await
    }
}

async fn run(mut editor: Editor, mut requests: mpsc::Receiver<Request>) -> Editor {
    let mut ticker = tokio::time::interval(editor.config().frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Editor started");

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(Request::Call(job)) => job(&mut editor),
                Some(Request::Shutdown) | None => break,
            },
            Some(event) = editor.events_rx.recv() => editor.handle_event(event),
            Some(update) = editor.thumbnail_rx.recv() => editor.handle_thumbnail(update),
            _ = ticker.tick() => editor.tick(),
        }
        editor.publish();
    }

    info!("Editor stopped");
    editor
}
