//! Session coordinator: turns intent calls into remote operations and applies
//! their outcomes to session state one event at a time.

use std::{future::Future, sync::Arc};

use shared::{
    domain::{ColorMode, Resolution, SessionId},
    protocol::SettingsUpdate,
};
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::{debug, info, warn};

use crate::{
    controller::{
        events::{OperationKind, SessionEvent},
        params::derive_generate_options,
        reducer::{reduce, Transition},
    },
    preview::{PreviewHandle, PreviewRegistry, PreviewSource},
    state::{SessionState, MAX_TILE_PREVIEWS},
    types::{ProgressCallback, UploadFile},
    MosaicApi,
};

type Completion = oneshot::Sender<()>;

enum Command {
    UploadTarget {
        file: UploadFile,
    },
    SetDimensions {
        width: u32,
        height: u32,
    },
    UploadTiles {
        files: Vec<UploadFile>,
        on_progress: Option<ProgressCallback>,
    },
    ClearTiles,
    UpdateSettings {
        update: SettingsUpdate,
    },
    GenerateMosaic,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::UploadTarget { .. } => "upload_target",
            Command::SetDimensions { .. } => "set_dimensions",
            Command::UploadTiles { .. } => "upload_tiles",
            Command::ClearTiles => "clear_tiles",
            Command::UpdateSettings { .. } => "update_settings",
            Command::GenerateMosaic => "generate_mosaic",
        }
    }
}

enum Message {
    Command {
        command: Command,
        done: Completion,
    },
    Set {
        event: SessionEvent,
        done: Completion,
    },
    Completed {
        event: SessionEvent,
        done: Option<Completion>,
    },
    Shutdown {
        done: Option<Completion>,
    },
}

/// Resolves once the coordinator has applied the outcome of one intent call,
/// including the no-op outcome when no session is available.
pub struct OperationTicket {
    done: oneshot::Receiver<()>,
}

impl OperationTicket {
    pub async fn settled(self) {
        // A closed channel means the coordinator is gone, which is also final.
        let _ = self.done.await;
    }
}

/// Fire-and-forget session deletion for abrupt shutdown. Holds its own
/// service handle and state view, so it keeps working after the controller is
/// dropped.
#[derive(Clone)]
pub struct SessionBeacon {
    api: Arc<dyn MosaicApi>,
    state: watch::Receiver<SessionState>,
}

impl SessionBeacon {
    pub fn fire(&self) {
        let session_id = self.state.borrow().session_id.clone();
        if let Some(session_id) = session_id {
            info!(%session_id, "sending session termination beacon");
            self.api.send_termination_beacon(&session_id);
        }
    }
}

/// Handle to a running session coordinator.
///
/// Intent methods return immediately; state changes become visible through
/// [`state`](Self::state) and [`subscribe`](Self::subscribe) once the
/// corresponding remote call settles. Dropping the controller tears the
/// session down.
pub struct SessionController {
    messages: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<SessionState>,
    previews: Arc<RwLock<PreviewRegistry>>,
    api: Arc<dyn MosaicApi>,
}

impl SessionController {
    /// Starts the coordinator on the current tokio runtime and requests a
    /// session from the service.
    pub fn spawn(api: Arc<dyn MosaicApi>) -> Self {
        let (messages, inbox) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::default());
        let previews = Arc::new(RwLock::new(PreviewRegistry::new()));

        let coordinator = Coordinator {
            api: Arc::clone(&api),
            state: SessionState::default(),
            state_tx,
            previews: Arc::clone(&previews),
            outbox: messages.clone(),
            session_pending: false,
        };
        tokio::spawn(coordinator.run(inbox));

        Self {
            messages,
            state,
            previews,
            api,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits for the session lifecycle to resolve. Returns `None` when session
    /// creation failed.
    pub async fn wait_for_session(&self) -> Option<SessionId> {
        let mut state = self.state.clone();
        let resolved = state
            .wait_for(|state| state.session_id.is_some() || state.error.is_some())
            .await
            .ok()?;
        resolved.session_id.clone()
    }

    pub async fn preview(&self, handle: &PreviewHandle) -> Option<PreviewSource> {
        self.previews.read().await.resolve(handle).cloned()
    }

    /// Number of preview handles currently alive.
    pub async fn preview_count(&self) -> usize {
        self.previews.read().await.len()
    }

    pub fn beacon(&self) -> SessionBeacon {
        SessionBeacon {
            api: Arc::clone(&self.api),
            state: self.state.clone(),
        }
    }

    pub fn upload_target(&self, file: UploadFile) -> OperationTicket {
        self.dispatch(Command::UploadTarget { file })
    }

    pub fn set_dimensions(&self, width: u32, height: u32) -> OperationTicket {
        self.dispatch(Command::SetDimensions { width, height })
    }

    pub fn upload_tiles(
        &self,
        files: Vec<UploadFile>,
        on_progress: Option<ProgressCallback>,
    ) -> OperationTicket {
        self.dispatch(Command::UploadTiles { files, on_progress })
    }

    pub fn clear_tiles(&self) -> OperationTicket {
        self.dispatch(Command::ClearTiles)
    }

    pub fn update_settings(&self, update: SettingsUpdate) -> OperationTicket {
        self.dispatch(Command::UpdateSettings { update })
    }

    pub fn generate_mosaic(&self) -> OperationTicket {
        self.dispatch(Command::GenerateMosaic)
    }

    pub fn set_tint_percentage(&self, value: u8) -> OperationTicket {
        self.set(SessionEvent::TintPercentageSet(value))
    }

    pub fn set_tile_size(&self, value: u32) -> OperationTicket {
        self.set(SessionEvent::TileSizeSet(value))
    }

    pub fn set_max_repeats_per_tile(&self, value: u32) -> OperationTicket {
        self.set(SessionEvent::MaxRepeatsPerTileSet(value))
    }

    pub fn set_color_mode(&self, mode: ColorMode) -> OperationTicket {
        self.set(SessionEvent::ColorModeSet(mode))
    }

    pub fn set_resolution(&self, resolution: Resolution) -> OperationTicket {
        self.set(SessionEvent::ResolutionSet(resolution))
    }

    pub fn set_use_all_tiles(&self, value: bool) -> OperationTicket {
        self.set(SessionEvent::UseAllTilesSet(value))
    }

    pub fn set_manual_mode(&self, value: bool) -> OperationTicket {
        self.set(SessionEvent::ManualModeSet(value))
    }

    pub fn set_nine_x_detail(&self, enabled: bool) -> OperationTicket {
        self.set(SessionEvent::NineXDetailSet(enabled))
    }

    /// Tears the session down; the remote deletion is not awaited.
    pub fn shutdown(self) {
        drop(self);
    }

    /// Tears the session down and waits until the service has been asked to
    /// delete it. Hosts that exit right after use this instead of
    /// [`shutdown`](Self::shutdown).
    pub async fn close(self) {
        let (done_tx, done) = oneshot::channel();
        if self
            .messages
            .send(Message::Shutdown {
                done: Some(done_tx),
            })
            .is_ok()
        {
            let _ = done.await;
        }
    }

    fn set(&self, event: SessionEvent) -> OperationTicket {
        let (done_tx, done) = oneshot::channel();
        if self
            .messages
            .send(Message::Set {
                event,
                done: done_tx,
            })
            .is_err()
        {
            warn!("session coordinator stopped; preference change dropped");
        }
        OperationTicket { done }
    }

    fn dispatch(&self, command: Command) -> OperationTicket {
        let (done_tx, done) = oneshot::channel();
        let name = command.name();
        match self.messages.send(Message::Command {
            command,
            done: done_tx,
        }) {
            Ok(()) => debug!(command = name, "queued session command"),
            Err(_) => warn!(command = name, "session coordinator stopped; command dropped"),
        }
        OperationTicket { done }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let _ = self.messages.send(Message::Shutdown { done: None });
    }
}

struct Coordinator {
    api: Arc<dyn MosaicApi>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    previews: Arc<RwLock<PreviewRegistry>>,
    outbox: mpsc::UnboundedSender<Message>,
    session_pending: bool,
}

impl Coordinator {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        self.start_session();

        let mut closing = false;
        let mut closed = Vec::new();
        while let Some(message) = inbox.recv().await {
            match message {
                Message::Command { command, done } => {
                    if closing {
                        continue;
                    }
                    self.handle_command(command, done).await;
                }
                Message::Set { event, done } => {
                    if closing {
                        continue;
                    }
                    self.apply(event).await;
                    let _ = done.send(());
                }
                Message::Completed { event, done } => {
                    if matches!(
                        event,
                        SessionEvent::SessionCreated(_)
                            | SessionEvent::OperationFailed {
                                kind: OperationKind::CreateSession,
                                ..
                            }
                    ) {
                        self.session_pending = false;
                    }
                    self.apply(event).await;
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    if closing && !self.session_pending {
                        break;
                    }
                }
                Message::Shutdown { done } => {
                    closing = true;
                    closed.extend(done);
                    if !self.session_pending {
                        break;
                    }
                    debug!("teardown requested while session creation is pending");
                }
            }
        }

        self.teardown(closed);
    }

    fn start_session(&mut self) {
        self.session_pending = true;
        let api = Arc::clone(&self.api);
        self.spawn_operation(None, async move {
            match api.create_session().await {
                Ok(session_id) => {
                    info!(%session_id, "session established");
                    SessionEvent::SessionCreated(session_id)
                }
                Err(err) => {
                    warn!("session creation failed: {err}");
                    SessionEvent::failed(OperationKind::CreateSession)
                }
            }
        });
    }

    fn teardown(&self, waiters: Vec<Completion>) {
        let Some(session_id) = self.state.session_id.clone() else {
            for waiter in waiters {
                let _ = waiter.send(());
            }
            return;
        };
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(err) = api.delete_session(&session_id).await {
                warn!(%session_id, "session deletion failed: {err}");
            }
            for waiter in waiters {
                let _ = waiter.send(());
            }
        });
    }

    async fn handle_command(&mut self, command: Command, done: Completion) {
        let Some(session_id) = self.state.session_id.clone() else {
            debug!(command = command.name(), "no session; command ignored");
            let _ = done.send(());
            return;
        };

        match command {
            Command::UploadTarget { file } => {
                let kind = OperationKind::UploadTarget;
                self.apply(SessionEvent::OperationStarted(kind)).await;
                let preview = self.previews.write().await.create_or_empty(&file);
                let api = Arc::clone(&self.api);
                self.spawn_operation(Some(done), async move {
                    match api.upload_target_image(&session_id, file).await {
                        Ok(response) => SessionEvent::TargetUploaded { preview, response },
                        Err(err) => {
                            warn!(%session_id, "target upload failed: {err}");
                            SessionEvent::failed(kind).with_discarded_previews(vec![preview])
                        }
                    }
                });
            }
            Command::SetDimensions { width, height } => {
                let kind = OperationKind::SetDimensions;
                self.apply(SessionEvent::OperationStarted(kind)).await;
                let api = Arc::clone(&self.api);
                self.spawn_operation(Some(done), async move {
                    match api.set_dimensions(&session_id, width, height).await {
                        Ok(requirements) => SessionEvent::DimensionsSet {
                            width,
                            height,
                            requirements,
                        },
                        Err(err) => {
                            warn!(%session_id, width, height, "setting dimensions failed: {err}");
                            SessionEvent::failed(kind)
                        }
                    }
                });
            }
            Command::UploadTiles { files, on_progress } => {
                let kind = OperationKind::UploadTiles;
                self.apply(SessionEvent::OperationStarted(kind)).await;

                let previews = {
                    let mut registry = self.previews.write().await;
                    let mut previews = Vec::new();
                    let mut failure = None;
                    for file in files.iter().take(MAX_TILE_PREVIEWS) {
                        match registry.create(file) {
                            Ok(handle) => previews.push(handle),
                            Err(err) => {
                                failure = Some(err);
                                break;
                            }
                        }
                    }
                    if let Some(err) = failure {
                        warn!(%session_id, "tile preview failed: {err}");
                        registry.revoke_all(&previews);
                        None
                    } else {
                        Some(previews)
                    }
                };
                let Some(previews) = previews else {
                    self.apply(SessionEvent::failed(kind)).await;
                    let _ = done.send(());
                    return;
                };

                let api = Arc::clone(&self.api);
                self.spawn_operation(Some(done), async move {
                    match api.upload_tile_images(&session_id, files, on_progress).await {
                        Ok(total_tiles) => SessionEvent::TilesUploaded {
                            total_tiles,
                            previews,
                        },
                        Err(err) => {
                            warn!(%session_id, "tile upload failed: {err}");
                            SessionEvent::failed(kind).with_discarded_previews(previews)
                        }
                    }
                });
            }
            Command::ClearTiles => {
                let kind = OperationKind::ClearTiles;
                self.apply(SessionEvent::OperationStarted(kind)).await;
                let api = Arc::clone(&self.api);
                self.spawn_operation(Some(done), async move {
                    match api.clear_tiles(&session_id).await {
                        Ok(()) => SessionEvent::TilesCleared,
                        Err(err) => {
                            warn!(%session_id, "clearing tiles failed: {err}");
                            SessionEvent::failed(kind)
                        }
                    }
                });
            }
            Command::UpdateSettings { update } => {
                let kind = OperationKind::UpdateSettings;
                self.apply(SessionEvent::OperationStarted(kind)).await;
                let api = Arc::clone(&self.api);
                self.spawn_operation(Some(done), async move {
                    let remote = update.remote_subset();
                    if !remote.is_empty() {
                        if let Err(err) = api.update_settings(&session_id, &remote).await {
                            warn!(%session_id, "settings update failed: {err}");
                            return SessionEvent::failed(kind);
                        }
                    }
                    SessionEvent::SettingsApplied(update)
                });
            }
            Command::GenerateMosaic => {
                let kind = OperationKind::GenerateMosaic;
                self.apply(SessionEvent::OperationStarted(kind)).await;
                let options = derive_generate_options(&self.state);
                debug!(%session_id, ?options, "requesting mosaic generation");
                let api = Arc::clone(&self.api);
                self.spawn_operation(Some(done), async move {
                    match api.generate_mosaic(&session_id, &options).await {
                        Ok(metadata) => SessionEvent::MosaicGenerated(metadata),
                        Err(err) => {
                            warn!(%session_id, "mosaic generation failed: {err}");
                            SessionEvent::OperationFailed {
                                kind,
                                message: err.describe(kind.failure_message()),
                                discarded_previews: Vec::new(),
                            }
                        }
                    }
                });
            }
        }
    }

    fn spawn_operation<F>(&self, done: Option<Completion>, operation: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let outbox = self.outbox.clone();
        tokio::spawn(async move {
            let event = operation.await;
            // The coordinator may already be gone after teardown.
            let _ = outbox.send(Message::Completed { event, done });
        });
    }

    async fn apply(&mut self, event: SessionEvent) {
        let Transition { state, released } = reduce(std::mem::take(&mut self.state), event);
        self.state = state;
        if !released.is_empty() {
            self.previews.write().await.revoke_all(&released);
        }
        self.state_tx.send_replace(self.state.clone());
    }
}

#[cfg(test)]
#[path = "tests/orchestration_tests.rs"]
mod tests;
