//! The document sync controller.
//!
//! Binds the grid in the editing surface to an optional blob in the remote
//! store and moves it between states:
//!
//! ```text
//! Unbound --share ok--> Bound --update ok--> Bound
//! Bound --delete ok--> Unbound
//! Unbound --load ok--> Bound      (load failure stays Unbound, blank grid)
//! any failure leaves the binding as it was
//! ```
//!
//! ## Lifecycle
//!
//! One controller per mounted editor view. [`DocumentSyncController::teardown`]
//! (or dropping the last handle) cancels autosave and the readiness listener.
//! Network calls already in flight still complete, but their results are
//! dropped without touching state.
//!
//! ## Concurrency
//!
//! Every operation returns immediately with [`Outcome::NotReady`] until the
//! readiness gate opens. Network operations are mutually exclusive through
//! [`SyncStatus`]: a second request while one is in flight is rejected, never
//! queued. The state lock is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use gridshare_common::BlobStore;
use n0_future::task::{self, AbortOnDropHandle};
use smol_str::SmolStr;

use crate::autosave::{self, AutosaveErrorFilter, DEFAULT_AUTOSAVE_PERIOD, Tick};
use crate::document::Document;
use crate::error::{SurfaceError, SyncError};
use crate::platform::{
    EditingSurface, ImportFile, Navigator, NoopNavigator, NotificationSink, TracingNotifier,
};
use crate::readiness::{ReadinessGate, ReadinessState};
use crate::state::{
    ActionAvailability, Operation, Outcome, RemoteBinding, Route, Skip, SyncStatus,
};

#[cfg(test)]
mod tests;

/// Owns the binding between the local grid and a remote blob.
///
/// Cheap to clone; clones drive the same controller.
pub struct DocumentSyncController<B, S> {
    inner: Arc<Inner<B, S>>,
}

impl<B, S> Clone for DocumentSyncController<B, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<B, S> {
    store: B,
    surface: S,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn NotificationSink>,
    gate: ReadinessGate,
    autosave_period: Option<Duration>,
    inbound: Option<SmolStr>,
    state: Mutex<ControllerState>,
}

#[derive(Default)]
struct ControllerState {
    torn_down: bool,
    initialized: bool,
    binding: Option<RemoteBinding>,
    status: SyncStatus,
    importing: bool,
    exporting: bool,
    autosave_errors: AutosaveErrorFilter,
    autosave: Option<AbortOnDropHandle<()>>,
    ready_listener: Option<AbortOnDropHandle<()>>,
}

/// Whether an update was asked for by the user or by the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    User,
    Autosave,
}

/// Builder for [`DocumentSyncController`].
pub struct ControllerBuilder<B, S> {
    store: B,
    surface: S,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn NotificationSink>,
    gate: ReadinessGate,
    autosave_period: Option<Duration>,
    inbound: Option<SmolStr>,
}

impl<B, S> ControllerBuilder<B, S>
where
    B: BlobStore + Send + Sync + 'static,
    S: EditingSurface + Send + Sync + 'static,
{
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Gate the controller waits on. Defaults to a fresh, not-ready gate.
    pub fn gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = gate;
        self
    }

    /// Autosave period while bound. `None` disables autosave.
    pub fn autosave_period(mut self, period: Option<Duration>) -> Self {
        self.autosave_period = period.filter(|p| !p.is_zero());
        self
    }

    /// Identifier from the URL the view was opened with.
    pub fn inbound_identifier(mut self, identifier: Option<impl Into<SmolStr>>) -> Self {
        self.inbound = identifier.map(Into::into);
        self
    }

    pub fn build(self) -> DocumentSyncController<B, S> {
        DocumentSyncController {
            inner: Arc::new(Inner {
                store: self.store,
                surface: self.surface,
                navigator: self.navigator,
                notifier: self.notifier,
                gate: self.gate,
                autosave_period: self.autosave_period,
                inbound: self.inbound,
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    /// Build and [`attach`](DocumentSyncController::attach). Must be called
    /// from within the executor.
    pub fn mount(self) -> DocumentSyncController<B, S> {
        let controller = self.build();
        controller.attach();
        controller
    }
}

impl<B, S> DocumentSyncController<B, S>
where
    B: BlobStore + Send + Sync + 'static,
    S: EditingSurface + Send + Sync + 'static,
{
    pub fn builder(store: B, surface: S) -> ControllerBuilder<B, S> {
        ControllerBuilder {
            store,
            surface,
            navigator: Arc::new(NoopNavigator),
            notifier: Arc::new(TracingNotifier),
            gate: ReadinessGate::new(),
            autosave_period: Some(DEFAULT_AUTOSAVE_PERIOD),
            inbound: None,
        }
    }

    /// Subscribe to the readiness gate: once the surface is ready, run
    /// [`initialize`](Self::initialize) with the inbound identifier.
    ///
    /// Safe to combine with a direct `initialize` call; only the first one
    /// runs.
    pub fn attach(&self) {
        let weak = Arc::downgrade(&self.inner);
        let gate = self.inner.gate.clone();
        let inbound = self.inner.inbound.clone();
        let handle = AbortOnDropHandle::new(task::spawn(async move {
            gate.wait_ready().await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let controller = DocumentSyncController { inner };
            let outcome = controller.initialize(inbound.as_deref()).await;
            tracing::debug!(?outcome, "initialized after readiness");
        }));

        let mut state = self.state();
        if !state.torn_down {
            state.ready_listener = Some(handle);
        }
    }

    /// Load the grid: the shared document named by `identifier`, or the
    /// blank template.
    ///
    /// A failed load is not fatal. The blank template is used, the controller
    /// stays unbound and a warning is shown.
    ///
    /// Skipped once a network operation or an import has started, so a
    /// readiness listener that runs late never replaces the user's grid or
    /// binding.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self, identifier: Option<&str>) -> Outcome {
        let inner = &self.inner;
        if !inner.gate.is_ready() {
            return Outcome::NotReady;
        }
        {
            let mut state = self.state();
            if state.torn_down {
                return Outcome::Discarded;
            }
            if state.initialized {
                return Outcome::Skipped(Skip::AlreadyInitialized);
            }
            if let Some(in_flight) = state.status.in_flight() {
                return Outcome::Rejected {
                    requested: Operation::Initialize,
                    in_flight,
                };
            }
            state.initialized = true;
            if identifier.is_some() {
                state.status = SyncStatus::Loading;
            }
        }

        let Some(id) = identifier else {
            inner.surface.replace_document(Document::blank());
            tracing::debug!("started with blank document");
            return Outcome::Completed;
        };

        let result = inner.store.read(id).await;

        {
            let mut state = self.state();
            if state.torn_down {
                return Outcome::Discarded;
            }
            state.status = SyncStatus::Idle;
            if result.is_ok() {
                state.binding = Some(RemoteBinding::new(id.into()));
            }
        }

        match result {
            Ok(value) => {
                inner.surface.replace_document(Document::from(value));
                self.start_autosave();
                tracing::info!(id, "loaded shared document");
                Outcome::Completed
            }
            Err(source) => {
                inner.surface.replace_document(Document::blank());
                inner.notifier.warning(format!(
                    "Could not load shared spreadsheet {id}, starting with a blank one: {source}"
                ));
                Outcome::Failed(SyncError::Load {
                    id: id.into(),
                    source,
                })
            }
        }
    }

    /// Store the current grid as a new blob and bind to it.
    ///
    /// Rejected while another operation is in flight. Skipped when already
    /// bound: a bound document is kept up to date with `update` instead.
    #[tracing::instrument(skip(self))]
    pub async fn share(&self) -> Outcome {
        let inner = &self.inner;
        if let Err(outcome) = self.begin(Operation::Share, SyncStatus::Sharing, |binding| {
            binding.is_some().then_some(Skip::AlreadyBound)
        }) {
            return outcome;
        }

        let document = inner.surface.current_document();
        let result = inner.store.create(document.as_value()).await;

        {
            let mut state = self.state();
            if state.torn_down {
                return Outcome::Discarded;
            }
            state.status = SyncStatus::Idle;
            if let Ok(id) = &result {
                state.binding = Some(RemoteBinding::new(id.clone()));
                state.autosave_errors.reset();
            }
        }

        match result {
            Ok(id) => {
                tracing::info!(%id, "document shared");
                self.start_autosave();
                inner.navigator.navigate(&Route::Document(id.clone()));
                inner
                    .notifier
                    .success(format!("Spreadsheet shared as {id}"));
                Outcome::Completed
            }
            Err(e) => {
                inner
                    .notifier
                    .error(format!("Failed to share spreadsheet: {e}"));
                Outcome::Failed(e.into())
            }
        }
    }

    /// Push the current grid to the bound blob.
    pub async fn update(&self) -> Outcome {
        self.update_with(Trigger::User).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_with(&self, trigger: Trigger) -> Outcome {
        let inner = &self.inner;
        let requested = match trigger {
            Trigger::User => Operation::Update,
            Trigger::Autosave => Operation::Autosave,
        };
        let id = match self.begin(requested, SyncStatus::Updating, |binding| {
            binding.is_none().then_some(Skip::NotBound)
        }) {
            Ok(Some(binding)) => binding.identifier().clone(),
            Ok(None) => return Outcome::Skipped(Skip::NotBound),
            Err(outcome) => return outcome,
        };

        let document = inner.surface.current_document();
        let result = inner.store.update(&id, document.as_value()).await;

        let report_error = {
            let mut state = self.state();
            if state.torn_down {
                return Outcome::Discarded;
            }
            state.status = SyncStatus::Idle;
            match &result {
                Ok(()) => {
                    let suppressed = state.autosave_errors.reset();
                    if suppressed > 0 {
                        tracing::info!(suppressed, "autosave recovered");
                    }
                    false
                }
                Err(e) => match trigger {
                    Trigger::User => true,
                    Trigger::Autosave => state.autosave_errors.should_report(&e.to_string()),
                },
            }
        };

        match result {
            Ok(()) => {
                tracing::debug!(%id, ?trigger, "document updated");
                if trigger == Trigger::User {
                    inner.notifier.success("Spreadsheet updated".to_owned());
                }
                Outcome::Completed
            }
            Err(e) => {
                if report_error {
                    let message = match trigger {
                        Trigger::User => format!("Failed to update spreadsheet: {e}"),
                        Trigger::Autosave => format!("Autosave failed: {e}"),
                    };
                    inner.notifier.error(message);
                } else {
                    tracing::debug!(error = %e, "repeated autosave failure suppressed");
                }
                Outcome::Failed(e.into())
            }
        }
    }

    /// Remove the bound blob and unbind.
    ///
    /// On failure the binding is kept: the blob may or may not still exist,
    /// and dropping the identifier would lose the only handle to it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self) -> Outcome {
        let inner = &self.inner;
        let id = match self.begin(Operation::Delete, SyncStatus::Deleting, |binding| {
            binding.is_none().then_some(Skip::NotBound)
        }) {
            Ok(Some(binding)) => binding.identifier().clone(),
            Ok(None) => return Outcome::Skipped(Skip::NotBound),
            Err(outcome) => return outcome,
        };

        let result = inner.store.delete(&id).await;

        let autosave = {
            let mut state = self.state();
            if state.torn_down {
                return Outcome::Discarded;
            }
            state.status = SyncStatus::Idle;
            if result.is_ok() {
                state.binding = None;
                state.autosave_errors.reset();
                state.autosave.take()
            } else {
                None
            }
        };
        drop(autosave);

        match result {
            Ok(()) => {
                tracing::info!(%id, "shared document deleted");
                inner.navigator.navigate(&Route::Root);
                inner
                    .notifier
                    .success("Shared spreadsheet deleted".to_owned());
                Outcome::Completed
            }
            Err(e) => {
                inner
                    .notifier
                    .error(format!("Failed to delete spreadsheet: {e}"));
                Outcome::Failed(e.into())
            }
        }
    }

    /// Import a spreadsheet file into the grid. Leaves the binding alone.
    #[tracing::instrument(skip(self, file), fields(name = %file.name))]
    pub async fn import(&self, file: &ImportFile) -> Outcome {
        let inner = &self.inner;
        if let Err(outcome) = self.begin_surface(Operation::Import) {
            return outcome;
        }

        let result = match file.check_format() {
            Ok(()) => inner.surface.import_from(file).await,
            Err(e) => Err(e),
        };

        if !self.end_surface(Operation::Import) {
            return Outcome::Discarded;
        }
        match result {
            Ok(()) => {
                inner
                    .notifier
                    .success(format!("Imported {}", file.name));
                Outcome::Completed
            }
            Err(e) => {
                inner
                    .notifier
                    .error(format!("Failed to import {}: {e}", file.name));
                Outcome::Failed(e.into())
            }
        }
    }

    /// Export the grid as a spreadsheet file. Leaves the binding alone.
    #[tracing::instrument(skip(self))]
    pub async fn export(&self) -> Outcome {
        let inner = &self.inner;
        if let Err(outcome) = self.begin_surface(Operation::Export) {
            return outcome;
        }

        let result = inner.surface.export_current().await;

        if !self.end_surface(Operation::Export) {
            return Outcome::Discarded;
        }
        match result {
            Ok(()) => {
                inner.notifier.success("Spreadsheet exported".to_owned());
                Outcome::Completed
            }
            Err(e) => {
                inner
                    .notifier
                    .error(format!("Failed to export spreadsheet: {e}"));
                Outcome::Failed(e.into())
            }
        }
    }

    /// Surface an internal error raised by the editing surface.
    pub fn report_surface_error(&self, error: SurfaceError) {
        if self.state().torn_down {
            return;
        }
        tracing::warn!(error = %error, "editing surface error");
        self.inner
            .notifier
            .error(format!("Spreadsheet error: {error}"));
    }

    /// Cancel autosave and the readiness listener. Results of calls still in
    /// flight are dropped. Idempotent.
    pub fn teardown(&self) {
        let (autosave, listener) = {
            let mut state = self.state();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            (state.autosave.take(), state.ready_listener.take())
        };
        drop(autosave);
        drop(listener);
        tracing::debug!("controller torn down");
    }

    pub fn binding(&self) -> Option<RemoteBinding> {
        self.state().binding.clone()
    }

    pub fn identifier(&self) -> Option<SmolStr> {
        self.state()
            .binding
            .as_ref()
            .map(|binding| binding.identifier().clone())
    }

    pub fn is_bound(&self) -> bool {
        self.state().binding.is_some()
    }

    pub fn status(&self) -> SyncStatus {
        self.state().status
    }

    pub fn readiness(&self) -> ReadinessState {
        self.inner.gate.state()
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.inner.gate
    }

    pub fn is_torn_down(&self) -> bool {
        self.state().torn_down
    }

    /// Whether an autosave loop is currently scheduled.
    pub fn autosave_active(&self) -> bool {
        self.state().autosave.is_some()
    }

    /// What the header should offer right now.
    pub fn actions(&self) -> ActionAvailability {
        let ready = self.inner.gate.is_ready();
        let state = self.state();
        ActionAvailability::compute(ready, state.binding.is_some(), state.status)
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the network slot for `requested`.
    ///
    /// `skip` inspects the current binding and may veto the operation.
    /// On success returns the binding as it was when the slot was claimed.
    fn begin(
        &self,
        requested: Operation,
        status: SyncStatus,
        skip: impl FnOnce(Option<&RemoteBinding>) -> Option<Skip>,
    ) -> Result<Option<RemoteBinding>, Outcome> {
        if !self.inner.gate.is_ready() {
            return Err(Outcome::NotReady);
        }
        let mut state = self.state();
        if state.torn_down {
            return Err(Outcome::Discarded);
        }
        if let Some(in_flight) = state.status.in_flight() {
            tracing::debug!(%requested, %in_flight, "operation rejected");
            return Err(Outcome::Rejected {
                requested,
                in_flight,
            });
        }
        if let Some(reason) = skip(state.binding.as_ref()) {
            tracing::debug!(%requested, ?reason, "operation skipped");
            return Err(Outcome::Skipped(reason));
        }
        // The user has acted on the grid; a late initialize must not clobber it.
        state.initialized = true;
        state.status = status;
        Ok(state.binding.clone())
    }

    fn begin_surface(&self, requested: Operation) -> Result<(), Outcome> {
        if !self.inner.gate.is_ready() {
            return Err(Outcome::NotReady);
        }
        let mut state = self.state();
        if state.torn_down {
            return Err(Outcome::Discarded);
        }
        let flag = match requested {
            Operation::Import => &mut state.importing,
            _ => &mut state.exporting,
        };
        if *flag {
            tracing::debug!(%requested, "surface operation rejected");
            return Err(Outcome::Rejected {
                requested,
                in_flight: requested,
            });
        }
        *flag = true;
        if requested == Operation::Import {
            state.initialized = true;
        }
        Ok(())
    }

    /// Release the surface slot. Returns `false` if torn down meanwhile.
    fn end_surface(&self, requested: Operation) -> bool {
        let mut state = self.state();
        match requested {
            Operation::Import => state.importing = false,
            _ => state.exporting = false,
        }
        !state.torn_down
    }

    /// (Re)start the autosave loop for the current binding.
    fn start_autosave(&self) {
        let Some(period) = self.inner.autosave_period else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let gate = self.inner.gate.clone();
        let handle = AbortOnDropHandle::new(task::spawn(autosave::run(gate, period, move || {
            autosave_tick(weak.clone())
        })));

        // Dropping a handle aborts its loop: the new one if the binding went
        // away meanwhile, otherwise the one it replaces.
        let stale = {
            let mut state = self.state();
            if state.torn_down || state.binding.is_none() {
                Some(handle)
            } else {
                state.autosave.replace(handle)
            }
        };
        drop(stale);
    }
}

/// One autosave tick on behalf of a possibly dropped controller.
async fn autosave_tick<B, S>(weak: Weak<Inner<B, S>>) -> Tick
where
    B: BlobStore + Send + Sync + 'static,
    S: EditingSurface + Send + Sync + 'static,
{
    let Some(inner) = weak.upgrade() else {
        return Tick::Stop;
    };
    let controller = DocumentSyncController { inner };
    match controller.update_with(Trigger::Autosave).await {
        Outcome::Skipped(Skip::NotBound) | Outcome::Discarded => Tick::Stop,
        Outcome::Rejected { in_flight, .. } => {
            tracing::debug!(%in_flight, "autosave tick skipped");
            Tick::Continue
        }
        _ => Tick::Continue,
    }
}
