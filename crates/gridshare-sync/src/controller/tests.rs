use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gridshare_common::{BlobStore, StoreError, StoreOp};
use http::StatusCode;
use serde_json::{Value, json};
use smol_str::SmolStr;
use tokio::sync::Notify;

use super::*;
use crate::platform::{Notification, NotificationLevel};
use crate::state::ActionState;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create(Value),
    Read(SmolStr),
    Update(SmolStr, Value),
    Delete(SmolStr),
}

#[derive(Default)]
struct StoreInner {
    calls: Mutex<Vec<Call>>,
    create: Mutex<VecDeque<Result<SmolStr, StoreError>>>,
    read: Mutex<VecDeque<Result<Value, StoreError>>>,
    update: Mutex<VecDeque<Result<(), StoreError>>>,
    delete: Mutex<VecDeque<Result<(), StoreError>>>,
    hold: Mutex<Option<Arc<Notify>>>,
}

/// In-memory store. Calls succeed unless a result was queued.
#[derive(Clone, Default)]
struct MockStore(Arc<StoreInner>);

impl MockStore {
    fn calls(&self) -> Vec<Call> {
        self.0.calls.lock().unwrap().clone()
    }

    fn updates(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Update(..)))
            .collect()
    }

    /// Park every call after it is recorded until the returned handle is notified.
    fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.0.hold.lock().unwrap() = Some(notify.clone());
        notify
    }

    fn fail_read(&self, error: StoreError) {
        self.0.read.lock().unwrap().push_back(Err(error));
    }

    fn fail_update(&self, error: StoreError) {
        self.0.update.lock().unwrap().push_back(Err(error));
    }

    fn fail_delete(&self, error: StoreError) {
        self.0.delete.lock().unwrap().push_back(Err(error));
    }

    fn fail_create(&self, error: StoreError) {
        self.0.create.lock().unwrap().push_back(Err(error));
    }

    /// Stop parking new calls and let the parked one finish.
    fn release(&self, hold: &Notify) {
        *self.0.hold.lock().unwrap() = None;
        hold.notify_one();
    }

    async fn enter(&self, call: Call) {
        self.0.calls.lock().unwrap().push(call);
        let hold = self.0.hold.lock().unwrap().clone();
        if let Some(hold) = hold {
            hold.notified().await;
        }
    }
}

impl BlobStore for MockStore {
    async fn create(&self, document: &Value) -> Result<SmolStr, StoreError> {
        self.enter(Call::Create(document.clone())).await;
        let queued = self.0.create.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok("abc123".into()))
    }

    async fn read(&self, id: &str) -> Result<Value, StoreError> {
        self.enter(Call::Read(id.into())).await;
        let queued = self.0.read.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(shared_sheet()))
    }

    async fn update(&self, id: &str, document: &Value) -> Result<(), StoreError> {
        self.enter(Call::Update(id.into(), document.clone())).await;
        let queued = self.0.update.lock().unwrap().pop_front();
        queued.unwrap_or(Ok(()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.enter(Call::Delete(id.into())).await;
        let queued = self.0.delete.lock().unwrap().pop_front();
        queued.unwrap_or(Ok(()))
    }
}

#[derive(Default)]
struct SurfaceState {
    document: Option<Document>,
    replaced: usize,
    imported: Vec<SmolStr>,
    exported: usize,
    import_error: Option<SurfaceError>,
    export_error: Option<SurfaceError>,
    hold: Option<Arc<Notify>>,
}

#[derive(Clone, Default)]
struct MockSurface(Arc<Mutex<SurfaceState>>);

impl MockSurface {
    fn document(&self) -> Option<Document> {
        self.0.lock().unwrap().document.clone()
    }

    fn set_document(&self, value: Value) {
        self.0.lock().unwrap().document = Some(Document::new(value));
    }

    fn replaced(&self) -> usize {
        self.0.lock().unwrap().replaced
    }

    /// Park imports until the returned handle is notified.
    fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.0.lock().unwrap().hold = Some(notify.clone());
        notify
    }
}

impl EditingSurface for MockSurface {
    fn current_document(&self) -> Document {
        self.0.lock().unwrap().document.clone().unwrap_or_default()
    }

    fn replace_document(&self, document: Document) {
        let mut state = self.0.lock().unwrap();
        state.document = Some(document);
        state.replaced += 1;
    }

    async fn import_from(&self, file: &ImportFile) -> Result<(), SurfaceError> {
        let hold = self.0.lock().unwrap().hold.take();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        let mut state = self.0.lock().unwrap();
        if let Some(error) = state.import_error.take() {
            return Err(error);
        }
        state.imported.push(file.name.clone());
        state.document = Some(Document::new(json!({ "imported": file.name.as_str() })));
        Ok(())
    }

    async fn export_current(&self) -> Result<(), SurfaceError> {
        let mut state = self.0.lock().unwrap();
        if let Some(error) = state.export_error.take() {
            return Err(error);
        }
        state.exported += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNavigator(Mutex<Vec<Route>>);

impl RecordingNavigator {
    fn routes(&self) -> Vec<Route> {
        self.0.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &Route) {
        self.0.lock().unwrap().push(route.clone());
    }
}

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<Notification>>);

impl RecordingNotifier {
    fn all(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }

    fn at(&self, level: NotificationLevel) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

struct Harness {
    controller: DocumentSyncController<MockStore, MockSurface>,
    store: MockStore,
    surface: MockSurface,
    navigator: Arc<RecordingNavigator>,
    notifier: Arc<RecordingNotifier>,
    gate: ReadinessGate,
}

fn harness(inbound: Option<&str>) -> Harness {
    let store = MockStore::default();
    let surface = MockSurface::default();
    let navigator = Arc::new(RecordingNavigator::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let gate = ReadinessGate::new();
    let controller = DocumentSyncController::builder(store.clone(), surface.clone())
        .navigator(navigator.clone())
        .notifier(notifier.clone())
        .gate(gate.clone())
        .autosave_period(Some(Duration::from_secs(30)))
        .inbound_identifier(inbound)
        .build();
    Harness {
        controller,
        store,
        surface,
        navigator,
        notifier,
        gate,
    }
}

/// Ready, initialized with the blank template and shared as `abc123`.
async fn shared() -> Harness {
    let h = harness(None);
    h.gate.mark_ready();
    assert!(h.controller.initialize(None).await.is_completed());
    assert!(h.controller.share().await.is_completed());
    h
}

fn shared_sheet() -> Value {
    json!({ "title": "Budget", "data": [{ "name": "Q1", "celldata": [{ "r": 0, "c": 0 }] }] })
}

fn unavailable(op: StoreOp) -> StoreError {
    StoreError::Status {
        op,
        status: StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_fresh_document_share_flow() {
    let h = harness(None);
    h.gate.mark_ready();

    assert!(h.controller.initialize(None).await.is_completed());
    assert!(h.surface.document().unwrap().is_blank());
    assert!(!h.controller.is_bound());
    assert!(h.store.calls().is_empty());

    assert!(h.controller.share().await.is_completed());
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
    assert_eq!(h.controller.status(), SyncStatus::Idle);
    assert_eq!(h.store.calls(), vec![Call::Create(Document::blank().into_value())]);
    assert_eq!(h.navigator.routes(), vec![Route::Document("abc123".into())]);
    assert_eq!(
        h.notifier.at(NotificationLevel::Success),
        vec!["Spreadsheet shared as abc123".to_owned()]
    );
    assert!(h.controller.autosave_active());
}

#[tokio::test]
async fn test_load_success_binds_to_inbound_identifier() {
    let h = harness(Some("xyz"));
    h.gate.mark_ready();

    assert!(h.controller.initialize(Some("xyz")).await.is_completed());
    assert_eq!(h.surface.document().unwrap().as_value(), &shared_sheet());
    assert_eq!(h.controller.identifier().as_deref(), Some("xyz"));
    assert_eq!(h.store.calls(), vec![Call::Read("xyz".into())]);
    assert!(h.notifier.all().is_empty());
    assert!(h.controller.autosave_active());
}

#[tokio::test]
async fn test_load_failure_falls_back_to_blank() {
    let h = harness(Some("xyz"));
    h.store.fail_read(StoreError::NotFound {
        op: StoreOp::Read,
        id: "xyz".into(),
    });
    h.gate.mark_ready();

    let outcome = h.controller.initialize(Some("xyz")).await;
    assert!(matches!(
        outcome,
        Outcome::Failed(SyncError::Load { ref id, .. }) if id == "xyz"
    ));
    assert!(h.surface.document().unwrap().is_blank());
    assert!(!h.controller.is_bound());
    assert_eq!(h.controller.status(), SyncStatus::Idle);
    assert!(!h.controller.autosave_active());

    let warnings = h.notifier.at(NotificationLevel::Warning);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("xyz"));
    assert!(h.notifier.at(NotificationLevel::Error).is_empty());
}

#[tokio::test]
async fn test_update_targets_shared_identifier() {
    let h = shared().await;
    h.surface.set_document(json!({ "edited": true }));

    assert!(h.controller.update().await.is_completed());
    assert_eq!(
        h.store.updates(),
        vec![Call::Update("abc123".into(), json!({ "edited": true }))]
    );
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
    assert_eq!(h.controller.status(), SyncStatus::Idle);
    assert_eq!(
        h.notifier.at(NotificationLevel::Success).last().map(String::as_str),
        Some("Spreadsheet updated")
    );
}

#[tokio::test]
async fn test_update_failure_keeps_binding() {
    let h = shared().await;
    h.store.fail_update(unavailable(StoreOp::Update));

    let outcome = h.controller.update().await;
    assert!(matches!(outcome, Outcome::Failed(SyncError::Store(_))));
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
    assert_eq!(h.controller.status(), SyncStatus::Idle);
    let errors = h.notifier.at(NotificationLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to update spreadsheet"));
}

#[tokio::test]
async fn test_share_failure_stays_unbound() {
    let h = harness(None);
    h.gate.mark_ready();
    h.controller.initialize(None).await;
    h.store.fail_create(StoreError::MissingLocation);

    let outcome = h.controller.share().await;
    assert!(matches!(
        outcome,
        Outcome::Failed(SyncError::Store(StoreError::MissingLocation))
    ));
    assert!(!h.controller.is_bound());
    assert!(h.navigator.routes().is_empty());
    assert!(!h.controller.autosave_active());
    assert_eq!(h.notifier.at(NotificationLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_delete_unbinds_and_navigates_home() {
    let h = shared().await;

    assert!(h.controller.delete().await.is_completed());
    assert!(!h.controller.is_bound());
    assert!(!h.controller.autosave_active());
    assert_eq!(h.controller.status(), SyncStatus::Idle);
    assert_eq!(h.store.calls().last(), Some(&Call::Delete("abc123".into())));
    assert_eq!(h.navigator.routes().last(), Some(&Route::Root));
    assert_eq!(
        h.notifier.at(NotificationLevel::Success).last().map(String::as_str),
        Some("Shared spreadsheet deleted")
    );
}

#[tokio::test]
async fn test_delete_failure_keeps_binding() {
    let h = shared().await;
    h.store.fail_delete(unavailable(StoreOp::Delete));

    let outcome = h.controller.delete().await;
    assert!(matches!(outcome, Outcome::Failed(_)));
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
    assert!(h.controller.autosave_active());
    assert_eq!(h.navigator.routes().len(), 1);
    assert_eq!(h.notifier.at(NotificationLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_update_and_delete_need_a_binding() {
    let h = harness(None);
    h.gate.mark_ready();
    h.controller.initialize(None).await;

    assert!(matches!(
        h.controller.update().await,
        Outcome::Skipped(Skip::NotBound)
    ));
    assert!(matches!(
        h.controller.delete().await,
        Outcome::Skipped(Skip::NotBound)
    ));
    assert!(h.store.calls().is_empty());
    assert!(h.notifier.all().is_empty());
}

#[tokio::test]
async fn test_share_while_bound_is_skipped() {
    let h = shared().await;

    assert!(matches!(
        h.controller.share().await,
        Outcome::Skipped(Skip::AlreadyBound)
    ));
    assert_eq!(h.store.calls().len(), 1);
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_nothing_happens_before_ready() {
    let h = harness(Some("xyz"));

    assert!(matches!(
        h.controller.initialize(Some("xyz")).await,
        Outcome::NotReady
    ));
    assert!(matches!(h.controller.share().await, Outcome::NotReady));
    assert!(matches!(h.controller.update().await, Outcome::NotReady));
    assert!(matches!(h.controller.delete().await, Outcome::NotReady));
    let file = ImportFile::new("budget.xlsx", Vec::new());
    assert!(matches!(h.controller.import(&file).await, Outcome::NotReady));
    assert!(matches!(h.controller.export().await, Outcome::NotReady));

    assert!(h.store.calls().is_empty());
    assert_eq!(h.surface.replaced(), 0);
    assert!(h.notifier.all().is_empty());
    assert_eq!(h.controller.readiness(), ReadinessState::NotReady);
}

#[tokio::test]
async fn test_attach_initializes_once_ready() {
    let h = harness(Some("xyz"));
    h.controller.attach();
    tokio::task::yield_now().await;
    assert!(h.store.calls().is_empty());

    h.gate.signal().fire();
    wait_until(|| h.controller.is_bound()).await;
    assert_eq!(h.controller.identifier().as_deref(), Some("xyz"));

    assert!(matches!(
        h.controller.initialize(None).await,
        Outcome::Skipped(Skip::AlreadyInitialized)
    ));
    assert_eq!(h.store.calls(), vec![Call::Read("xyz".into())]);
}

#[tokio::test]
async fn test_late_listener_keeps_shared_binding() {
    let h = harness(Some("xyz"));
    h.surface.set_document(json!({ "mine": true }));
    h.controller.attach();
    h.gate.signal().fire();

    // The listener is scheduled but has not run yet.
    assert!(h.controller.share().await.is_completed());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
    assert_eq!(h.store.calls(), vec![Call::Create(json!({ "mine": true }))]);
    assert_eq!(
        h.surface.document().unwrap().as_value(),
        &json!({ "mine": true })
    );
    assert!(matches!(
        h.controller.initialize(Some("xyz")).await,
        Outcome::Skipped(Skip::AlreadyInitialized)
    ));
}

#[tokio::test]
async fn test_late_listener_keeps_shared_document() {
    let h = harness(None);
    h.surface.set_document(json!({ "mine": true }));
    h.controller.attach();
    h.gate.signal().fire();

    assert!(h.controller.share().await.is_completed());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.surface.replaced(), 0);
    assert_eq!(
        h.surface.document().unwrap().as_value(),
        &json!({ "mine": true })
    );
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_late_listener_keeps_imported_grid() {
    let h = harness(Some("xyz"));
    h.controller.attach();
    h.gate.signal().fire();

    let file = ImportFile::new("budget.xlsx", b"PK".to_vec());
    assert!(h.controller.import(&file).await.is_completed());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(h.store.calls().is_empty());
    assert!(!h.controller.is_bound());
    assert_eq!(
        h.surface.document().unwrap().as_value(),
        &json!({ "imported": "budget.xlsx" })
    );
}

#[tokio::test]
async fn test_second_import_rejected_while_importing() {
    let h = harness(None);
    h.gate.mark_ready();
    h.controller.initialize(None).await;
    let release = h.surface.hold();

    let task = tokio::spawn({
        let controller = h.controller.clone();
        let file = ImportFile::new("budget.xlsx", b"PK".to_vec());
        async move { controller.import(&file).await }
    });
    wait_until(|| h.surface.0.lock().unwrap().hold.is_none()).await;

    let other = ImportFile::new("other.xlsx", Vec::new());
    let outcome = h.controller.import(&other).await;
    assert!(matches!(
        outcome,
        Outcome::Rejected {
            requested: Operation::Import,
            in_flight: Operation::Import
        }
    ));
    assert_eq!(
        outcome.into_result().unwrap_err().to_string(),
        "import rejected while import is in progress"
    );
    assert!(h.controller.export().await.is_completed());

    release.notify_one();
    assert!(task.await.unwrap().is_completed());
    assert_eq!(
        h.surface.0.lock().unwrap().imported,
        vec![SmolStr::new("budget.xlsx")]
    );
}

#[tokio::test]
async fn test_second_request_rejected_while_in_flight() {
    let h = harness(None);
    h.gate.mark_ready();
    h.controller.initialize(None).await;
    let release = h.store.hold();

    let task = tokio::spawn({
        let controller = h.controller.clone();
        async move { controller.share().await }
    });
    wait_until(|| h.store.calls().len() == 1).await;
    assert_eq!(h.controller.status(), SyncStatus::Sharing);
    assert_eq!(h.controller.actions().share, ActionState::Busy);

    assert!(matches!(
        h.controller.share().await,
        Outcome::Rejected {
            requested: Operation::Share,
            in_flight: Operation::Share
        }
    ));
    assert!(matches!(
        h.controller.update().await,
        Outcome::Rejected { .. }
    ));

    release.notify_one();
    assert!(task.await.unwrap().is_completed());
    assert_eq!(h.store.calls().len(), 1);
    assert_eq!(h.controller.status(), SyncStatus::Idle);
}

#[tokio::test]
async fn test_share_rejected_while_loading() {
    let h = harness(Some("xyz"));
    h.gate.mark_ready();
    let release = h.store.hold();

    let task = tokio::spawn({
        let controller = h.controller.clone();
        async move { controller.initialize(Some("xyz")).await }
    });
    wait_until(|| h.store.calls().len() == 1).await;
    assert_eq!(h.controller.status(), SyncStatus::Loading);
    assert!(matches!(
        h.controller.share().await,
        Outcome::Rejected {
            requested: Operation::Share,
            in_flight: Operation::Initialize
        }
    ));

    release.notify_one();
    assert!(task.await.unwrap().is_completed());
    assert_eq!(h.controller.status(), SyncStatus::Idle);
}

#[tokio::test]
async fn test_teardown_discards_in_flight_result() {
    let h = harness(None);
    h.gate.mark_ready();
    h.controller.initialize(None).await;
    let release = h.store.hold();

    let task = tokio::spawn({
        let controller = h.controller.clone();
        async move { controller.share().await }
    });
    wait_until(|| h.store.calls().len() == 1).await;
    h.controller.teardown();
    h.controller.teardown();
    release.notify_one();

    assert!(matches!(task.await.unwrap(), Outcome::Discarded));
    assert!(h.controller.is_torn_down());
    assert!(!h.controller.is_bound());
    assert!(!h.controller.autosave_active());
    assert!(h.navigator.routes().is_empty());
    assert!(h.notifier.all().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_pushes_while_bound() {
    let h = shared().await;
    let notified = h.notifier.all().len();

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(
        h.store.updates(),
        vec![Call::Update("abc123".into(), Document::blank().into_value())]
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.store.updates().len(), 2);
    assert_eq!(h.notifier.all().len(), notified);
    assert_eq!(h.controller.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_never_runs_unbound() {
    let h = harness(None);
    h.gate.mark_ready();
    h.controller.initialize(None).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(h.store.calls().is_empty());
    assert!(!h.controller.autosave_active());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_stops_after_delete() {
    let h = shared().await;
    assert!(h.controller.delete().await.is_completed());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(h.store.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_stops_on_teardown() {
    let h = shared().await;
    h.controller.teardown();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(h.store.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_stops_when_controller_dropped() {
    let Harness {
        controller, store, ..
    } = shared().await;
    drop(controller);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(store.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_skips_tick_during_user_update() {
    let h = shared().await;
    let hold = h.store.hold();

    let task = tokio::spawn({
        let controller = h.controller.clone();
        async move { controller.update().await }
    });
    wait_until(|| h.store.updates().len() == 1).await;

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.store.updates().len(), 1);
    assert_eq!(h.controller.status(), SyncStatus::Updating);
    assert!(h.controller.autosave_active());

    h.store.release(&hold);
    assert!(task.await.unwrap().is_completed());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.store.updates().len(), 2);
    assert_eq!(h.controller.status(), SyncStatus::Idle);
    assert!(h.notifier.at(NotificationLevel::Error).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_skips_tick_during_delete() {
    let h = shared().await;
    let hold = h.store.hold();

    let task = tokio::spawn({
        let controller = h.controller.clone();
        async move { controller.delete().await }
    });
    wait_until(|| h.store.calls().len() == 2).await;

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(h.store.updates().is_empty());
    assert_eq!(h.controller.status(), SyncStatus::Deleting);

    h.store.release(&hold);
    assert!(task.await.unwrap().is_completed());

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert!(h.store.updates().is_empty());
    assert!(!h.controller.autosave_active());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_failure_reported_once_per_outage() {
    let h = shared().await;
    for _ in 0..3 {
        h.store.fail_update(unavailable(StoreOp::Update));
    }

    tokio::time::sleep(Duration::from_secs(91)).await;
    assert_eq!(h.store.updates().len(), 3);
    let errors = h.notifier.at(NotificationLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Autosave failed"));
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
    assert_eq!(h.controller.status(), SyncStatus::Idle);

    // A successful save re-arms reporting.
    tokio::time::sleep(Duration::from_secs(30)).await;
    h.store.fail_update(unavailable(StoreOp::Update));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.store.updates().len(), 5);
    assert_eq!(h.notifier.at(NotificationLevel::Error).len(), 2);
}

#[tokio::test]
async fn test_import_checks_format_and_keeps_binding() {
    let h = shared().await;

    let csv = ImportFile::new("notes.csv", b"a,b".to_vec());
    assert!(matches!(
        h.controller.import(&csv).await,
        Outcome::Failed(SyncError::Surface(SurfaceError::UnsupportedFormat(_)))
    ));
    assert!(h.surface.0.lock().unwrap().imported.is_empty());

    let xlsx = ImportFile::new("budget.xlsx", b"PK".to_vec());
    assert!(h.controller.import(&xlsx).await.is_completed());
    assert_eq!(h.surface.0.lock().unwrap().imported, vec![SmolStr::new("budget.xlsx")]);
    assert_eq!(h.controller.identifier().as_deref(), Some("abc123"));
    assert_eq!(h.store.calls().len(), 1);
    assert_eq!(
        h.notifier.at(NotificationLevel::Success).last().map(String::as_str),
        Some("Imported budget.xlsx")
    );
}

#[tokio::test]
async fn test_export_failure_is_reported() {
    let h = harness(None);
    h.gate.mark_ready();
    h.controller.initialize(None).await;
    h.surface.0.lock().unwrap().export_error = Some(SurfaceError::Export("disk full".into()));

    assert!(matches!(
        h.controller.export().await,
        Outcome::Failed(SyncError::Surface(SurfaceError::Export(_)))
    ));
    assert!(h.controller.export().await.is_completed());
    assert_eq!(h.surface.0.lock().unwrap().exported, 1);
    assert_eq!(h.notifier.at(NotificationLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_surface_errors_go_quiet_after_teardown() {
    let h = harness(None);
    h.controller
        .report_surface_error(SurfaceError::Internal("bad formula".into()));
    assert_eq!(
        h.notifier.at(NotificationLevel::Error),
        vec!["Spreadsheet error: bad formula".to_owned()]
    );

    h.controller.teardown();
    h.controller
        .report_surface_error(SurfaceError::Internal("bad formula".into()));
    assert_eq!(h.notifier.all().len(), 1);
}

#[tokio::test]
async fn test_actions_follow_binding() {
    let h = harness(None);
    assert_eq!(h.controller.actions().share, ActionState::Disabled);

    h.gate.mark_ready();
    h.controller.initialize(None).await;
    let actions = h.controller.actions();
    assert_eq!(actions.share, ActionState::Enabled);
    assert_eq!(actions.update, ActionState::Hidden);

    h.controller.share().await;
    let actions = h.controller.actions();
    assert_eq!(actions.share, ActionState::Hidden);
    assert_eq!(actions.update, ActionState::Enabled);
    assert_eq!(actions.delete, ActionState::Enabled);
}
