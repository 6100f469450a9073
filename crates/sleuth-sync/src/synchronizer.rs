//! Synchronizer: keeps one case's Graph Store in step with its canonical text.
//!
//! ```text
//! Empty ──load──▶ Loading ──ok──▶ Ready ──mutation──▶ Mutating ──▶ Ready
//!                    │                                   │
//!                    └──err──▶ Failed          err ──────┘ (store untouched)
//! ```
//!
//! `load` is accepted from any state and is the only way out of `Failed`.
//! Every other mutation requires `Ready`. Mutations pass through a FIFO gate,
//! so a second call waits for the first and then sees its result.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sleuth_core::{
    CaseSnapshot, ChangeEvent, ChangeNotifier, Entity, Evidence, GraphStore, Hypothesis, Patch, PatchOperation,
    PatchTarget, Relation, ServiceError, SleuthError, SleuthResult, Subscription, SyncEvent, TimelineEvent,
};

use crate::services::{FragmentRequest, PatchOutcome, Services, ValidationReport};

/// Lifecycle of a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Empty,
    Loading,
    Ready,
    Mutating,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Mutating => "mutating",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    state: SyncState,
    store: GraphStore,
    diverged: bool,
}

/// Owns the Graph Store of one case and every write to it.
#[derive(Debug)]
pub struct Synchronizer {
    case_id: String,
    services: Services,
    notifier: ChangeNotifier,
    inner: RwLock<Inner>,
    gate: Mutex<()>,
}

/// Restores a state if a mutation ends without installing a new store.
struct MutationGuard<'a> {
    sync: &'a Synchronizer,
    fallback: SyncState,
    done: bool,
}

impl MutationGuard<'_> {
    fn commit(&mut self, store: GraphStore, diverged: bool) {
        let mut inner = self.sync.write();
        inner.store = store;
        inner.state = SyncState::Ready;
        inner.diverged = diverged;
        self.done = true;
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.sync.write().state = self.fallback;
        }
    }
}

/// Fresh id for a record of `target`, e.g. `ent_3f2a9c01b7d4`.
pub fn generate_id(target: PatchTarget) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}_{}", target.id_prefix(), &uuid[..12])
}

fn assign_id(id: &mut String, target: PatchTarget) {
    if id.is_empty() {
        *id = generate_id(target);
    }
}

/// A service that refuses a patch with an error status still explains why;
/// that explanation is the failure message.
fn patch_failure(err: ServiceError) -> SleuthError {
    match err {
        ServiceError::Status { message, .. } => SleuthError::patch(message),
        other => SleuthError::patch(other.to_string()),
    }
}

fn require_id(id: &str, target: PatchTarget) -> SleuthResult<()> {
    if id.is_empty() {
        return Err(SleuthError::patch(format!("Cannot update a {} without an id", target)));
    }
    Ok(())
}

impl Synchronizer {
    pub fn new(case_id: impl Into<String>, services: Services, notifier: ChangeNotifier) -> Self {
        let case_id = case_id.into();
        Self {
            inner: RwLock::new(Inner {
                state: SyncState::Empty,
                store: GraphStore::empty(&case_id),
                diverged: false,
            }),
            case_id,
            services,
            notifier,
            gate: Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn state(&self) -> SyncState {
        self.read().state
    }

    /// The current store. The returned value is a consistent snapshot that
    /// later mutations do not affect.
    pub fn store(&self) -> GraphStore {
        self.read().store.clone()
    }

    pub fn snapshot(&self) -> Arc<CaseSnapshot> {
        self.read().store.snapshot().clone()
    }

    /// True when the last write-back failed and the stored text is stale.
    pub fn is_diverged(&self) -> bool {
        self.read().diverged
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    fn begin(&self, operation: &str) -> SleuthResult<MutationGuard<'_>> {
        let mut inner = self.write();
        if inner.state != SyncState::Ready {
            return Err(SleuthError::not_ready(inner.state, operation));
        }
        inner.state = SyncState::Mutating;
        Ok(MutationGuard {
            sync: self,
            fallback: SyncState::Ready,
            done: false,
        })
    }

    fn emit(&self, kind: SyncEvent, store: GraphStore) {
        self.notifier.notify(&ChangeEvent { kind, store });
    }

    async fn parse_text(&self, text: &str) -> Result<CaseSnapshot, ServiceError> {
        if text.trim().is_empty() {
            return Ok(CaseSnapshot::default());
        }
        self.services.parser.parse(&self.case_id, text).await
    }

    /// Fetch and parse the case text, replacing whatever was held.
    ///
    /// Stale data is discarded as soon as loading starts. On failure the
    /// synchronizer is left `Failed` with an empty store.
    pub async fn load(&self) -> SleuthResult<GraphStore> {
        let _gate = self.gate.lock().await;
        {
            let mut inner = self.write();
            inner.state = SyncState::Loading;
            inner.store = GraphStore::empty(&self.case_id);
            inner.diverged = false;
        }
        let mut guard = MutationGuard {
            sync: self,
            fallback: SyncState::Failed,
            done: false,
        };
        info!(case_id = %self.case_id, "Loading case");

        let loaded = async {
            let text = self.services.text_store.load_text(&self.case_id).await?;
            let snapshot = self.parse_text(&text).await?;
            Ok::<_, ServiceError>((snapshot, text))
        }
        .await;

        match loaded {
            Ok((snapshot, text)) => {
                let store = GraphStore::new(&self.case_id, snapshot, text);
                guard.commit(store.clone(), false);
                info!(
                    case_id = %self.case_id,
                    entities = store.entities().len(),
                    relations = store.relations().len(),
                    "Case loaded"
                );
                self.emit(SyncEvent::Load, store.clone());
                Ok(store)
            }
            Err(source) => {
                warn!(case_id = %self.case_id, error = %source, "Case load failed");
                Err(SleuthError::load(&self.case_id, source))
            }
        }
    }

    /// Replace the canonical text wholesale, re-parse it and write it back.
    ///
    /// If the parse fails nothing changes. If the write-back fails the new
    /// snapshot is kept, the synchronizer is marked diverged and
    /// `InconsistentWriteback` is returned.
    pub async fn update_canonical_text(&self, text: impl Into<String>) -> SleuthResult<GraphStore> {
        let text = text.into();
        let _gate = self.gate.lock().await;
        let mut guard = self.begin("update canonical text")?;

        let snapshot = self
            .parse_text(&text)
            .await
            .map_err(|e| SleuthError::load(&self.case_id, e))?;
        let store = GraphStore::new(&self.case_id, snapshot, text.as_str());

        match self.services.text_store.persist_text(&self.case_id, &text).await {
            Ok(()) => {
                guard.commit(store.clone(), false);
                debug!(case_id = %self.case_id, bytes = text.len(), "Canonical text replaced");
                self.emit(SyncEvent::Update, store.clone());
                Ok(store)
            }
            Err(source) => {
                guard.commit(store.clone(), true);
                error!(
                    case_id = %self.case_id,
                    error = %source,
                    "Write-back failed: local snapshot no longer matches stored canonical text"
                );
                self.emit(SyncEvent::Update, store);
                Err(SleuthError::InconsistentWriteback {
                    case_id: self.case_id.clone(),
                    source,
                })
            }
        }
    }

    /// Re-parse the held text without writing anything back.
    pub async fn refresh(&self) -> SleuthResult<GraphStore> {
        let _gate = self.gate.lock().await;
        let mut guard = self.begin("refresh")?;
        let (text, diverged) = {
            let inner = self.read();
            (inner.store.raw_text().to_string(), inner.diverged)
        };

        let snapshot = self
            .parse_text(&text)
            .await
            .map_err(|e| SleuthError::load(&self.case_id, e))?;
        let store = GraphStore::new(&self.case_id, snapshot, text);
        guard.commit(store.clone(), diverged);
        self.emit(SyncEvent::Refresh, store.clone());
        Ok(store)
    }

    /// Send a patch to the applier and install its result.
    ///
    /// A rejected patch surfaces the applier's message verbatim and leaves the
    /// store exactly as it was.
    pub async fn apply_patch(&self, patch: Patch) -> SleuthResult<GraphStore> {
        let _gate = self.gate.lock().await;
        let mut guard = self.begin("apply patch")?;
        self.send_patch(&mut guard, &patch).await
    }

    async fn send_patch(&self, guard: &mut MutationGuard<'_>, patch: &Patch) -> SleuthResult<GraphStore> {
        debug!(
            case_id = %self.case_id,
            operation = %patch.operation,
            target = %patch.entity_type,
            id = %patch.entity_id,
            "Applying patch"
        );

        let outcome = self
            .services
            .patcher
            .apply(&self.case_id, patch)
            .await
            .map_err(patch_failure)?;

        match outcome {
            PatchOutcome::Applied {
                canonical_text,
                snapshot,
            } => {
                let store = GraphStore::new(&self.case_id, snapshot, canonical_text);
                guard.commit(store.clone(), false);
                self.emit(SyncEvent::Mutation(patch.operation), store.clone());
                Ok(store)
            }
            PatchOutcome::Rejected { message } => {
                debug!(case_id = %self.case_id, %message, "Patch rejected");
                Err(SleuthError::patch(message))
            }
        }
    }

    /// Generate a fragment for `request` and send it as one patch.
    async fn write_record(
        &self,
        operation: PatchOperation,
        target: PatchTarget,
        id: &str,
        request: FragmentRequest<'_>,
        context: &str,
    ) -> SleuthResult<GraphStore> {
        let _gate = self.gate.lock().await;
        let mut guard = self.begin(&format!("{} {}", operation, target))?;
        let fragment = self.services.fragments.generate(request).await?;
        let patch = Patch::write(operation, target, id, fragment, context);
        self.send_patch(&mut guard, &patch).await
    }

    async fn delete_record(&self, target: PatchTarget, id: &str) -> SleuthResult<GraphStore> {
        let _gate = self.gate.lock().await;
        let mut guard = self.begin(&format!("delete {}", target))?;
        self.send_patch(&mut guard, &Patch::delete(target, id)).await
    }

    pub async fn add_entity(&self, mut entity: Entity) -> SleuthResult<Entity> {
        assign_id(&mut entity.id, PatchTarget::Entity);
        self.write_record(
            PatchOperation::Add,
            PatchTarget::Entity,
            &entity.id,
            FragmentRequest::Entity(&entity),
            entity.role.notation_context(),
        )
        .await?;
        Ok(entity)
    }

    pub async fn update_entity(&self, entity: Entity) -> SleuthResult<Entity> {
        require_id(&entity.id, PatchTarget::Entity)?;
        self.write_record(
            PatchOperation::Update,
            PatchTarget::Entity,
            &entity.id,
            FragmentRequest::Entity(&entity),
            entity.role.notation_context(),
        )
        .await?;
        Ok(entity)
    }

    pub async fn delete_entity(&self, id: &str) -> SleuthResult<GraphStore> {
        self.delete_record(PatchTarget::Entity, id).await
    }

    pub async fn add_evidence(&self, mut evidence: Evidence) -> SleuthResult<Evidence> {
        assign_id(&mut evidence.id, PatchTarget::Evidence);
        self.write_satellite(PatchOperation::Add, PatchTarget::Evidence, &evidence.id, FragmentRequest::Evidence(&evidence))
            .await?;
        Ok(evidence)
    }

    pub async fn update_evidence(&self, evidence: Evidence) -> SleuthResult<Evidence> {
        require_id(&evidence.id, PatchTarget::Evidence)?;
        self.write_satellite(
            PatchOperation::Update,
            PatchTarget::Evidence,
            &evidence.id,
            FragmentRequest::Evidence(&evidence),
        )
        .await?;
        Ok(evidence)
    }

    pub async fn delete_evidence(&self, id: &str) -> SleuthResult<GraphStore> {
        self.delete_record(PatchTarget::Evidence, id).await
    }

    pub async fn add_timeline_event(&self, mut event: TimelineEvent) -> SleuthResult<TimelineEvent> {
        assign_id(&mut event.id, PatchTarget::Timeline);
        self.write_satellite(PatchOperation::Add, PatchTarget::Timeline, &event.id, FragmentRequest::Timeline(&event))
            .await?;
        Ok(event)
    }

    pub async fn update_timeline_event(&self, event: TimelineEvent) -> SleuthResult<TimelineEvent> {
        require_id(&event.id, PatchTarget::Timeline)?;
        self.write_satellite(PatchOperation::Update, PatchTarget::Timeline, &event.id, FragmentRequest::Timeline(&event))
            .await?;
        Ok(event)
    }

    pub async fn delete_timeline_event(&self, id: &str) -> SleuthResult<GraphStore> {
        self.delete_record(PatchTarget::Timeline, id).await
    }

    pub async fn add_hypothesis(&self, mut hypothesis: Hypothesis) -> SleuthResult<Hypothesis> {
        assign_id(&mut hypothesis.id, PatchTarget::Hypothesis);
        self.write_satellite(
            PatchOperation::Add,
            PatchTarget::Hypothesis,
            &hypothesis.id,
            FragmentRequest::Hypothesis(&hypothesis),
        )
        .await?;
        Ok(hypothesis)
    }

    pub async fn update_hypothesis(&self, hypothesis: Hypothesis) -> SleuthResult<Hypothesis> {
        require_id(&hypothesis.id, PatchTarget::Hypothesis)?;
        self.write_satellite(
            PatchOperation::Update,
            PatchTarget::Hypothesis,
            &hypothesis.id,
            FragmentRequest::Hypothesis(&hypothesis),
        )
        .await?;
        Ok(hypothesis)
    }

    pub async fn delete_hypothesis(&self, id: &str) -> SleuthResult<GraphStore> {
        self.delete_record(PatchTarget::Hypothesis, id).await
    }

    async fn write_satellite(
        &self,
        operation: PatchOperation,
        target: PatchTarget,
        id: &str,
        request: FragmentRequest<'_>,
    ) -> SleuthResult<GraphStore> {
        let context = target.default_context().unwrap_or_default();
        self.write_record(operation, target, id, request, context).await
    }

    /// Add a relation between two existing entities.
    ///
    /// Both endpoints must be entities of the current store; the notation
    /// addresses them by name.
    pub async fn add_relation(&self, mut relation: Relation) -> SleuthResult<Relation> {
        assign_id(&mut relation.id, PatchTarget::Relation);

        let _gate = self.gate.lock().await;
        let mut guard = self.begin("add relation")?;

        let names = self.read().store.entity_names();
        for endpoint in [&relation.from_id, &relation.to_id] {
            if !names.contains_key(endpoint.as_str()) {
                return Err(SleuthError::EntityNotFound(endpoint.clone()));
            }
        }

        let fragment = self
            .services
            .fragments
            .generate(FragmentRequest::Relation {
                relation: &relation,
                entity_names: &names,
            })
            .await?;
        let context = relation
            .context()
            .or(PatchTarget::Relation.default_context())
            .unwrap_or_default();
        let patch = Patch::write(
            PatchOperation::Add,
            PatchTarget::Relation,
            format!("{}_{}", relation.from_id, relation.to_id),
            fragment,
            context,
        );
        self.send_patch(&mut guard, &patch).await?;
        Ok(relation)
    }

    /// Delete a relation by id, or by `"{from}_{to}"`.
    pub async fn delete_relation(&self, id: &str) -> SleuthResult<GraphStore> {
        self.delete_record(PatchTarget::Relation, id).await
    }

    /// Structural check of `text`, or of the held canonical text when `None`.
    /// Never mutates anything.
    pub async fn validate_canonical_text(&self, text: Option<&str>) -> SleuthResult<ValidationReport> {
        let held;
        let text = match text {
            Some(t) => t,
            None => {
                held = self.read().store.raw_text().to_string();
                held.as_str()
            }
        };
        Ok(self.services.validator.validate(text).await?)
    }
}
