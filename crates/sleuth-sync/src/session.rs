//! Session: the one case currently open.

use std::sync::Arc;

use tracing::info;

use sleuth_core::{ChangeNotifier, GraphStore, SleuthResult};

use crate::services::Services;
use crate::synchronizer::Synchronizer;

/// An open case. Switching cases builds a new session, so nothing from the
/// previous case's store survives the switch.
#[derive(Debug, Clone)]
pub struct Session {
    sync: Arc<Synchronizer>,
}

impl Session {
    /// Create a session without loading it.
    pub fn new(case_id: impl Into<String>, services: Services, notifier: ChangeNotifier) -> Self {
        Self {
            sync: Arc::new(Synchronizer::new(case_id, services, notifier)),
        }
    }

    /// Create a session and load its case.
    pub async fn open(case_id: impl Into<String>, services: Services, notifier: ChangeNotifier) -> SleuthResult<Self> {
        let session = Self::new(case_id, services, notifier);
        session.sync.load().await?;
        Ok(session)
    }

    pub fn case_id(&self) -> &str {
        self.sync.case_id()
    }

    pub fn sync(&self) -> &Arc<Synchronizer> {
        &self.sync
    }

    pub fn store(&self) -> GraphStore {
        self.sync.store()
    }

    /// Open `case_id` with the same services and subscribers.
    ///
    /// The new case is loaded before anything is given up: on failure this
    /// session is untouched and still serves its own case.
    pub async fn switch_case(&self, case_id: impl Into<String>) -> SleuthResult<Self> {
        let case_id = case_id.into();
        info!(from = %self.case_id(), to = %case_id, "Switching case");
        let services = self.sync.services().clone();
        let notifier = self.sync.notifier().clone();
        Self::open(case_id, services, notifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::synchronizer::SyncState;
    use sleuth_core::{CaseSnapshot, Entity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn case_with(name: &str) -> CaseSnapshot {
        CaseSnapshot {
            entities: vec![Entity { id: "ent_1".into(), name: name.into(), ..Default::default() }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_switch_case_discards_previous_store() {
        let backend = MemoryBackend::new()
            .with_case("affaire-a", &case_with("Anne"))
            .unwrap()
            .with_case("affaire-b", &case_with("Bastien"))
            .unwrap();
        let services = Services::from_backend(Arc::new(backend));
        let notifier = ChangeNotifier::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let session = Session::open("affaire-a", services, notifier).await.unwrap();
        assert_eq!(session.store().entity("ent_1").unwrap().name, "Anne");

        let session = session.switch_case("affaire-b").await.unwrap();
        assert_eq!(session.case_id(), "affaire-b");
        assert_eq!(session.store().entity("ent_1").unwrap().name, "Bastien");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_current_case() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_case("affaire-a", &case_with("Anne"))
                .unwrap()
                .with_case("affaire-b", &case_with("Bastien"))
                .unwrap(),
        );
        let session = Session::open("affaire-a", Services::from_backend(backend.clone()), ChangeNotifier::new())
            .await
            .unwrap();

        backend.set_load_failure(true);
        let err = session.switch_case("affaire-b").await.unwrap_err();

        assert!(matches!(err, sleuth_core::SleuthError::LoadFailure { .. }));
        assert_eq!(session.case_id(), "affaire-a");
        assert_eq!(session.sync().state(), SyncState::Ready);
        assert_eq!(session.store().entity("ent_1").unwrap().name, "Anne");
    }

    #[tokio::test]
    async fn test_new_session_is_empty() {
        let session = Session::new("affaire-c", Services::from_backend(Arc::new(MemoryBackend::new())), ChangeNotifier::new());
        assert_eq!(session.sync().state(), SyncState::Empty);
        assert!(session.store().entities().is_empty());
    }
}
