//! Sleuth Core Library
//!
//! Case records, the Graph Store holding one case's parsed snapshot, patch
//! types and change notification.

pub mod error;
pub mod model;
pub mod notifier;
pub mod patch;
pub mod snapshot;
pub mod store;

pub use error::{ServiceError, SleuthError, SleuthResult};
pub use model::{
    Entity, EntityRole, EntityType, Evidence, EvidenceKind, Hypothesis, HypothesisStatus, Relation,
    TimelineEvent,
};
pub use notifier::{ChangeEvent, ChangeNotifier, DeliveryReport, Subscription, SyncEvent};
pub use patch::{Patch, PatchOperation, PatchTarget};
pub use snapshot::{CaseSnapshot, GraphEdge, GraphNode, GraphSnapshot};
pub use store::GraphStore;
