//! Sleuth Sync
//!
//! Keeps a case's Graph Store synchronized with its canonical notation text
//! through external parse, generate, patch and validate services.

pub mod config;
pub mod http;
pub mod memory;
pub mod services;
pub mod session;
pub mod synchronizer;

pub use config::{BackendConfig, SleuthConfig};
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use services::{
    CaseTextStore, FragmentGenerator, FragmentRequest, NotationParser, NotationValidator, PatchApplier, PatchOutcome,
    Services, ValidationReport,
};
pub use session::Session;
pub use synchronizer::{generate_id, SyncState, Synchronizer};
