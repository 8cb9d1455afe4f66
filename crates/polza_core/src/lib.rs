//! Core of the Polza writer: documents, storage, the editing-surface seam
//! and the AI improve operation.
//! Hosts (CLI, UI) hold no business rules of their own.

pub mod convert;
pub mod db;
pub mod editor;
pub mod improve;
pub mod logging;
pub mod model;
pub mod repo;
pub mod rewrite;
pub mod service;

pub use convert::{ExportError, ImportError, ImportedDocument};
pub use editor::surface::{EditingSurface, MemorySurface, Selection};
pub use editor::tree::{RichText, ANCHOR_TOKEN};
pub use improve::{
    trigger_channel, ImproveOrchestrator, ImproveOutcome, ImproveState, ImproveTarget, Notifier,
    TriggerHandle, TriggerSource,
};
pub use logging::{default_log_level, init_logging, logging_status, resolve_log_level};
pub use model::document::{Document, DocumentId};
pub use repo::kv_repo::{KeyValueStore, RepoError, RepoResult, SqliteKeyValueStore};
pub use rewrite::{PolzaClient, RewriteError, Rewriter};
pub use service::document_store::DocumentStore;
pub use service::session::EditorSession;
pub use service::settings::{SettingKey, Settings, MODEL_CATALOG};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
