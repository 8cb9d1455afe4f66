//! Document domain model.
//!
//! # Invariants
//! - `id` never changes after construction.
//! - `updated_at` is refreshed by every title or content edit.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Opaque document identifier. Freshly created ids are UUID v4 strings, but
/// persisted ids are accepted verbatim.
pub type DocumentId = String;

pub const DEFAULT_TITLE: &str = "Untitled Document";
pub const NEW_DOCUMENT_TITLE: &str = "New Document";
pub const DEFAULT_CONTENT: &str = "<p>Start typing here...</p>";

/// One stored document. Serialized with the field names used on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    /// Serialized rich-text markup.
    pub content: String,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Document {
    /// Creates a document with a generated id and the current timestamp.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            updated_at: now_epoch_ms(),
        }
    }

    /// The seed document used on first run and after the last delete.
    pub fn untitled() -> Self {
        Self::new(DEFAULT_TITLE, DEFAULT_CONTENT)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.touch();
    }

    fn touch(&mut self) {
        // Two edits inside one millisecond must still move the timestamp.
        self.updated_at = now_epoch_ms().max(self.updated_at + 1);
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
