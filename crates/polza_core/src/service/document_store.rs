//! Document set ownership and persistence.
//!
//! # Responsibility
//! - Own the ordered document list and the active-document pointer.
//! - Persist both, under separate keys, after every mutation.
//! - Migrate the legacy single-document key on first run.
//!
//! # Invariants
//! - The set is never empty.
//! - Newly created or imported documents go first and become active.
//! - Persistence is best-effort: a failed write is logged and the in-memory
//!   state stays as mutated.
//! - Loading writes only a migrated or freshly seeded set, and only when
//!   every read succeeded. A set that failed to read or decode is left in
//!   storage until the next mutation.

use crate::model::document::{Document, DocumentId, NEW_DOCUMENT_TITLE, DEFAULT_CONTENT};
use crate::repo::kv_repo::{KeyValueStore, RepoError, RepoResult};
use log::{debug, error, info, warn};

pub const DOCUMENTS_KEY: &str = "polza-documents";
pub const ACTIVE_DOCUMENT_KEY: &str = "polza-current-doc-id";
pub const LEGACY_CONTENT_KEY: &str = "polza-docs-content";

/// In-memory document set backed by a key-value store.
pub struct DocumentStore<S: KeyValueStore> {
    storage: S,
    documents: Vec<Document>,
    active_id: DocumentId,
}

impl<S: KeyValueStore> DocumentStore<S> {
    /// Loads the persisted set, migrating or seeding when nothing is stored.
    ///
    /// Read failures fall back to defaults in memory so the editor always
    /// starts with a usable document.
    pub fn load(storage: S) -> Self {
        let LoadedSet {
            documents,
            write_back,
        } = load_documents(&storage);
        let active_id = read_key(&storage, ACTIVE_DOCUMENT_KEY)
            .ok()
            .flatten()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| documents[0].id.clone());

        info!(
            "event=store_load module=document_store status=ok documents={}",
            documents.len()
        );

        let store = Self {
            storage,
            documents,
            active_id,
        };
        if write_back {
            store.persist();
        }
        store
    }

    /// All documents, newest created/imported first.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// The raw active pointer. May name a missing document; use
    /// [`Self::active_document`] for the resolved one.
    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// The active document, falling back to the first member.
    pub fn active_document(&self) -> &Document {
        self.get(&self.active_id).unwrap_or(&self.documents[0])
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    /// Creates a default "New Document", prepends it and makes it active.
    pub fn create(&mut self) -> Document {
        self.insert_front(Document::new(NEW_DOCUMENT_TITLE, DEFAULT_CONTENT))
    }

    /// Adds converted content under `title`, prepends it and makes it active.
    pub fn import_document(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Document {
        self.insert_front(Document::new(title, content))
    }

    /// Removes the document with `id`.
    ///
    /// Removing the last document seeds a fresh untitled one; removing the
    /// active one activates the new first member. Unknown ids are ignored.
    pub fn delete(&mut self, id: &str) {
        let before = self.documents.len();
        self.documents.retain(|doc| doc.id != id);
        if self.documents.len() == before {
            debug!("event=doc_delete module=document_store status=skip reason=not_found");
            return;
        }

        if self.documents.is_empty() {
            let replacement = Document::untitled();
            self.active_id = replacement.id.clone();
            self.documents.push(replacement);
        } else if self.active_id == id {
            self.active_id = self.documents[0].id.clone();
        }

        info!(
            "event=doc_delete module=document_store status=ok remaining={}",
            self.documents.len()
        );
        self.persist();
    }

    /// Replaces the content of `id` and refreshes its timestamp.
    pub fn update_content(&mut self, id: &str, content: impl Into<String>) {
        if let Some(doc) = self.documents.iter_mut().find(|doc| doc.id == id) {
            doc.set_content(content);
            self.persist();
        }
    }

    /// Replaces the title of `id` and refreshes its timestamp.
    pub fn update_title(&mut self, id: &str, title: impl Into<String>) {
        if let Some(doc) = self.documents.iter_mut().find(|doc| doc.id == id) {
            doc.set_title(title);
            self.persist();
        }
    }

    /// Points the active pointer at `id`.
    ///
    /// Returns `false` and leaves the pointer unchanged when no document has
    /// that id.
    pub fn set_active(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            warn!("event=doc_activate module=document_store status=skip reason=not_found");
            return false;
        }
        self.active_id = id.to_string();
        self.persist();
        true
    }

    fn insert_front(&mut self, doc: Document) -> Document {
        self.active_id = doc.id.clone();
        self.documents.insert(0, doc.clone());
        info!(
            "event=doc_create module=document_store status=ok documents={}",
            self.documents.len()
        );
        self.persist();
        doc
    }

    fn persist(&self) {
        let payload = match serde_json::to_string(&self.documents) {
            Ok(payload) => payload,
            Err(err) => {
                error!("event=store_persist module=document_store status=error stage=encode error={err}");
                return;
            }
        };

        if let Err(err) = self.storage.set(DOCUMENTS_KEY, &payload) {
            warn!("event=store_persist module=document_store status=error key={DOCUMENTS_KEY} error={err}");
        }
        if let Err(err) = self.storage.set(ACTIVE_DOCUMENT_KEY, &self.active_id) {
            warn!("event=store_persist module=document_store status=error key={ACTIVE_DOCUMENT_KEY} error={err}");
        }
    }
}

struct LoadedSet {
    documents: Vec<Document>,
    /// The set was migrated or seeded over storage that read back empty.
    write_back: bool,
}

fn load_documents<S: KeyValueStore>(storage: &S) -> LoadedSet {
    let saved = read_key(storage, DOCUMENTS_KEY);
    if let Ok(Some(payload)) = &saved {
        match decode_documents(payload) {
            Ok(documents) => {
                return LoadedSet {
                    documents,
                    write_back: false,
                }
            }
            Err(err) => error!(
                "event=store_load module=document_store status=error stage=decode error={err}"
            ),
        }
    }
    let storage_empty = matches!(saved, Ok(None));

    let legacy = read_key(storage, LEGACY_CONTENT_KEY);
    if let Ok(Some(content)) = &legacy {
        info!("event=store_migrate module=document_store status=ok source=legacy_content");
        let mut doc = Document::untitled();
        doc.content = content.clone();
        return LoadedSet {
            documents: vec![doc],
            write_back: storage_empty,
        };
    }

    LoadedSet {
        documents: vec![Document::untitled()],
        write_back: storage_empty && legacy.is_ok(),
    }
}

fn decode_documents(payload: &str) -> RepoResult<Vec<Document>> {
    let documents: Vec<Document> = serde_json::from_str(payload)
        .map_err(|err| RepoError::InvalidData(format!("{DOCUMENTS_KEY}: {err}")))?;
    if documents.is_empty() {
        return Err(RepoError::InvalidData(format!("{DOCUMENTS_KEY}: empty set")));
    }
    Ok(documents)
}

fn read_key<S: KeyValueStore>(storage: &S, key: &str) -> RepoResult<Option<String>> {
    storage.get(key).inspect_err(|err| {
        warn!("event=store_read module=document_store status=error key={key} error={err}");
    })
}
