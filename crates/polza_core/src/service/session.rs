//! Editor session: keeps the surface and the document store in step.
//!
//! # Responsibility
//! - Forward surface content changes to the active document.
//! - Load the active document into the surface when the active identity
//!   changes, and only then.
//!
//! # Invariants
//! - Pending surface events are flushed to the document they were made on
//!   before the surface switches to another document.

use crate::editor::surface::{EditingSurface, SurfaceEvent};
use crate::model::document::{Document, DocumentId};
use crate::repo::kv_repo::KeyValueStore;
use crate::service::document_store::DocumentStore;
use log::debug;
use std::cell::RefCell;

pub struct EditorSession<S: KeyValueStore, E: EditingSurface> {
    store: DocumentStore<S>,
    surface: RefCell<E>,
    shown_id: DocumentId,
}

impl<S: KeyValueStore, E: EditingSurface> EditorSession<S, E> {
    /// Opens the active document of `store` in `surface`.
    pub fn open(store: DocumentStore<S>, surface: E) -> Self {
        let active = store.active_document().clone();
        let mut surface = surface;
        surface.set_content(&active.content);
        Self {
            store,
            surface: RefCell::new(surface),
            shown_id: active.id,
        }
    }

    pub fn store(&self) -> &DocumentStore<S> {
        &self.store
    }

    pub fn surface(&self) -> &RefCell<E> {
        &self.surface
    }

    /// Id of the document currently loaded in the surface.
    pub fn shown_id(&self) -> &str {
        &self.shown_id
    }

    /// Drains surface events into the shown document. Returns how many
    /// content changes were stored.
    pub fn sync(&mut self) -> usize {
        let events = self.surface.borrow_mut().take_events();
        let mut stored = 0;
        for event in events {
            match event {
                SurfaceEvent::ContentChanged(markup) => {
                    self.store.update_content(&self.shown_id, markup);
                    stored += 1;
                }
            }
        }
        if stored > 0 {
            debug!("event=session_sync module=session status=ok changes={stored}");
        }
        stored
    }

    pub fn select_document(&mut self, id: &str) -> bool {
        self.sync();
        let switched = self.store.set_active(id);
        self.show_active();
        switched
    }

    pub fn create_document(&mut self) -> Document {
        self.sync();
        let doc = self.store.create();
        self.show_active();
        doc
    }

    pub fn import_document(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Document {
        self.sync();
        let doc = self.store.import_document(title, content);
        self.show_active();
        doc
    }

    pub fn delete_document(&mut self, id: &str) {
        self.sync();
        self.store.delete(id);
        self.show_active();
    }

    /// Renames the shown document.
    pub fn rename(&mut self, title: impl Into<String>) {
        self.store.update_title(&self.shown_id, title);
    }

    fn show_active(&mut self) {
        let active = self.store.active_document();
        if active.id == self.shown_id {
            return;
        }
        self.surface.borrow_mut().set_content(&active.content);
        self.shown_id = active.id.clone();
        debug!("event=session_switch module=session status=ok");
    }
}
