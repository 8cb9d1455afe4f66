//! Editing surface contract and an in-memory implementation.
//!
//! # Responsibility
//! - Expose the document, the selection and atomic transactions to hosts.
//! - Report content changes as events the host drains.
//!
//! # Invariants
//! - `apply` records exactly one undo step, however many steps it holds.
//! - At most [`MAX_HISTORY`] undo steps are kept; the oldest is dropped first.
//! - `set_content` replaces the document, clears history and emits no event.
//! - Every other content mutation queues one `ContentChanged` event.

use crate::editor::markup;
use crate::editor::tree::RichText;

/// Undo depth of [`MemorySurface`].
pub const MAX_HISTORY: usize = 100;

/// A position that may refer to the document end as it is when the step
/// runs, after earlier steps of the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pos {
    At(usize),
    End,
}

impl Pos {
    fn resolve(self, doc: &RichText) -> usize {
        match self {
            Self::At(pos) => pos,
            Self::End => doc.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Delete { from: usize, to: Pos },
    InsertText { at: Pos, text: String },
    InsertAnchor { at: Pos },
}

/// Ordered steps applied as one undoable edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    steps: Vec<Step>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(mut self, from: usize, to: Pos) -> Self {
        self.steps.push(Step::Delete { from, to });
        self
    }

    pub fn insert_text(mut self, at: Pos, text: impl Into<String>) -> Self {
        self.steps.push(Step::InsertText {
            at,
            text: text.into(),
        });
        self
    }

    pub fn insert_anchor(mut self, at: Pos) -> Self {
        self.steps.push(Step::InsertAnchor { at });
        self
    }

    /// Runs every step against `doc`; returns where the cursor lands.
    pub fn apply_to(&self, doc: &mut RichText) -> usize {
        let mut cursor = 0;
        for step in &self.steps {
            cursor = match step {
                Step::Delete { from, to } => {
                    let to = to.resolve(doc);
                    doc.delete(*from, to);
                    (*from).min(to)
                }
                Step::InsertText { at, text } => {
                    let at = at.resolve(doc);
                    doc.insert_text(at, text)
                }
                Step::InsertAnchor { at } => {
                    let at = at.resolve(doc);
                    doc.insert_anchor(at)
                }
            };
        }
        cursor.min(doc.size())
    }
}

/// Normalized selection; `from == to` is a caret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub from: usize,
    pub to: usize,
}

impl Selection {
    pub fn caret(pos: usize) -> Self {
        Self { from: pos, to: pos }
    }

    pub fn range(a: usize, b: usize) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Full serialized markup after a mutation.
    ContentChanged(String),
}

/// What the host and the orchestrator need from an editor widget.
pub trait EditingSurface {
    fn document(&self) -> &RichText;
    fn selection(&self) -> Selection;
    fn set_selection(&mut self, selection: Selection);
    /// Applies `tx` as one undoable edit.
    fn apply(&mut self, tx: Transaction);
    /// Replaces the whole document without recording history or events.
    fn set_content(&mut self, markup: &str);
    fn markup(&self) -> String;
    fn take_events(&mut self) -> Vec<SurfaceEvent>;
}

#[derive(Debug, Clone)]
struct Snapshot {
    doc: RichText,
    selection: Selection,
}

/// Surface kept entirely in memory, with snapshot undo/redo.
#[derive(Debug, Default)]
pub struct MemorySurface {
    doc: RichText,
    selection: Selection,
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
    events: Vec<SurfaceEvent>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_markup(markup: &str) -> Self {
        let mut surface = Self::new();
        surface.set_content(markup);
        surface
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.redo.push(current);
        self.restore(previous);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.push_undo(current);
        self.restore(next);
        true
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        if self.undo.len() == MAX_HISTORY {
            self.undo.remove(0);
        }
        self.undo.push(snapshot);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            doc: self.doc.clone(),
            selection: self.selection,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.doc = snapshot.doc;
        self.selection = snapshot.selection;
        self.emit_change();
    }

    fn emit_change(&mut self) {
        let markup = self.markup();
        self.events.push(SurfaceEvent::ContentChanged(markup));
    }
}

impl EditingSurface for MemorySurface {
    fn document(&self) -> &RichText {
        &self.doc
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        let size = self.doc.size();
        self.selection = Selection::range(selection.from.min(size), selection.to.min(size));
    }

    fn apply(&mut self, tx: Transaction) {
        let before = self.snapshot();
        let cursor = tx.apply_to(&mut self.doc);
        self.selection = Selection::caret(cursor);
        self.push_undo(before);
        self.redo.clear();
        self.emit_change();
    }

    fn set_content(&mut self, markup: &str) {
        self.doc = markup::parse(markup);
        self.selection = Selection::default();
        self.undo.clear();
        self.redo.clear();
    }

    fn markup(&self) -> String {
        markup::serialize(&self.doc)
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EditingSurface, MemorySurface, Pos, Selection, SurfaceEvent, Transaction, MAX_HISTORY,
    };

    #[test]
    fn one_transaction_is_one_undo_step() {
        let mut surface = MemorySurface::from_markup("<p>abc</p>");
        surface.apply(
            Transaction::new()
                .delete(0, Pos::End)
                .insert_text(Pos::At(0), "x")
                .insert_text(Pos::End, "y"),
        );
        assert_eq!(surface.document().plain_text(), "xy");

        assert!(surface.undo());
        assert_eq!(surface.document().plain_text(), "abc");
        assert!(!surface.can_undo());
        assert!(surface.redo());
        assert_eq!(surface.document().plain_text(), "xy");
    }

    #[test]
    fn set_content_emits_nothing_and_apply_emits_markup() {
        let mut surface = MemorySurface::new();
        surface.set_content("<p>a</p>");
        assert!(surface.take_events().is_empty());

        surface.apply(Transaction::new().insert_text(Pos::End, "b"));
        assert_eq!(
            surface.take_events(),
            vec![SurfaceEvent::ContentChanged("<p>ab</p>".to_string())]
        );
        assert!(surface.take_events().is_empty());
    }

    #[test]
    fn selection_is_normalized_and_clamped() {
        let mut surface = MemorySurface::from_markup("<p>abc</p>");
        surface.set_selection(Selection { from: 9, to: 1 });
        assert_eq!(surface.selection(), Selection::range(1, 3));
        assert!(Selection::caret(2).is_empty());
    }

    #[test]
    fn history_keeps_only_the_newest_steps() {
        let mut surface = MemorySurface::from_markup("<p></p>");
        for _ in 0..MAX_HISTORY + 5 {
            surface.apply(Transaction::new().insert_text(Pos::End, "x"));
        }

        let mut undone = 0;
        while surface.undo() {
            undone += 1;
        }
        assert_eq!(undone, MAX_HISTORY);
        assert_eq!(surface.document().plain_text(), "x".repeat(5));
    }
}
