//! Which span an improve call rewrites, and how the result goes back in.

use crate::editor::surface::{Pos, Selection, Transaction};
use crate::editor::tree::RichText;

/// Block separator used when extracting target text.
pub const BLOCK_SEPARATOR: &str = "\n";

/// The span chosen for one improve operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImproveTarget {
    /// A non-empty user selection.
    Selection { from: usize, to: usize },
    /// Everything after the first anchor; `position` is the anchor itself.
    Anchor { position: usize },
    /// The whole document.
    Whole,
}

impl ImproveTarget {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Selection { .. } => "selection",
            Self::Anchor { .. } => "anchor",
            Self::Whole => "whole",
        }
    }
}

/// A target together with the text that will be sent for rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTarget {
    pub target: ImproveTarget,
    pub text: String,
}

impl ExtractedTarget {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Picks the target in priority order: selection, then anchor, then whole.
pub fn extract_target(doc: &RichText, selection: Selection) -> ExtractedTarget {
    if !selection.is_empty() {
        return ExtractedTarget {
            target: ImproveTarget::Selection {
                from: selection.from,
                to: selection.to,
            },
            text: doc.text_between(selection.from, selection.to, BLOCK_SEPARATOR),
        };
    }

    if let Some(position) = doc.find_anchor() {
        return ExtractedTarget {
            target: ImproveTarget::Anchor { position },
            text: doc.text_between(position + 1, doc.size(), BLOCK_SEPARATOR),
        };
    }

    ExtractedTarget {
        target: ImproveTarget::Whole,
        text: doc.text_between(0, doc.size(), BLOCK_SEPARATOR),
    }
}

/// Builds the single transaction that splices `improved` into the target.
///
/// Anchor mode re-creates the anchor two blank lines below the rewrite so
/// the next call continues from the new end.
pub fn splice_transaction(target: ImproveTarget, improved: &str) -> Transaction {
    match target {
        ImproveTarget::Selection { from, to } => Transaction::new()
            .delete(from, Pos::At(to))
            .insert_text(Pos::At(from), improved),
        ImproveTarget::Anchor { position } => Transaction::new()
            .delete(position, Pos::End)
            .insert_text(Pos::At(position), improved)
            .insert_text(Pos::End, "\n\n")
            .insert_anchor(Pos::End),
        ImproveTarget::Whole => Transaction::new()
            .delete(0, Pos::End)
            .insert_text(Pos::At(0), improved),
    }
}
