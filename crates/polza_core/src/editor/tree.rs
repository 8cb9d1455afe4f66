//! Block tree behind the editing surface.
//!
//! # Responsibility
//! - Hold the document as blocks of marked inline runs and anchor nodes.
//! - Keep the markup around the text (inline marks, enclosing containers,
//!   block tags) so unedited parts serialize back unchanged.
//! - Map flat positions onto the tree and apply deletes and inserts there.
//!
//! # Invariants
//! - A tree always has at least one block.
//! - Positions are flat units: one per char, one per anchor or hard break,
//!   and one between each pair of adjacent blocks. `size()` is the last
//!   position.
//! - Out-of-range positions are clamped, never rejected.
//! - Inside a block, adjacent text runs with equal marks are merged and
//!   empty runs dropped.

/// Text form of an anchor, used in markup and in extracted text.
pub const ANCHOR_TOKEN: &str = "[[POLZA_MARKER]]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Heading level, 1..=6.
    Heading(u8),
    CodeBlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    /// A "continue writing from here" cursor stored in the document.
    Anchor,
    /// A line break inside one block.
    HardBreak,
}

impl Inline {
    fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Anchor | Self::HardBreak => 1,
        }
    }
}

/// Inline formatting element (`<strong>`, `<a href=..>`, ...), outermost
/// first in a run's mark list. `open` is the opening tag as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub name: String,
    pub open: String,
}

impl Mark {
    pub fn new(name: impl Into<String>, open: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: open.into(),
        }
    }
}

/// Enclosing element of a block (`<ul>`, `<li>`, `<blockquote>`, `<td>`).
/// Blocks inside the same element instance share its `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: u32,
    pub name: String,
    pub open: String,
}

/// How a block's own element is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTag {
    /// The default tag for the block kind.
    Default,
    /// No element: text placed directly inside its container.
    Bare,
    /// An element read from markup, written back with its attributes.
    Verbatim { name: String, open: String },
}

/// One inline node with its marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub inline: Inline,
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub tag: BlockTag,
    pub containers: Vec<Container>,
    runs: Vec<Run>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            tag: BlockTag::Default,
            containers: Vec::new(),
            runs: Vec::new(),
        }
    }

    pub fn with_text(kind: BlockKind, text: &str) -> Self {
        let mut block = Self::new(kind);
        block.push_text(text);
        block
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Length in position units.
    pub fn len(&self) -> usize {
        self.runs.iter().map(|run| run.inline.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Block text with anchors rendered as [`ANCHOR_TOKEN`] and hard breaks
    /// as `\n`.
    pub fn text(&self) -> String {
        self.text_range(0, self.len())
    }

    /// Appends unmarked text.
    pub fn push_text(&mut self, text: &str) {
        self.push(Inline::Text(text.to_string()), &[]);
    }

    /// Appends `inline` carrying `marks`, merging into the previous text run
    /// when both are text with the same marks.
    pub fn push(&mut self, inline: Inline, marks: &[Mark]) {
        if let Inline::Text(text) = &inline {
            if text.is_empty() {
                return;
            }
            if let Some(Run {
                inline: Inline::Text(last),
                marks: last_marks,
            }) = self.runs.last_mut()
            {
                if last_marks.as_slice() == marks {
                    last.push_str(text);
                    return;
                }
            }
        }
        self.runs.push(Run {
            inline,
            marks: marks.to_vec(),
        });
    }

    /// Marks that text typed at the end of this block picks up. Links do not
    /// extend past their end.
    fn trailing_marks(&self) -> Vec<Mark> {
        self.runs
            .last()
            .map(|run| {
                run.marks
                    .iter()
                    .filter(|mark| mark.name != "a")
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A fresh paragraph placed in the same containers.
    fn sibling(&self) -> Block {
        Block {
            containers: self.containers.clone(),
            ..Block::new(BlockKind::Paragraph)
        }
    }

    /// Moves everything after `offset` into a new block of the same kind.
    fn split_off(&mut self, offset: usize) -> Block {
        let mut right = Block::new(self.kind);
        let mut seen = 0;

        for run in std::mem::take(&mut self.runs) {
            let len = run.inline.len();
            if seen + len <= offset {
                self.push(run.inline, &run.marks);
            } else if seen >= offset {
                right.push(run.inline, &run.marks);
            } else if let Inline::Text(text) = &run.inline {
                let cut = byte_index(text, offset - seen);
                self.push(Inline::Text(text[..cut].to_string()), &run.marks);
                right.push(Inline::Text(text[cut..].to_string()), &run.marks);
            }
            seen += len;
        }
        right
    }

    fn append(&mut self, other: Block) {
        for run in other.runs {
            self.push(run.inline, &run.marks);
        }
    }

    fn text_range(&self, start: usize, end: usize) -> String {
        let mut out = String::new();
        let mut seen = 0;
        for run in &self.runs {
            let len = run.inline.len();
            let lo = start.max(seen);
            let hi = end.min(seen + len);
            if lo < hi {
                match &run.inline {
                    Inline::Text(text) => {
                        out.extend(text.chars().skip(lo - seen).take(hi - lo));
                    }
                    Inline::Anchor => out.push_str(ANCHOR_TOKEN),
                    Inline::HardBreak => out.push('\n'),
                }
            }
            seen += len;
        }
        out
    }
}

/// A whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichText {
    blocks: Vec<Block>,
}

impl Default for RichText {
    fn default() -> Self {
        Self {
            blocks: vec![Block::new(BlockKind::Paragraph)],
        }
    }
}

impl RichText {
    /// Builds a tree from `blocks`; an empty list yields one empty paragraph.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::default();
        }
        Self { blocks }
    }

    /// One paragraph per line of `text`; a trailing `\r` on a line is dropped.
    pub fn from_plain_text(text: &str) -> Self {
        Self::from_blocks(
            text.split('\n')
                .map(|line| {
                    Block::with_text(BlockKind::Paragraph, line.trim_end_matches('\r'))
                })
                .collect(),
        )
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Largest valid position.
    pub fn size(&self) -> usize {
        self.blocks.iter().map(Block::len).sum::<usize>() + self.blocks.len() - 1
    }

    /// Text in `from..to`, with `separator` between blocks and anchors
    /// rendered as [`ANCHOR_TOKEN`].
    pub fn text_between(&self, from: usize, to: usize, separator: &str) -> String {
        let (from, to) = self.ordered(from, to);
        let (first, first_offset) = self.resolve(from);
        let (last, last_offset) = self.resolve(to);

        let mut out = String::new();
        for index in first..=last {
            let block = &self.blocks[index];
            let start = if index == first { first_offset } else { 0 };
            let end = if index == last { last_offset } else { block.len() };
            out.push_str(&block.text_range(start, end));
            if index < last {
                out.push_str(separator);
            }
        }
        out
    }

    /// Whole document as text, one line per block.
    pub fn plain_text(&self) -> String {
        self.text_between(0, self.size(), "\n")
    }

    /// Position of the first anchor in document order.
    pub fn find_anchor(&self) -> Option<usize> {
        let mut start = 0;
        for block in &self.blocks {
            let mut offset = 0;
            for run in &block.runs {
                if run.inline == Inline::Anchor {
                    return Some(start + offset);
                }
                offset += run.inline.len();
            }
            start += block.len() + 1;
        }
        None
    }

    /// Removes `from..to`, joining the boundary blocks when the range spans
    /// block separators. The joined block keeps the first block's kind.
    ///
    /// Removing everything leaves a single plain paragraph.
    pub fn delete(&mut self, from: usize, to: usize) {
        let (from, to) = self.ordered(from, to);
        if from == to {
            return;
        }
        if from == 0 && to == self.size() {
            *self = Self::default();
            return;
        }
        let (first, first_offset) = self.resolve(from);
        let (last, last_offset) = self.resolve(to);

        let tail = self.blocks[last].split_off(last_offset);
        self.blocks[first].split_off(first_offset);
        if last > first {
            self.blocks.drain(first + 1..=last);
        }
        self.blocks[first].append(tail);
    }

    /// Inserts `text` at `at` and returns the position just after it.
    ///
    /// The text takes the marks of the run before `at`. Each `\n` starts a
    /// new paragraph in the same containers, except inside code blocks where
    /// it stays literal. Either way the insert grows the size by the char
    /// count.
    pub fn insert_text(&mut self, at: usize, text: &str) -> usize {
        let at = at.min(self.size());
        let (index, offset) = self.resolve(at);
        let inserted = text.chars().count();

        let tail = self.blocks[index].split_off(offset);
        let marks = self.blocks[index].trailing_marks();
        if self.blocks[index].kind == BlockKind::CodeBlock {
            self.blocks[index].push(Inline::Text(text.to_string()), &marks);
            self.blocks[index].append(tail);
            return at + inserted;
        }

        let mut lines = text.split('\n');
        if let Some(first_line) = lines.next() {
            self.blocks[index].push(Inline::Text(first_line.to_string()), &marks);
        }
        let mut current = index;
        for line in lines {
            let mut block = self.blocks[current].sibling();
            block.push(Inline::Text(line.to_string()), &marks);
            current += 1;
            self.blocks.insert(current, block);
        }
        self.blocks[current].append(tail);
        at + inserted
    }

    /// Inserts an anchor node at `at` and returns the position after it.
    pub fn insert_anchor(&mut self, at: usize) -> usize {
        let at = at.min(self.size());
        let (index, offset) = self.resolve(at);
        let tail = self.blocks[index].split_off(offset);
        self.blocks[index].push(Inline::Anchor, &[]);
        self.blocks[index].append(tail);
        at + 1
    }

    fn ordered(&self, from: usize, to: usize) -> (usize, usize) {
        let size = self.size();
        let (from, to) = (from.min(size), to.min(size));
        if from <= to {
            (from, to)
        } else {
            (to, from)
        }
    }

    /// Maps a position to `(block index, offset inside block)`.
    fn resolve(&self, pos: usize) -> (usize, usize) {
        let mut start = 0;
        for (index, block) in self.blocks.iter().enumerate() {
            let len = block.len();
            if pos <= start + len {
                return (index, pos.saturating_sub(start));
            }
            start += len + 1;
        }
        let last = self.blocks.len() - 1;
        (last, self.blocks[last].len())
    }
}

fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::{Block, BlockKind, Container, Inline, Mark, RichText, ANCHOR_TOKEN};

    fn doc(lines: &[&str]) -> RichText {
        RichText::from_plain_text(&lines.join("\n"))
    }

    fn strong() -> Mark {
        Mark::new("strong", "<strong>")
    }

    #[test]
    fn size_counts_separators() {
        assert_eq!(RichText::default().size(), 0);
        assert_eq!(doc(&["ab", "c"]).size(), 4);
    }

    #[test]
    fn text_between_spans_blocks() {
        let tree = doc(&["hello", "world"]);
        assert_eq!(tree.text_between(3, 8, "\n"), "lo\nwo");
        assert_eq!(tree.text_between(8, 3, "|"), "lo|wo");
        assert_eq!(tree.plain_text(), "hello\nworld");
    }

    #[test]
    fn delete_across_blocks_merges_them() {
        let mut tree = doc(&["hello", "big", "world"]);
        tree.delete(3, 12);
        assert_eq!(tree.blocks().len(), 1);
        assert_eq!(tree.plain_text(), "helrld");
    }

    #[test]
    fn deleting_everything_leaves_a_plain_paragraph() {
        let mut tree = RichText::from_blocks(vec![
            Block::with_text(BlockKind::Heading(1), "Title"),
            Block::with_text(BlockKind::Paragraph, "body"),
        ]);
        tree.delete(0, tree.size());
        assert_eq!(tree, RichText::default());

        let mut code = RichText::from_blocks(vec![Block::with_text(BlockKind::CodeBlock, "x")]);
        code.delete(0, 1);
        code.insert_text(0, "a\nb");
        assert_eq!(code.blocks().len(), 2);
        assert_eq!(code.blocks()[0].kind, BlockKind::Paragraph);
    }

    #[test]
    fn insert_with_newlines_splits_blocks() {
        let mut tree = doc(&["ad"]);
        let end = tree.insert_text(1, "b\nc");
        assert_eq!(end, 4);
        assert_eq!(tree.plain_text(), "ab\ncd");
        assert_eq!(tree.blocks().len(), 2);
    }

    #[test]
    fn new_lines_stay_inside_the_same_containers() {
        let item = Container {
            id: 7,
            name: "li".to_string(),
            open: "<li>".to_string(),
        };
        let mut block = Block::with_text(BlockKind::Paragraph, "ab");
        block.containers = vec![item.clone()];
        let mut tree = RichText::from_blocks(vec![block]);

        tree.insert_text(1, "\n");
        assert_eq!(tree.blocks().len(), 2);
        assert!(tree.blocks().iter().all(|b| b.containers == vec![item.clone()]));
    }

    #[test]
    fn inserted_text_takes_marks_of_the_text_before_it() {
        let mut block = Block::new(BlockKind::Paragraph);
        block.push_text("a ");
        block.push(Inline::Text("bold".to_string()), &[strong()]);
        let mut tree = RichText::from_blocks(vec![block]);

        tree.insert_text(4, "XX");
        let runs = tree.blocks()[0].runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].inline, Inline::Text("boXXld".to_string()));

        tree.insert_text(0, "> ");
        assert_eq!(tree.blocks()[0].runs()[0].inline, Inline::Text("> a ".to_string()));
    }

    #[test]
    fn code_blocks_keep_newlines_literal() {
        let mut tree = RichText::from_blocks(vec![Block::with_text(BlockKind::CodeBlock, "xy")]);
        tree.insert_text(1, "1\n2");
        assert_eq!(tree.blocks().len(), 1);
        assert_eq!(tree.blocks()[0].text(), "x1\n2y");
    }

    #[test]
    fn anchors_occupy_one_position_and_render_as_token() {
        let mut tree = doc(&["intro", "draft"]);
        tree.insert_anchor(6);
        assert_eq!(tree.find_anchor(), Some(6));
        assert_eq!(tree.size(), 12);
        assert_eq!(tree.text_between(7, tree.size(), "\n"), "draft");
        assert_eq!(tree.plain_text(), format!("intro\n{ANCHOR_TOKEN}draft"));
    }

    #[test]
    fn find_anchor_returns_first_in_document_order() {
        let mut tree = doc(&["a", "b"]);
        tree.insert_anchor(3);
        tree.insert_anchor(1);
        assert_eq!(tree.find_anchor(), Some(1));
    }

    #[test]
    fn positions_are_clamped() {
        let mut tree = doc(&["abc"]);
        assert_eq!(tree.insert_text(99, "!"), 4);
        tree.delete(2, 99);
        assert_eq!(tree.plain_text(), "ab");
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let mut tree = doc(&["привет"]);
        tree.delete(1, 5);
        assert_eq!(tree.plain_text(), "пт");
    }
}
