//! HTML-subset reader and writer for stored document content.
//!
//! Reading keeps what the tree can carry: inline elements become marks,
//! list/quote/table/div elements become block containers, and block tags
//! keep their attributes. Markup that was read and not edited is written
//! back unchanged, apart from whitespace between block elements and
//! entity spelling. Void elements other than `<br>` are dropped.
//!
//! The anchor token is recognized in ordinary text only. Inside code
//! blocks and inline `<code>` it stays literal text.

use crate::editor::tree::{
    Block, BlockKind, BlockTag, Container, Inline, Mark, RichText, Run, ANCHOR_TOKEN,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*>").expect("valid tag regex")
});
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid entity regex")
});

/// Parses stored markup into a tree.
pub fn parse(markup: &str) -> RichText {
    let mut reader = Reader::default();
    let mut cursor = 0;

    for caps in TAG_RE.captures_iter(markup) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        reader.text(&markup[cursor..whole.start()]);
        cursor = whole.end();

        if let Some(name) = caps.get(2) {
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let raw = whole.as_str();
            reader.tag(
                &name.as_str().to_ascii_lowercase(),
                raw,
                closing,
                raw.ends_with("/>"),
            );
        }
    }
    reader.text(&markup[cursor..]);
    reader.finish()
}

/// Serializes a tree back to markup.
pub fn serialize(doc: &RichText) -> String {
    let mut out = String::new();
    let mut open: Vec<&Container> = Vec::new();
    for block in doc.blocks() {
        let shared = open
            .iter()
            .zip(&block.containers)
            .take_while(|(open, wanted)| open.id == wanted.id)
            .count();
        for container in open.drain(shared..).rev() {
            close_tag(&mut out, &container.name);
        }
        for container in &block.containers[shared..] {
            out.push_str(&container.open);
            open.push(container);
        }
        write_block(&mut out, block);
    }
    for container in open.drain(..).rev() {
        close_tag(&mut out, &container.name);
    }
    out
}

fn write_block(out: &mut String, block: &Block) {
    match &block.tag {
        BlockTag::Bare => write_runs(out, block.runs()),
        BlockTag::Verbatim { name, open } => {
            out.push_str(open);
            write_runs(out, block.runs());
            close_tag(out, name);
        }
        BlockTag::Default => {
            let name = match block.kind {
                BlockKind::Paragraph => "p".to_string(),
                BlockKind::Heading(level) => format!("h{}", level.clamp(1, 6)),
                BlockKind::CodeBlock => "pre".to_string(),
            };
            out.push_str(&format!("<{name}>"));
            write_runs(out, block.runs());
            close_tag(out, &name);
        }
    }
}

fn write_runs(out: &mut String, runs: &[Run]) {
    let mut open: Vec<&Mark> = Vec::new();
    for run in runs {
        let shared = open
            .iter()
            .zip(&run.marks)
            .take_while(|(open, wanted)| **open == *wanted)
            .count();
        for mark in open.drain(shared..).rev() {
            close_tag(out, &mark.name);
        }
        for mark in &run.marks[shared..] {
            out.push_str(&mark.open);
            open.push(mark);
        }
        match &run.inline {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Anchor => out.push_str(ANCHOR_TOKEN),
            Inline::HardBreak => out.push_str("<br>"),
        }
    }
    for mark in open.drain(..).rev() {
        close_tag(out, &mark.name);
    }
}

fn close_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Escapes text for use inside markup element content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Decodes named and numeric character references. Unknown names are kept.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => numeric_reference(name),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn numeric_reference(name: &str) -> Option<char> {
    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

enum TagRole {
    Block(BlockKind),
    Container,
    Break,
    Void,
    Mark,
}

fn tag_role(tag: &str) -> TagRole {
    match tag {
        "p" => TagRole::Block(BlockKind::Paragraph),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => tag[1..]
            .parse()
            .map_or(TagRole::Mark, |level| TagRole::Block(BlockKind::Heading(level))),
        "pre" => TagRole::Block(BlockKind::CodeBlock),
        "ul" | "ol" | "li" | "blockquote" | "div" | "section" | "article" | "table"
        | "thead" | "tbody" | "tfoot" | "tr" | "td" | "th" | "dl" | "dt" | "dd" => {
            TagRole::Container
        }
        "br" => TagRole::Break,
        "img" | "hr" | "input" | "wbr" | "col" | "meta" | "link" | "source" | "area"
        | "embed" => TagRole::Void,
        _ => TagRole::Mark,
    }
}

struct OpenContainer {
    container: Container,
    /// A block has been emitted inside this element.
    filled: bool,
}

#[derive(Default)]
struct Reader {
    blocks: Vec<Block>,
    current: Option<Block>,
    containers: Vec<OpenContainer>,
    marks: Vec<Mark>,
    next_id: u32,
}

impl Reader {
    fn tag(&mut self, name: &str, raw: &str, closing: bool, self_closing: bool) {
        match tag_role(name) {
            TagRole::Break if !closing => self.line_break(),
            TagRole::Break | TagRole::Void => {}
            TagRole::Block(_) if closing => {
                self.flush();
                self.marks.clear();
            }
            TagRole::Block(kind) => {
                self.flush();
                self.marks.clear();
                let mut block = Block::new(kind);
                block.tag = BlockTag::Verbatim {
                    name: name.to_string(),
                    open: raw.to_string(),
                };
                block.containers = self.container_path();
                self.current = Some(block);
            }
            TagRole::Container if closing => self.close_container(name),
            TagRole::Container if self_closing => {}
            TagRole::Container => {
                self.flush();
                self.marks.clear();
                self.next_id += 1;
                self.containers.push(OpenContainer {
                    container: Container {
                        id: self.next_id,
                        name: name.to_string(),
                        open: raw.to_string(),
                    },
                    filled: false,
                });
            }
            TagRole::Mark if closing => {
                if let Some(index) = self.marks.iter().rposition(|mark| mark.name == name) {
                    self.marks.truncate(index);
                }
            }
            TagRole::Mark if self_closing => {}
            TagRole::Mark => self.marks.push(Mark::new(name, raw)),
        }
    }

    fn close_container(&mut self, name: &str) {
        if !self.containers.iter().any(|open| open.container.name == name) {
            return;
        }
        self.flush();
        self.marks.clear();
        loop {
            let path = self.container_path();
            let Some(open) = self.containers.pop() else {
                return;
            };
            if !open.filled {
                // Keeps empty elements such as `<td></td>` in place.
                let mut block = Block::new(BlockKind::Paragraph);
                block.tag = BlockTag::Bare;
                block.containers = path;
                self.emit(block);
            }
            if open.container.name == name {
                return;
            }
        }
    }

    fn line_break(&mut self) {
        let marks = self.marks.clone();
        let block = self.current_block();
        if block.kind == BlockKind::CodeBlock {
            block.push(Inline::Text("\n".to_string()), &marks);
        } else {
            block.push(Inline::HardBreak, &marks);
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() || (self.current.is_none() && raw.trim().is_empty()) {
            return;
        }
        let decoded = decode_entities(raw);
        let marks = self.marks.clone();
        let in_code = marks.iter().any(|mark| mark.name == "code");
        let block = self.current_block();

        if block.kind == BlockKind::CodeBlock {
            block.push(Inline::Text(decoded), &marks);
            return;
        }
        let flat = decoded.replace(['\n', '\r'], " ");
        if in_code {
            block.push(Inline::Text(flat), &marks);
            return;
        }

        let mut pieces = flat.split(ANCHOR_TOKEN);
        if let Some(first) = pieces.next() {
            block.push(Inline::Text(first.to_string()), &marks);
        }
        for piece in pieces {
            block.push(Inline::Anchor, &marks);
            block.push(Inline::Text(piece.to_string()), &marks);
        }
    }

    /// The open block, starting a bare one for text outside any block tag.
    fn current_block(&mut self) -> &mut Block {
        let containers = self.container_path();
        self.current.get_or_insert_with(|| {
            let mut block = Block::new(BlockKind::Paragraph);
            block.tag = BlockTag::Bare;
            block.containers = containers;
            block
        })
    }

    fn container_path(&self) -> Vec<Container> {
        self.containers
            .iter()
            .map(|open| open.container.clone())
            .collect()
    }

    fn flush(&mut self) {
        if let Some(block) = self.current.take() {
            self.emit(block);
        }
    }

    fn emit(&mut self, block: Block) {
        for open in &mut self.containers {
            open.filled = true;
        }
        self.blocks.push(block);
    }

    fn finish(mut self) -> RichText {
        self.flush();
        while let Some(name) = self.containers.last().map(|open| open.container.name.clone()) {
            self.close_container(&name);
        }
        RichText::from_blocks(self.blocks)
    }
}
