//! Minimal WordprocessingML packaging.
//!
//! Writes one paragraph per non-blank block and reads paragraphs back. Hard
//! breaks map to `<w:br/>`. Run formatting other than heading bold/size is
//! neither written nor read.

use crate::editor::markup::decode_entities;
use crate::editor::tree::{Block, BlockKind, Inline, RichText};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";
const EMPTY_DOCUMENT_TEXT: &str = "Empty Document";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").expect("valid paragraph regex"));
static STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<w:pStyle\s+w:val="(?:Heading|heading)\s?([1-6])""#).expect("valid style regex")
});
static RUN_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:(tab|br)(?:\s[^>]*)?/>")
        .expect("valid run regex")
});

/// Font size in half-points for a block kind.
fn run_size(kind: BlockKind) -> u32 {
    match kind {
        BlockKind::Heading(1) => 48,
        BlockKind::Heading(2) => 36,
        BlockKind::Heading(3) => 28,
        _ => 24,
    }
}

/// Packs `doc` into DOCX bytes.
pub fn write_docx(doc: &RichText) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer.start_file("[Content_Types].xml", options)?;
    writer.write_all(CONTENT_TYPES_XML.as_bytes())?;
    writer.start_file("_rels/.rels", options)?;
    writer.write_all(ROOT_RELS_XML.as_bytes())?;
    writer.start_file(DOCUMENT_PART, options)?;
    writer.write_all(document_xml(doc).as_bytes())?;

    Ok(writer.finish()?.into_inner())
}

fn document_xml(doc: &RichText) -> String {
    let mut body = String::new();
    for block in doc.blocks() {
        let text = block.text();
        if text.trim().is_empty() {
            continue;
        }
        body.push_str(&paragraph_xml(block.kind, &text));
    }
    if body.is_empty() {
        body.push_str(&paragraph_xml(BlockKind::Paragraph, EMPTY_DOCUMENT_TEXT));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    )
}

fn paragraph_xml(kind: BlockKind, text: &str) -> String {
    let (style, bold) = match kind {
        BlockKind::Heading(level) => (
            format!(r#"<w:pPr><w:pStyle w:val="Heading{level}"/></w:pPr>"#),
            "<w:b/>",
        ),
        _ => (String::new(), ""),
    };
    let text = text
        .split('\n')
        .map(xml_escape)
        .collect::<Vec<_>>()
        .join(r#"</w:t><w:br/><w:t xml:space="preserve">"#);
    format!(
        r#"<w:p>{style}<w:r><w:rPr>{bold}<w:sz w:val="{size}"/></w:rPr><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#,
        size = run_size(kind),
    )
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reads the paragraphs of a DOCX package into a tree. Empty paragraphs are
/// skipped.
pub fn read_docx(bytes: &[u8]) -> Result<RichText, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|err| format!("not a DOCX package: {err}"))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| format!("missing {DOCUMENT_PART}: {err}"))?
        .read_to_string(&mut xml)
        .map_err(|err| format!("unreadable {DOCUMENT_PART}: {err}"))?;

    let blocks = PARAGRAPH_RE
        .captures_iter(&xml)
        .filter_map(|caps| {
            let inner = caps.get(1)?.as_str();
            let kind = STYLE_RE
                .captures(inner)
                .and_then(|style| style[1].parse().ok())
                .map_or(BlockKind::Paragraph, BlockKind::Heading);
            let block = paragraph_block(kind, inner);
            (!block.is_empty()).then_some(block)
        })
        .collect();
    Ok(RichText::from_blocks(blocks))
}

fn paragraph_block(kind: BlockKind, inner: &str) -> Block {
    let mut block = Block::new(kind);
    for caps in RUN_TEXT_RE.captures_iter(inner) {
        match (caps.get(1), caps.get(2).map(|m| m.as_str())) {
            (Some(text), _) => block.push_text(&decode_entities(text.as_str())),
            (None, Some("br")) => block.push(Inline::HardBreak, &[]),
            _ => block.push_text("\t"),
        }
    }
    block
}
