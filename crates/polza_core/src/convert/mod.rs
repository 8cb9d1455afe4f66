//! File import and export.
//!
//! # Responsibility
//! - Turn `.txt` and `.docx` files into stored markup plus a title.
//! - Turn stored markup into plain text or DOCX bytes.
//!
//! # Invariants
//! - Import titles are the file name without its last extension.
//! - Exports never fail on document content, only on I/O or packaging.

mod docx;

use crate::editor::markup;
use crate::editor::tree::RichText;
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DOCX_EXPORT_FILE_NAME: &str = "Polza_Document.docx";
pub const TEXT_EXPORT_FILE_NAME: &str = "Polza_Document.txt";

static EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[^/.]+$").expect("valid extension regex"));

#[derive(Debug)]
pub enum ImportError {
    UnsupportedFormat(String),
    Io(std::io::Error),
    InvalidText(std::string::FromUtf8Error),
    InvalidDocx(String),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat(name) => write!(
                f,
                "unsupported file format `{name}`; expected .txt or .docx"
            ),
            Self::Io(err) => write!(f, "failed to read file: {err}"),
            Self::InvalidText(err) => write!(f, "text file is not valid UTF-8: {err}"),
            Self::InvalidDocx(message) => write!(f, "failed to read document: {message}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::InvalidText(err) => Some(err),
            Self::UnsupportedFormat(_) | Self::InvalidDocx(_) => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Package(zip::result::ZipError),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to write export: {err}"),
            Self::Package(err) => write!(f, "failed to build document package: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Package(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Package(value)
    }
}

/// Title and markup produced by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedDocument {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Text,
    Docx,
}

fn source_format(file_name: &str) -> Option<SourceFormat> {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".txt") {
        Some(SourceFormat::Text)
    } else if lower.ends_with(".docx") {
        Some(SourceFormat::Docx)
    } else {
        None
    }
}

/// Strips the last extension: `notes.v2.txt` becomes `notes.v2`.
pub fn title_from_file_name(file_name: &str) -> String {
    EXTENSION_RE.replace(file_name, "").into_owned()
}

/// One `<p>` per line, text escaped. A trailing `\r` on a line is dropped.
pub fn text_to_markup(text: &str) -> String {
    markup::serialize(&RichText::from_plain_text(text))
}

/// Imports the file at `path`.
pub fn import_file(path: &Path) -> Result<ImportedDocument, ImportError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if source_format(&file_name).is_none() {
        return Err(ImportError::UnsupportedFormat(file_name));
    }
    let bytes = std::fs::read(path)?;
    import_bytes(&file_name, bytes)
}

/// Imports in-memory file contents named `file_name`.
pub fn import_bytes(file_name: &str, bytes: Vec<u8>) -> Result<ImportedDocument, ImportError> {
    let result = match source_format(file_name) {
        Some(SourceFormat::Text) => String::from_utf8(bytes)
            .map_err(ImportError::InvalidText)
            .map(|text| text_to_markup(&text)),
        Some(SourceFormat::Docx) => docx::read_docx(&bytes)
            .map_err(ImportError::InvalidDocx)
            .map(|doc| markup::serialize(&doc)),
        None => Err(ImportError::UnsupportedFormat(file_name.to_string())),
    };

    match result {
        Ok(content) => {
            info!(
                "event=import module=convert status=ok bytes={}",
                content.len()
            );
            Ok(ImportedDocument {
                title: title_from_file_name(file_name),
                content,
            })
        }
        Err(err) => {
            error!("event=import module=convert status=error error={err}");
            Err(err)
        }
    }
}

/// Block texts joined by `\n`.
pub fn export_plain_text(content: &str) -> String {
    markup::parse(content).plain_text()
}

/// DOCX package bytes for `content`.
pub fn export_docx(content: &str) -> Result<Vec<u8>, ExportError> {
    Ok(docx::write_docx(&markup::parse(content))?)
}

/// Writes the export for `content` to `path`, choosing the format from the
/// extension (`.docx`, anything else is plain text).
pub fn export_to_path(content: &str, path: &Path) -> Result<(), ExportError> {
    let is_docx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
    let bytes = if is_docx {
        export_docx(content)?
    } else {
        export_plain_text(content).into_bytes()
    };
    std::fs::write(path, &bytes)?;
    info!(
        "event=export module=convert status=ok format={} bytes={}",
        if is_docx { "docx" } else { "text" },
        bytes.len()
    );
    Ok(())
}
