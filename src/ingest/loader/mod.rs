
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::{DocQueryError, Result};

/// How a file is turned into pages, resolved once from its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// One page per physical PDF page
    Pdf,
    /// Markdown or plain text, loaded as a single page
    Text,
    Unsupported(String),
}

impl DocumentSource {
    #[inline]
    pub fn from_extension(extension: &str) -> Self {
        let normalized = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "pdf" => Self::Pdf,
            "md" | "txt" => Self::Text,
            _ => Self::Unsupported(normalized),
        }
    }

    #[inline]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

/// A segment of loaded text together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub content: String,
    /// File name of the originating document
    pub source: String,
    /// 1-based page number for paginated sources
    pub page: Option<u32>,
}

/// Load a file into pages according to its declared extension.
///
/// Unsupported extensions yield [`DocQueryError::UnsupportedFileType`] so the caller
/// decides whether to skip the file or fail.
#[inline]
pub fn load(path: &Path, extension: &str) -> Result<Vec<Page>> {
    let source_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let pages = match DocumentSource::from_extension(extension) {
        DocumentSource::Pdf => load_pdf(path, &source_name)?,
        DocumentSource::Text => load_text(path, &source_name)?,
        DocumentSource::Unsupported(ext) => {
            warn!("Unsupported file type '{}' for file {}", ext, source_name);
            return Err(DocQueryError::UnsupportedFileType(source_name));
        }
    };

    debug!("Loaded {} page(s) from {}", pages.len(), source_name);
    Ok(pages)
}

fn load_pdf(path: &Path, source_name: &str) -> Result<Vec<Page>> {
    let document = lopdf::Document::load(path).map_err(|e| DocQueryError::Load {
        file: source_name.to_string(),
        message: format!("Failed to parse PDF: {}", e),
    })?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        let content = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                // Image-only or oddly encoded pages still count as pages
                debug!(
                    "No extractable text on page {} of {}: {}",
                    page_number, source_name, e
                );
                String::new()
            }
        };
        pages.push(Page {
            content,
            source: source_name.to_string(),
            page: Some(page_number),
        });
    }

    if pages.is_empty() {
        return Err(DocQueryError::Load {
            file: source_name.to_string(),
            message: "PDF has no pages".to_string(),
        });
    }

    Ok(pages)
}

fn load_text(path: &Path, source_name: &str) -> Result<Vec<Page>> {
    let content = fs::read_to_string(path).map_err(|e| DocQueryError::Load {
        file: source_name.to_string(),
        message: e.to_string(),
    })?;

    Ok(vec![Page {
        content,
        source: source_name.to_string(),
        page: None,
    }])
}
