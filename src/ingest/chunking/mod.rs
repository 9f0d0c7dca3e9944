
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ChunkingConfig, ConfigError};
use crate::ingest::loader::Page;

/// A bounded window of page text, the unit that gets embedded and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The window text, exactly as it appears in the page
    pub content: String,
    /// File name of the originating document
    pub source: String,
    /// Page number within the source, for paginated documents
    pub page: Option<u32>,
    /// Index of this chunk within its page
    pub chunk_index: usize,
}

impl Chunk {
    /// Human readable origin, e.g. `report.pdf (page 3)`.
    #[inline]
    pub fn source_label(&self) -> String {
        match self.page {
            Some(page) => format!("{} (page {})", self.source, page),
            None => self.source.clone(),
        }
    }
}

/// Split pages into overlapping windows of at most `chunk_size` characters.
///
/// Window ends prefer a paragraph break, then a sentence end, then any whitespace, and
/// only cut inside a word when none of those fall in range. Each window after the first
/// starts `chunk_overlap` characters before the previous one ended.
///
/// Windows holding nothing but whitespace are not emitted, so the chunks on either side
/// of a long blank run do not overlap each other. `chunk_index` stays contiguous over the
/// emitted chunks.
#[inline]
pub fn split(pages: &[Page], config: &ChunkingConfig) -> Result<Vec<Chunk>, ConfigError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for page in pages {
        if page.content.trim().is_empty() {
            continue;
        }

        let windows = split_text(&page.content, config.chunk_size, config.chunk_overlap);
        let (windows, blank): (Vec<String>, Vec<String>) = windows
            .into_iter()
            .partition(|window| !window.trim().is_empty());
        if !blank.is_empty() {
            debug!(
                "Skipped {} blank window(s) in {}",
                blank.len(),
                page.source
            );
        }
        chunks.extend(
            windows
                .into_iter()
                .enumerate()
                .map(|(chunk_index, content)| Chunk {
                    content,
                    source: page.source.clone(),
                    page: page.page,
                    chunk_index,
                }),
        );
    }

    debug!(
        "Split {} page(s) into {} chunk(s) (size {}, overlap {})",
        pages.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}

/// Sliding-window split of a single text. Requires `overlap < chunk_size`.
fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut windows = Vec::new();
    let mut start = 0;

    loop {
        if len - start <= chunk_size {
            windows.push(chars[start..].iter().collect());
            break;
        }

        let hard_end = start + chunk_size;
        // The end must leave the next start strictly after this one
        let min_end = start + overlap + 1;
        let end = find_break(&chars, min_end, hard_end).unwrap_or(hard_end);

        windows.push(chars[start..end].iter().collect());
        start = end - overlap;
    }

    windows
}

/// Latest window end in `min_end..=max_end`, trying each boundary kind from largest
/// semantic unit to smallest.
fn find_break(chars: &[char], min_end: usize, max_end: usize) -> Option<usize> {
    let boundaries: [fn(&[char], usize) -> bool; 3] =
        [is_paragraph_end, is_sentence_end, is_word_end];

    boundaries.iter().find_map(|is_boundary| {
        (min_end..=max_end)
            .rev()
            .find(|&end| is_boundary(chars, end))
    })
}

fn is_paragraph_end(chars: &[char], end: usize) -> bool {
    end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n'
}

fn is_sentence_end(chars: &[char], end: usize) -> bool {
    end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
}

fn is_word_end(chars: &[char], end: usize) -> bool {
    end >= 1 && chars[end - 1].is_whitespace()
}
