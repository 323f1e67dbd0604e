//! Document segmentation.
//!
//! Turns an uploaded PDF into numbered, token-bounded chunks: [`pdf`]
//! extracts the text, [`sentences`] finds sentence boundaries, and
//! [`window`] packs the sentences into overlapping windows under the
//! configured token budget.

mod pdf;
mod sentences;
mod window;

use std::path::Path;

use thiserror::Error;

pub use pdf::extract_document_text;
pub(crate) use pdf::first_page_text;

/// Failure to turn an uploaded document into text.
#[derive(Debug, Error)]
pub enum DocumentParseError {
    /// The file could not be opened or decoded as a PDF.
    #[error("Failed to extract text from '{path}': {reason}")]
    Unreadable {
        /// Path of the offending file.
        path: String,
        /// Stringified extractor error.
        reason: String,
    },
    /// Extraction succeeded but produced no usable text.
    #[error("Document '{path}' contains no extractable text")]
    EmptyDocument {
        /// Path of the offending file.
        path: String,
    },
}

/// A numbered chunk ready for export.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 1-based ordinal, contiguous across the document.
    pub id: usize,
    /// Chunk text.
    pub text: String,
    /// Locator of the form `{folder}/{filename}#page={id}`.
    pub source: String,
}

/// Knobs controlling window assembly.
#[derive(Debug, Clone)]
pub struct SegmenterOptions {
    /// Token budget per chunk. Multi-sentence windows never exceed it; a
    /// single sentence over the budget becomes its own window.
    pub token_limit: usize,
    /// Trailing sentences re-seeded into the next window.
    pub overlap_sentences: usize,
    /// Optional tiktoken encoding name; `cl100k_base` when absent.
    pub encoding: Option<String>,
}

impl SegmenterOptions {
    /// Build options from the process configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            token_limit: config.chunk_token_limit,
            overlap_sentences: config.chunk_overlap_sentences,
            encoding: config.tokenizer_encoding.clone(),
        }
    }
}

/// Split raw text into overlapping, token-bounded windows.
///
/// Returns an empty vector when the text is all whitespace.
pub fn segment_text(text: &str, options: &SegmenterOptions) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let counter = window::build_token_counter(options.encoding.as_deref());
    let sentences = sentences::split_sentences(text);
    window::assemble_windows(
        &sentences,
        options.token_limit,
        options.overlap_sentences,
        &counter,
    )
}

/// Extract, segment, and number a document into chunks with source locators.
///
/// The `#page={id}` fragment carries the chunk ordinal: consumers treat it
/// as an opaque chunk id, not a physical page number.
pub fn segment_document(
    path: &Path,
    folder: &str,
    filename: &str,
    options: &SegmenterOptions,
) -> Result<Vec<Chunk>, DocumentParseError> {
    let text = pdf::extract_document_text(path)?;
    let windows = segment_text(&text, options);
    if windows.is_empty() {
        return Err(DocumentParseError::EmptyDocument {
            path: path.display().to_string(),
        });
    }
    Ok(number_chunks(windows, folder, filename))
}

fn number_chunks(windows: Vec<String>, folder: &str, filename: &str) -> Vec<Chunk> {
    windows
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let id = index + 1;
            Chunk {
                id,
                text,
                source: format!("{folder}/{filename}#page={id}"),
            }
        })
        .collect()
}
