//! PDF text extraction.

use std::path::Path;

use super::DocumentParseError;

/// Page separator emitted by `pdf-extract` between page texts.
const PAGE_SEPARATOR: char = '\u{0c}';

/// Extract the full document text.
///
/// Pages are trimmed, blank ones dropped, and the remainder joined with
/// newlines.
pub fn extract_document_text(path: &Path) -> Result<String, DocumentParseError> {
    Ok(page_texts(path)?.join("\n"))
}

/// Text of the first non-blank page, if any.
pub(crate) fn first_page_text(path: &Path) -> Result<Option<String>, DocumentParseError> {
    Ok(page_texts(path)?.into_iter().next())
}

fn page_texts(path: &Path) -> Result<Vec<String>, DocumentParseError> {
    let text = pdf_extract::extract_text(path).map_err(|error| DocumentParseError::Unreadable {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    Ok(text
        .split(PAGE_SEPARATOR)
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .map(str::to_string)
        .collect())
}
