//! Upload-root layout and raw file storage.
//!
//! Every upload gets its own folder under the configured root, named after
//! a sanitized form of the original filename plus a second-resolution UTC
//! timestamp. The folder later receives the chunk table, the structured
//! result, the preview excerpt, and the catalog record.

use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::segment;

/// Preview reference recorded when no text excerpt could be produced.
pub const PLACEHOLDER_PREVIEW: &str = "https://via.placeholder.com/150";

/// File name of the first-page excerpt inside a document folder.
pub const PREVIEW_FILE_NAME: &str = "preview.txt";

/// Upload extensions accepted by the pipeline.
const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

const PREVIEW_EXCERPT_CHARS: usize = 400;

/// True when the filename carries an accepted extension.
pub fn extension_allowed(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Derive the folder base from the original filename.
///
/// Takes the first whitespace-separated word of the file stem and keeps
/// only filesystem-safe characters; falls back to `book` when nothing
/// survives.
pub fn normalize_base_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let first_word = stem.split_whitespace().next().unwrap_or_default();
    let cleaned: String = first_word.chars().map(keep_safe).collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "book".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitize the original filename for storage.
///
/// Drops any path components, replaces characters outside `[A-Za-z0-9._-]`,
/// and strips leading dots so the stored file is never hidden.
pub fn sanitize_file_name(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let cleaned: String = name.chars().map(keep_safe).collect();
    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        "upload.bin".to_string()
    } else {
        trimmed.to_string()
    }
}

fn keep_safe(ch: char) -> char {
    if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
        ch
    } else {
        '_'
    }
}

/// Filesystem layout for uploaded documents.
#[derive(Clone, Debug)]
pub struct DocumentStorage {
    root: PathBuf,
}

impl DocumentStorage {
    /// Create a handle rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Upload root this storage writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure the upload root exists.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Create the folder for a new document and return its name and path.
    ///
    /// The name combines the sanitized base with a UTC timestamp at second
    /// resolution, e.g. `moby_20250826_143015`.
    pub async fn create_document_folder(&self, base: &str) -> std::io::Result<(String, PathBuf)> {
        let folder_name = format!("{base}_{}", folder_timestamp(OffsetDateTime::now_utc()));
        let folder_path = self.root.join(&folder_name);
        tokio::fs::create_dir_all(&folder_path).await?;
        Ok((folder_name, folder_path))
    }

    /// Persist the raw upload bytes inside `folder`.
    pub async fn save_raw_file(
        &self,
        folder: &Path,
        filename: &str,
        data: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = folder.join(filename);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Write a first-page text excerpt next to the document, best effort.
    ///
    /// Returns the preview reference stored in the catalog record: the
    /// relative `{folder}/preview.txt` path on success, the placeholder URL
    /// when extraction or the write fails.
    pub async fn write_preview(
        &self,
        folder_name: &str,
        folder_path: &Path,
        document_path: &Path,
    ) -> String {
        let excerpt = match segment::first_page_text(document_path) {
            Ok(Some(text)) => excerpt_of(&text),
            Ok(None) => {
                tracing::warn!(
                    document = %document_path.display(),
                    "No first-page text; using placeholder preview"
                );
                return PLACEHOLDER_PREVIEW.to_string();
            }
            Err(error) => {
                tracing::warn!(error = %error, "Preview extraction failed; using placeholder");
                return PLACEHOLDER_PREVIEW.to_string();
            }
        };
        let preview_path = folder_path.join(PREVIEW_FILE_NAME);
        match tokio::fs::write(&preview_path, excerpt).await {
            Ok(()) => format!("{folder_name}/{PREVIEW_FILE_NAME}"),
            Err(error) => {
                tracing::warn!(error = %error, "Preview write failed; using placeholder");
                PLACEHOLDER_PREVIEW.to_string()
            }
        }
    }
}

fn excerpt_of(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_EXCERPT_CHARS) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

fn folder_timestamp(now: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
