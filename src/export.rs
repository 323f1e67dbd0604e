//! Durable chunk tables.
//!
//! Chunks are exported as a small CSV file next to the uploaded document.
//! The file doubles as the enrichment payload (its raw text is POSTed to
//! the endpoint), so the format stays deliberately plain: a fixed header
//! and RFC-4180-style quoting.

use std::borrow::Cow;
use std::path::Path;

use thiserror::Error;

use crate::segment::Chunk;

/// Header row of every chunk table.
pub const CHUNK_TABLE_HEADER: &str = "chunk_id,text,source";

/// Errors raised while writing or reading a chunk table.
#[derive(Debug, Error)]
pub enum ChunkExportError {
    /// Filesystem failure while touching the table.
    #[error("Chunk table I/O failed at '{path}': {source}")]
    Io {
        /// Path of the table.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Table contents did not parse back into chunk rows.
    #[error("Chunk table '{path}' is malformed: {reason}")]
    Malformed {
        /// Path of the table.
        path: String,
        /// What went wrong, with a record number where known.
        reason: String,
    },
}

/// Write `chunks` to `path`, returning the number of rows written.
///
/// Column order matches [`CHUNK_TABLE_HEADER`]; fields containing commas,
/// quotes, or line breaks are quoted.
pub async fn write_chunk_table(path: &Path, chunks: &[Chunk]) -> Result<usize, ChunkExportError> {
    let mut table = String::new();
    table.push_str(CHUNK_TABLE_HEADER);
    table.push('\n');
    for chunk in chunks {
        table.push_str(&chunk.id.to_string());
        table.push(',');
        table.push_str(&escape_field(&chunk.text));
        table.push(',');
        table.push_str(&escape_field(&chunk.source));
        table.push('\n');
    }
    tokio::fs::write(path, table)
        .await
        .map_err(|source| ChunkExportError::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(chunks.len())
}

/// Read a chunk table back into ordered chunks.
///
/// The reader understands exactly what [`write_chunk_table`] produces:
/// quoted fields may span lines and the header row is required.
pub async fn read_chunk_table(path: &Path) -> Result<Vec<Chunk>, ChunkExportError> {
    let contents = read_table_text(path).await?;
    parse_table(&contents).map_err(|reason| ChunkExportError::Malformed {
        path: path.display().to_string(),
        reason,
    })
}

/// Raw text of an exported chunk table.
///
/// The enrichment request forwards the table verbatim as supporting data.
pub async fn read_table_text(path: &Path) -> Result<String, ChunkExportError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ChunkExportError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(['"', ',', '\n', '\r']) {
        let mut quoted = String::with_capacity(field.len() + 2);
        quoted.push('"');
        for ch in field.chars() {
            if ch == '"' {
                quoted.push('"');
            }
            quoted.push(ch);
        }
        quoted.push('"');
        Cow::Owned(quoted)
    } else {
        Cow::Borrowed(field)
    }
}

fn parse_table(contents: &str) -> Result<Vec<Chunk>, String> {
    let records = parse_records(contents)?;
    let mut rows = records.into_iter();
    let header = rows.next().ok_or_else(|| "missing header row".to_string())?;
    if header.join(",") != CHUNK_TABLE_HEADER {
        return Err(format!("unexpected header '{}'", header.join(",")));
    }

    let mut chunks = Vec::new();
    for (index, record) in rows.enumerate() {
        let record_number = index + 1;
        match <[String; 3]>::try_from(record) {
            Ok([id, text, source]) => {
                let id = id.parse().map_err(|_| {
                    format!("record {record_number} has a non-numeric chunk_id '{id}'")
                })?;
                chunks.push(Chunk { id, text, source });
            }
            Err(record) => {
                return Err(format!(
                    "record {record_number} has {} fields, expected 3",
                    record.len()
                ));
            }
        }
    }
    Ok(chunks)
}

fn parse_records(contents: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = contents.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() => in_quotes = true,
            '"' => {
                return Err(format!(
                    "record {}: quote inside unquoted field",
                    records.len() + 1
                ));
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: usize, text: &str) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            source: format!("folder/book.pdf#page={id}"),
        }
    }

    #[tokio::test]
    async fn round_trips_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        let chunks = vec![
            chunk(1, "plain text"),
            chunk(2, "has, a comma"),
            chunk(3, "line\nbreak and \"quotes\""),
        ];

        let written = write_chunk_table(&path, &chunks).await.unwrap();
        assert_eq!(written, 3);

        let read_back = read_chunk_table(&path).await.unwrap();
        assert_eq!(read_back, chunks);
    }

    #[tokio::test]
    async fn writes_the_expected_header_and_plain_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        write_chunk_table(&path, &[chunk(1, "alpha")]).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(CHUNK_TABLE_HEADER));
        assert_eq!(lines.next(), Some("1,alpha,folder/book.pdf#page=1"));
    }

    #[tokio::test]
    async fn empty_chunk_list_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        let written = write_chunk_table(&path, &[]).await.unwrap();
        assert_eq!(written, 0);

        let read_back = read_chunk_table(&path).await.unwrap();
        assert!(read_back.is_empty());
    }

    #[tokio::test]
    async fn rejects_tables_with_a_foreign_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        tokio::fs::write(&path, "a,b\n1,2\n").await.unwrap();

        let error = read_chunk_table(&path).await.unwrap_err();
        assert!(matches!(error, ChunkExportError::Malformed { .. }));
    }

    #[tokio::test]
    async fn rejects_rows_with_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        tokio::fs::write(&path, "chunk_id,text,source\n1,only-two\n")
            .await
            .unwrap();

        let error = read_chunk_table(&path).await.unwrap_err();
        assert!(matches!(error, ChunkExportError::Malformed { .. }));
    }

    #[tokio::test]
    async fn missing_table_reports_io_error() {
        let error = read_chunk_table(Path::new("/nonexistent/chunks.csv"))
            .await
            .unwrap_err();
        assert!(matches!(error, ChunkExportError::Io { .. }));
    }
}
