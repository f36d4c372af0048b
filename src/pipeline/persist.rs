//! Persistence: write the record set to `{title}.json`.
//!
//! The file is a JSON array, UTF-8 with non-ASCII characters unescaped,
//! indented by four spaces. It is written to a temp file in the destination
//! directory and then renamed over the target, so readers never see a
//! truncated file.

use super::blocking;
use crate::artifact::Stage;
use crate::error::PipelineError;
use crate::output::{BookDocumentSet, DocumentRecord};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Serialise `records` as a 4-space-indented JSON array.
pub fn to_json(records: &[DocumentRecord]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut ser)?;
    Ok(buf)
}

/// Write `set` to `{dir}/{title}.json` and return the path.
///
/// `dir` is created if absent. An existing file is replaced.
///
/// # Errors
/// * [`PipelineError::EmptyBatch`] if the set has no records.
/// * [`PipelineError::WriteError`] if the title is blank or the file
///   cannot be written.
pub async fn persist_documents(
    set: &BookDocumentSet,
    dir: &Path,
) -> Result<PathBuf, PipelineError> {
    if set.is_empty() {
        return Err(PipelineError::EmptyBatch {
            stage: Stage::Persist,
        });
    }

    if set.title.trim().is_empty() {
        return Err(PipelineError::write(
            Stage::Persist,
            dir,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "document set has a blank title; refusing to write a nameless JSON file",
            ),
        ));
    }

    let target = dir.join(format!("{}.json", set.title));
    let bytes = to_json(&set.records)
        .map_err(|e| PipelineError::Internal(format!("JSON serialisation failed: {e}")))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::write(Stage::Persist, dir, e))?;

    let dir_owned = dir.to_path_buf();
    let path = target.clone();
    blocking("JSON write", move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir_owned)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await?
    .map_err(|e| PipelineError::write(Stage::Persist, &target, e))?;

    info!("Wrote {} records to {}", set.len(), target.display());
    Ok(target)
}

/// Read a file written by [`persist_documents`] back into records.
///
/// # Errors
/// [`PipelineError::ReadError`] if the file is missing or not a JSON array
/// of records.
pub async fn load_documents(path: impl AsRef<Path>) -> Result<Vec<DocumentRecord>, PipelineError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::read(Stage::Persist, path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| PipelineError::read(Stage::Persist, path, e))
}
