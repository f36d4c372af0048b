//! Input validation: make sure the source PDF is usable before any stage
//! writes to disk.
//!
//! pdfium reports unreadable files with opaque errors, so existence,
//! permission and the `%PDF` magic bytes are checked here first. The book
//! id that names every artifact is derived at the same time.

use crate::artifact::{book_id_from_path, Stage};
use crate::error::PipelineError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source PDF that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePdf {
    pub path: PathBuf,
    /// File name up to its first `.`.
    pub book_id: String,
}

/// Validate a local PDF path and derive its book id.
///
/// # Errors
/// [`PipelineError::ReadError`] (stage `split`) when the file is missing,
/// unreadable, not a regular file, not a PDF, or has no usable name.
pub fn resolve_source(path: impl AsRef<Path>) -> Result<SourcePdf, PipelineError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(PipelineError::read(Stage::Split, path, "file not found"));
    }
    if path.is_dir() {
        return Err(PipelineError::read(Stage::Split, path, "is a directory"));
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                Ok(()) => {
                    return Err(PipelineError::read(
                        Stage::Split,
                        path,
                        format!("not a PDF (starts with {:?})", String::from_utf8_lossy(&magic)),
                    ))
                }
                Err(_) => {
                    return Err(PipelineError::read(
                        Stage::Split,
                        path,
                        "not a PDF (file is shorter than the PDF header)",
                    ))
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::read(Stage::Split, path, "permission denied"));
        }
        Err(e) => return Err(PipelineError::read(Stage::Split, path, e)),
    }

    let book_id = book_id_from_path(&path).ok_or_else(|| {
        PipelineError::read(Stage::Split, &path, "cannot derive a book name from the file name")
    })?;

    debug!("Resolved source PDF: {} (book '{}')", path.display(), book_id);
    Ok(SourcePdf { path, book_id })
}
