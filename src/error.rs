//! Error types for the edgequake-pdf2index library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot proceed (unreadable input,
//!   unwritable output directory, a page that fails while the pipeline is in
//!   fail-fast mode). Returned as `Err(PipelineError)` from
//!   [`crate::runner::Pipeline::run`] and from every stage function.
//!
//! * [`ItemFailure`] — **Non-fatal**: a single artifact failed while the
//!   pipeline runs with [`crate::config::FailureMode::ContinueOnError`].
//!   Collected into [`crate::output::PipelineOutput::failures`] so callers
//!   get a per-item report instead of silent data loss.
//!
//! Every fatal variant that concerns a file names the stage and the path of
//! the offending artifact, so a CLI user can tell which page broke the run.

use crate::artifact::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2index library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Stage errors ──────────────────────────────────────────────────────
    /// Input or intermediate artifact is missing, unreadable, or not in the
    /// expected format.
    #[error("[{stage}] cannot read '{path}': {detail}")]
    ReadError {
        stage: Stage,
        path: PathBuf,
        detail: String,
    },

    /// A directory or artifact could not be created or written.
    #[error("[{stage}] cannot write '{path}': {source}")]
    WriteError {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PDF renderer could not decode a page file.
    #[error("[rasterize] conversion failed for '{path}': {detail}")]
    ConversionError { path: PathBuf, detail: String },

    /// The OCR engine could not process an image.
    #[error("[recognize] OCR ({language}) failed for '{path}': {detail}")]
    RecognitionError {
        path: PathBuf,
        language: String,
        detail: String,
    },

    /// The search service rejected a document submission.
    #[error("[index] index '{index}' rejected document {position} from '{path}': {detail}")]
    IndexError {
        index: String,
        /// 0-based position of the record in the batch.
        position: usize,
        /// The record's source image, or the JSON file when re-indexing.
        path: PathBuf,
        detail: String,
    },

    /// The refresh after a batch of submissions failed.
    #[error("[index] refresh of '{index}' failed: {detail}")]
    IndexRefreshError { index: String, detail: String },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// A stage received no items where at least one is required
    /// (e.g. a zero-page PDF reaching the assembler).
    #[error("[{stage}] received an empty batch; nothing to process")]
    EmptyBatch { stage: Stage },

    /// In continue-on-error mode every item of a stage failed.
    #[error("[{stage}] all {total} items failed.\nFirst error: {first_error}")]
    AllItemsFailed {
        stage: Stage,
        total: usize,
        first_error: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, then either:\n\
  • place it in the system library path, or\n\
  • set PDFIUM_LIB_PATH=/dir/containing/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a failure, shared by fatal and non-fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Read,
    Write,
    Conversion,
    Recognition,
    Index,
    Batch,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Read => "read",
            ErrorKind::Write => "write",
            ErrorKind::Conversion => "conversion",
            ErrorKind::Recognition => "recognition",
            ErrorKind::Index => "index",
            ErrorKind::Batch => "batch",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl PipelineError {
    pub(crate) fn read(stage: Stage, path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        PipelineError::ReadError {
            stage,
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn write(stage: Stage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::WriteError {
            stage,
            path: path.into(),
            source,
        }
    }

    /// The stage the error originated in, if it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::ReadError { stage, .. }
            | PipelineError::WriteError { stage, .. }
            | PipelineError::EmptyBatch { stage }
            | PipelineError::AllItemsFailed { stage, .. } => Some(*stage),
            PipelineError::ConversionError { .. } => Some(Stage::Rasterize),
            PipelineError::RecognitionError { .. } => Some(Stage::Recognize),
            PipelineError::IndexError { .. } | PipelineError::IndexRefreshError { .. } => {
                Some(Stage::Index)
            }
            PipelineError::InvalidConfig(_)
            | PipelineError::PdfiumBindingFailed(_)
            | PipelineError::Internal(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ReadError { .. } => ErrorKind::Read,
            PipelineError::WriteError { .. } => ErrorKind::Write,
            PipelineError::ConversionError { .. } => ErrorKind::Conversion,
            PipelineError::RecognitionError { .. } => ErrorKind::Recognition,
            PipelineError::IndexError { .. } | PipelineError::IndexRefreshError { .. } => {
                ErrorKind::Index
            }
            PipelineError::EmptyBatch { .. } | PipelineError::AllItemsFailed { .. } => {
                ErrorKind::Batch
            }
            PipelineError::InvalidConfig(_) => ErrorKind::Config,
            PipelineError::PdfiumBindingFailed(_) | PipelineError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Path of the artifact that caused the failure, when there is one.
    pub fn artifact_path(&self) -> Option<&Path> {
        match self {
            PipelineError::ReadError { path, .. }
            | PipelineError::WriteError { path, .. }
            | PipelineError::ConversionError { path, .. }
            | PipelineError::RecognitionError { path, .. }
            | PipelineError::IndexError { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// A non-fatal error for a single artifact.
///
/// Produced only in continue-on-error mode; the item is dropped from the
/// stage's output and every later stage proceeds without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub stage: Stage,
    /// The input artifact the stage was working on when it failed.
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemFailure {
    pub(crate) fn from_error(stage: Stage, input: &Path, err: &PipelineError) -> Self {
        Self {
            stage: err.stage().unwrap_or(stage),
            path: err
                .artifact_path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| input.to_path_buf()),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} error on '{}': {}",
            self.stage,
            self.kind,
            self.path.display(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_stage_and_path() {
        let e = PipelineError::read(Stage::Split, "/in/story.pdf", "not a PDF");
        let msg = e.to_string();
        assert!(msg.contains("[split]"), "got: {msg}");
        assert!(msg.contains("/in/story.pdf"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::Read);
        assert_eq!(e.artifact_path(), Some(Path::new("/in/story.pdf")));
    }

    #[test]
    fn stage_is_implied_for_stage_specific_variants() {
        let e = PipelineError::RecognitionError {
            path: "/out/a.png".into(),
            language: "tam".into(),
            detail: "bad image".into(),
        };
        assert_eq!(e.stage(), Some(Stage::Recognize));
        assert!(e.to_string().contains("tam"));

        let e = PipelineError::IndexError {
            index: "books".into(),
            position: 2,
            path: "/out/story/extracted_images/story_page_3.png".into(),
            detail: "mapping conflict".into(),
        };
        assert_eq!(e.stage(), Some(Stage::Index));
        assert_eq!(
            e.artifact_path(),
            Some(Path::new("/out/story/extracted_images/story_page_3.png"))
        );
        let msg = e.to_string();
        assert!(
            msg.contains("document 2 from '/out/story/extracted_images/story_page_3.png'"),
            "got: {msg}"
        );
    }

    #[test]
    fn refresh_failure_has_its_own_message() {
        let e = PipelineError::IndexRefreshError {
            index: "books".into(),
            detail: "503 Service Unavailable".into(),
        };
        assert_eq!(
            e.to_string(),
            "[index] refresh of 'books' failed: 503 Service Unavailable"
        );
        assert_eq!(e.kind(), ErrorKind::Index);
        assert_eq!(e.stage(), Some(Stage::Index));
        assert_eq!(e.artifact_path(), None);
    }

    #[test]
    fn all_items_failed_display() {
        let e = PipelineError::AllItemsFailed {
            stage: Stage::Rasterize,
            total: 4,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("all 4 items"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn item_failure_prefers_error_path() {
        let err = PipelineError::ConversionError {
            path: "/out/p1.pdf".into(),
            detail: "corrupt".into(),
        };
        let f = ItemFailure::from_error(Stage::Rasterize, Path::new("/elsewhere"), &err);
        assert_eq!(f.path, PathBuf::from("/out/p1.pdf"));
        assert_eq!(f.kind, ErrorKind::Conversion);

        let err = PipelineError::Internal("task panicked".into());
        let f = ItemFailure::from_error(Stage::Recognize, Path::new("/out/p2.png"), &err);
        assert_eq!(f.stage, Stage::Recognize);
        assert_eq!(f.path, PathBuf::from("/out/p2.png"));
    }

    #[test]
    fn config_errors_have_no_stage() {
        let e = PipelineError::InvalidConfig("x".into());
        assert_eq!(e.stage(), None);
        assert_eq!(e.kind(), ErrorKind::Config);
    }
}
