//! Result types: document records, index reports and run statistics.

use crate::artifact::{Artifact, Stage};
use crate::error::ItemFailure;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One page of a book, ready for indexing.
///
/// Field names match the persisted JSON and the indexed document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub title: String,
    pub author: String,
    pub publication_date: String,
    pub isbn: String,
    pub language: String,
    pub genre: Vec<String>,
    /// Recognised text of this page, verbatim OCR output.
    pub content: String,
    /// The rasterised page image the content was recognised from.
    #[serde(rename = "content_as_image")]
    pub content_source_image_path: PathBuf,
}

/// Ordered records of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDocumentSet {
    /// Title of the first record; names the persisted JSON file.
    pub title: String,
    pub records: Vec<DocumentRecord>,
}

impl BookDocumentSet {
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        let title = records
            .first()
            .map(|r| r.title.clone())
            .unwrap_or_default();
        Self { title, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentRecord> {
        self.records.iter()
    }
}

/// Result of submitting one document to the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStatus {
    /// Accepted; `id` is the identifier the service assigned.
    Indexed { id: String },
    /// Rejected or unreachable.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    /// 0-based position of the document in the submitted batch.
    pub position: usize,
    /// The record's source image, or the JSON file when re-indexing.
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: IndexStatus,
}

/// Per-document bookkeeping for one indexing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub index: String,
    pub outcomes: Vec<IndexOutcome>,
    /// Whether the final refresh call succeeded.
    pub refreshed: bool,
}

impl IndexReport {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            outcomes: Vec::new(),
            refreshed: false,
        }
    }

    pub fn submitted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, IndexStatus::Indexed { .. }))
            .count()
    }

    /// Outcomes that did not make it into the index.
    pub fn failures(&self) -> impl Iterator<Item = &IndexOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, IndexStatus::Failed { .. }))
    }

    /// `true` when every document was accepted and the refresh succeeded.
    pub fn is_complete(&self) -> bool {
        self.refreshed && self.succeeded() == self.submitted()
    }
}

/// Timing and counts for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub produced: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Aggregate statistics for a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub pages: usize,
    pub images: usize,
    pub texts: usize,
    pub records: usize,
    /// Documents accepted by the search index (0 when indexing is off).
    pub indexed: usize,
    pub failed_items: usize,
    pub stages: Vec<StageTiming>,
    pub total_duration_ms: u64,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub book_id: String,
    pub pages: Vec<Artifact>,
    pub images: Vec<Artifact>,
    pub texts: Vec<Artifact>,
    pub documents: BookDocumentSet,
    pub json_path: PathBuf,
    /// `None` when no search index was attached.
    pub index_report: Option<IndexReport>,
    /// Items dropped in continue-on-error mode, across all stages.
    pub failures: Vec<ItemFailure>,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    /// `true` when no item was dropped and indexing (if enabled) was complete.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self
                .index_report
                .as_ref()
                .map(IndexReport::is_complete)
                .unwrap_or(true)
    }
}
