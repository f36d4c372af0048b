//! Indexing: submit each record to the search service, then refresh once.
//!
//! Records are submitted one round trip at a time with no explicit id, in
//! record order, and every submission gets an [`IndexOutcome`] in the
//! returned [`IndexReport`]. A single refresh after the batch makes all
//! accepted documents searchable immediately.
//!
//! In [`FailureMode::FailFast`] the first rejected submission is returned as
//! [`PipelineError::IndexError`] and a failed refresh as
//! [`PipelineError::IndexRefreshError`]. In
//! [`FailureMode::ContinueOnError`] the remaining records are still
//! submitted, the refresh still runs, and the report lists what failed.

use crate::artifact::Stage;
use crate::config::{validate_index_name, FailureMode};
use crate::error::PipelineError;
use crate::output::{DocumentRecord, IndexOutcome, IndexReport, IndexStatus};
use crate::progress::ProgressCallback;
use crate::search::SearchIndex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Index `records` into `index`.
pub async fn index_documents(
    records: &[DocumentRecord],
    index: &str,
    search: &dyn SearchIndex,
    failure_mode: FailureMode,
) -> Result<IndexReport, PipelineError> {
    index_with_progress(records, index, search, failure_mode, None).await
}

pub(crate) async fn index_with_progress(
    records: &[DocumentRecord],
    index: &str,
    search: &dyn SearchIndex,
    failure_mode: FailureMode,
    progress: Option<&ProgressCallback>,
) -> Result<IndexReport, PipelineError> {
    let documents = records
        .iter()
        .map(|r| {
            serde_json::to_value(r)
                .map(|v| (v, r.content_source_image_path.clone()))
                .map_err(|e| PipelineError::Internal(format!("record serialisation failed: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    submit_all(documents, index, search, failure_mode, progress).await
}

/// Re-index a JSON file of documents, such as one written by
/// [`crate::pipeline::persist::persist_documents`].
///
/// The file must hold a JSON array of objects. An `_id` field on any object
/// is removed before submission so the service assigns fresh ids.
///
/// # Errors
/// * [`PipelineError::ReadError`] if the file is missing, not JSON, or not
///   an array.
/// * [`PipelineError::InvalidConfig`] for an unusable index name.
/// * [`PipelineError::IndexError`] or [`PipelineError::IndexRefreshError`]
///   as for [`index_documents`]; a rejected document is reported against
///   the JSON file.
pub async fn reindex_json_file(
    path: impl AsRef<Path>,
    index: &str,
    search: &dyn SearchIndex,
    failure_mode: FailureMode,
) -> Result<IndexReport, PipelineError> {
    let path = path.as_ref();
    validate_index_name(index)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::read(Stage::Index, path, e))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::read(Stage::Index, path, e))?;
    let Value::Array(items) = value else {
        return Err(PipelineError::read(
            Stage::Index,
            path,
            "expected a JSON array of documents",
        ));
    };

    let documents = items
        .into_iter()
        .map(|mut doc| {
            if let Value::Object(ref mut map) = doc {
                map.remove("_id");
            }
            (doc, path.to_path_buf())
        })
        .collect();

    info!("Re-indexing {} into '{}'", path.display(), index);
    submit_all(documents, index, search, failure_mode, None).await
}

async fn submit_all(
    documents: Vec<(Value, PathBuf)>,
    index: &str,
    search: &dyn SearchIndex,
    failure_mode: FailureMode,
    progress: Option<&ProgressCallback>,
) -> Result<IndexReport, PipelineError> {
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::Index, documents.len());
    }

    let mut report = IndexReport::new(index);
    for (position, (document, origin)) in documents.iter().enumerate() {
        match search.index_document(index, document).await {
            Ok(id) => {
                if let Some(cb) = progress {
                    cb.on_item_complete(Stage::Index, origin);
                }
                report.outcomes.push(IndexOutcome {
                    position,
                    path: origin.clone(),
                    status: IndexStatus::Indexed { id },
                });
            }
            Err(detail) => {
                if let Some(cb) = progress {
                    cb.on_item_error(Stage::Index, origin, &detail);
                }
                if failure_mode == FailureMode::FailFast {
                    return Err(PipelineError::IndexError {
                        index: index.to_string(),
                        position,
                        path: origin.clone(),
                        detail,
                    });
                }
                warn!(
                    "Document {} ({}) rejected by '{}': {}",
                    position,
                    origin.display(),
                    index,
                    detail
                );
                report.outcomes.push(IndexOutcome {
                    position,
                    path: origin.clone(),
                    status: IndexStatus::Failed { reason: detail },
                });
            }
        }
    }

    match search.refresh(index).await {
        Ok(()) => report.refreshed = true,
        Err(detail) if failure_mode == FailureMode::FailFast => {
            return Err(PipelineError::IndexRefreshError {
                index: index.to_string(),
                detail,
            });
        }
        Err(detail) => warn!("Refresh of '{}' failed: {}", index, detail),
    }

    if report.submitted() > 0 && report.succeeded() == 0 {
        let first_error = report
            .failures()
            .find_map(|o| match o.status {
                IndexStatus::Failed { ref reason } => Some(reason.clone()),
                IndexStatus::Indexed { .. } => None,
            })
            .unwrap_or_default();
        return Err(PipelineError::AllItemsFailed {
            stage: Stage::Index,
            total: report.submitted(),
            first_error,
        });
    }

    if let Some(cb) = progress {
        cb.on_stage_complete(
            Stage::Index,
            report.succeeded(),
            report.submitted() - report.succeeded(),
        );
    }
    info!(
        "Indexed {}/{} documents into '{}' (refreshed: {})",
        report.succeeded(),
        report.submitted(),
        index,
        report.refreshed
    );
    Ok(report)
}
