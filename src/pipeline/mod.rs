//! Pipeline stages for PDF → OCR → search-index processing.
//!
//! Each submodule implements exactly one transformation step over explicit
//! typed inputs. Stages hand each other ordered `Vec<Artifact>` lists, and
//! every artifact carries its page index, so the join between stages is
//! structural rather than a string pattern on upstream paths.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ render ──▶ recognize ──▶ assemble ──▶ persist ──▶ index
//! (check)   (pages)   (PNG)      (OCR .txt)    (records)    (JSON)      (search)
//! ```
//!
//! 1. [`input`]     — validate the source PDF and derive the book id
//! 2. [`split`]     — one single-page PDF per page
//! 3. [`render`]    — rasterise each page file; fan-out allowed
//! 4. [`recognize`] — OCR each image in the configured language
//! 5. [`assemble`]  — build one [`crate::output::DocumentRecord`] per text file
//! 6. [`persist`]   — write `{title}.json` atomically
//! 7. [`index`]     — submit each record, then refresh once
//!
//! Per-item stages run through [`run_items`], which applies the configured
//! concurrency, failure mode and progress events uniformly.

pub mod assemble;
pub mod index;
pub mod input;
pub mod persist;
pub mod recognize;
pub mod render;
pub mod split;

use crate::artifact::{Artifact, Stage};
use crate::config::{FailureMode, PipelineConfig};
use crate::error::{ItemFailure, PipelineError};
use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::{debug, warn};

/// Output of one per-item stage: what it produced, in input order, and
/// the items it dropped (continue-on-error mode only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput<T> {
    pub items: Vec<T>,
    pub failures: Vec<ItemFailure>,
}

impl<T> Default for StageOutput<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Drive `work` over every input artifact.
///
/// * Up to `config.concurrency` items are in flight; results are consumed
///   in input order, so the output order never depends on completion order.
/// * Each item may yield several outputs (render fan-out); they are
///   flattened in place.
/// * `FailFast`: the first failure is returned and pending items are
///   dropped. `ContinueOnError`: the failure is recorded and the item is
///   left out of the output. If every item failed the stage returns
///   [`PipelineError::AllItemsFailed`].
pub(crate) async fn run_items<T, F, Fut>(
    stage: Stage,
    inputs: &[Artifact],
    config: &PipelineConfig,
    work: F,
) -> Result<StageOutput<T>, PipelineError>
where
    F: Fn(&Artifact) -> Fut,
    Fut: Future<Output = Result<Vec<T>, PipelineError>>,
{
    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_stage_start(stage, inputs.len());
    }

    let work = &work;
    let mut results = stream::iter(inputs.iter().map(|input| async move {
        let result = work(input).await;
        (input, result)
    }))
    .buffered(config.concurrency.max(1));

    let mut output = StageOutput::default();
    while let Some((input, result)) = results.next().await {
        match result {
            Ok(items) => {
                debug!("[{}] {} → {} item(s)", stage, input.path.display(), items.len());
                if let Some(cb) = progress {
                    cb.on_item_complete(stage, &input.path);
                }
                output.items.extend(items);
            }
            Err(err) => {
                if let Some(cb) = progress {
                    cb.on_item_error(stage, &input.path, &err.to_string());
                }
                match config.failure_mode {
                    FailureMode::FailFast => return Err(err),
                    FailureMode::ContinueOnError => {
                        warn!("[{}] skipping {}: {}", stage, input.path.display(), err);
                        output
                            .failures
                            .push(ItemFailure::from_error(stage, &input.path, &err));
                    }
                }
            }
        }
    }

    if output.items.is_empty() && !output.failures.is_empty() {
        return Err(PipelineError::AllItemsFailed {
            stage,
            total: inputs.len(),
            first_error: output.failures[0].message.clone(),
        });
    }

    if let Some(cb) = progress {
        cb.on_stage_complete(stage, output.items.len(), output.failures.len());
    }
    Ok(output)
}

/// Run a blocking closure on tokio's blocking pool, turning a panic into
/// [`PipelineError::Internal`].
pub(crate) async fn blocking<T, F>(what: &str, f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Internal(format!("{what} task panicked: {e}")))
}
