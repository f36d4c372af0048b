//! Page splitting: one standalone single-page PDF per source page.
//!
//! Output files are named `{book}_page_{n}.pdf` (1-based) in the layout's
//! page directory and returned in page order. Existing files at those paths
//! are overwritten, which is what makes a rerun idempotent.

use super::{blocking, run_items, StageOutput};
use crate::artifact::{Artifact, ArtifactLayout, Stage};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pdf::PdfBackend;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Split `input` into per-page PDFs under `layout`.
///
/// # Errors
/// * [`PipelineError::WriteError`] if the page directory cannot be created
///   or a page file cannot be written.
/// * [`PipelineError::ReadError`] if the input cannot be opened as a PDF or
///   a page cannot be extracted.
pub async fn split_pages(
    input: &Path,
    layout: &ArtifactLayout,
    pdf: &Arc<dyn PdfBackend>,
    config: &PipelineConfig,
) -> Result<StageOutput<Artifact>, PipelineError> {
    let dir = layout.dir_for(Stage::Split);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| PipelineError::write(Stage::Split, &dir, e))?;

    // Open the document once; per-page results keep page failures
    // separate from an unreadable input.
    let extracted = {
        let pdf = Arc::clone(pdf);
        let path = input.to_path_buf();
        blocking("page extraction", move || pdf.extract_pages(&path))
            .await?
            .map_err(|detail| PipelineError::read(Stage::Split, input, detail))?
    };
    info!("{}: {} pages", input.display(), extracted.len());

    let planned: Vec<Artifact> = (1..=extracted.len()).map(|n| layout.page(n)).collect();
    let extracted = &extracted;

    run_items(Stage::Split, &planned, config, |page| {
        let source = input.to_path_buf();
        let page = page.clone();
        let result = extracted[page.page_index - 1].clone();
        async move {
            let bytes = result.map_err(|detail| {
                PipelineError::read(
                    Stage::Split,
                    &source,
                    format!("page {}: {detail}", page.page_index),
                )
            })?;

            tokio::fs::write(&page.path, &bytes)
                .await
                .map_err(|e| PipelineError::write(Stage::Split, &page.path, e))?;

            Ok(vec![Artifact {
                source: Some(source),
                ..page
            }])
        }
    })
    .await
}
