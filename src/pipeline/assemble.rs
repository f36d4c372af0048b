//! Document assembly: one [`DocumentRecord`] per text artifact.
//!
//! Titles follow [`TitlePolicy`]. Under the default
//! [`TitlePolicy::FirstArtifact`] every record takes the title prefix of the
//! *first* text artifact, so a batch mixing pages of two books is labelled
//! entirely with the first book's title. The batch is assumed to be
//! homogeneous; [`TitlePolicy::PerArtifact`] lifts that assumption.
//!
//! All other metadata comes from [`crate::config::MetadataDefaults`]; none
//! of it is read from the document.

use super::{run_items, StageOutput};
use crate::artifact::{title_prefix, Artifact, Stage, IMAGE_DIR};
use crate::config::{PipelineConfig, TitlePolicy};
use crate::error::PipelineError;
use crate::output::DocumentRecord;
use std::path::PathBuf;
use tracing::warn;

/// Read every text artifact into a record, in input order.
///
/// # Errors
/// * [`PipelineError::EmptyBatch`] if `texts` is empty.
/// * [`PipelineError::ReadError`] if a text file is missing or not UTF-8.
pub async fn assemble_documents(
    texts: &[Artifact],
    config: &PipelineConfig,
) -> Result<StageOutput<DocumentRecord>, PipelineError> {
    let first = texts.first().ok_or(PipelineError::EmptyBatch {
        stage: Stage::Assemble,
    })?;
    let batch_title = record_title(first);
    let language = config.metadata.language_for(config.effective_ocr_language());
    let metadata = &config.metadata;

    run_items(Stage::Assemble, texts, config, |text| {
        let text = text.clone();
        let title = match config.title_policy {
            TitlePolicy::FirstArtifact => batch_title.clone(),
            TitlePolicy::PerArtifact => record_title(&text),
        };
        let language = language.clone();
        async move {
            let content = tokio::fs::read_to_string(&text.path)
                .await
                .map_err(|e| PipelineError::read(Stage::Assemble, &text.path, e))?;

            Ok(vec![DocumentRecord {
                title,
                author: metadata.author.clone(),
                publication_date: metadata.publication_date.clone(),
                isbn: metadata.isbn.clone(),
                language,
                genre: metadata.genre.clone(),
                content,
                content_source_image_path: source_image(&text),
            }])
        }
    })
    .await
}

/// Title prefix of `text`, or its book id when the file name starts with
/// `_` and the prefix is empty.
fn record_title(text: &Artifact) -> String {
    let title = title_prefix(&text.path);
    if !title.is_empty() {
        return title;
    }
    warn!(
        "{} has an empty title prefix; using book id '{}'",
        text.path.display(),
        text.book_id
    );
    text.book_id.clone()
}

/// The image a text artifact was recognised from.
///
/// Artifacts rebuilt from a bare path have no `source`; their image sits in
/// the sibling `extracted_images` directory in every layout.
fn source_image(text: &Artifact) -> PathBuf {
    if let Some(ref source) = text.source {
        return source.clone();
    }
    let dir = text
        .path
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.join(IMAGE_DIR))
        .unwrap_or_else(|| PathBuf::from(IMAGE_DIR));
    dir.join(format!("{}.png", text.stem()))
}
