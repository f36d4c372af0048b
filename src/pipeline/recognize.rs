//! Text recognition: OCR every page image into a UTF-8 `.txt` file.
//!
//! The engine's output is written verbatim. No whitespace normalisation,
//! no confidence filtering.

use super::{run_items, StageOutput};
use crate::artifact::{Artifact, ArtifactLayout, Stage};
use crate::config::{PipelineConfig, DEFAULT_OCR_LANGUAGE};
use crate::error::PipelineError;
use crate::ocr::OcrEngine;
use std::sync::Arc;
use tracing::info;

/// OCR every image artifact in `language`.
///
/// An empty or blank `language` means [`DEFAULT_OCR_LANGUAGE`]. Each text
/// artifact keeps the page and image index of its image and records the
/// image as its `source`.
///
/// # Errors
/// * [`PipelineError::RecognitionError`] if the engine fails on an image.
/// * [`PipelineError::WriteError`] if the text directory or a text file
///   cannot be written.
pub async fn recognize_images(
    images: &[Artifact],
    language: &str,
    layout: &ArtifactLayout,
    ocr: &Arc<dyn OcrEngine>,
    config: &PipelineConfig,
) -> Result<StageOutput<Artifact>, PipelineError> {
    let language = match language.trim() {
        "" => DEFAULT_OCR_LANGUAGE,
        lang => lang,
    };
    info!("Recognising {} images with {} ({})", images.len(), ocr.name(), language);

    let mut dirs: Vec<_> = images
        .iter()
        .map(|i| layout.for_book(i.book_id.as_str()).dir_for(Stage::Recognize))
        .collect();
    dirs.dedup();
    for dir in dirs {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::write(Stage::Recognize, &dir, e))?;
    }

    run_items(Stage::Recognize, images, config, |image| {
        let ocr = Arc::clone(ocr);
        let image = image.clone();
        let text = layout.derive(&image, Stage::Recognize, image.image_index);
        let language = language.to_string();
        async move {
            let content = ocr.recognize(&image.path, &language).await.map_err(|detail| {
                PipelineError::RecognitionError {
                    path: image.path.clone(),
                    language: language.clone(),
                    detail,
                }
            })?;

            tokio::fs::write(&text.path, content.as_bytes())
                .await
                .map_err(|e| PipelineError::write(Stage::Recognize, &text.path, e))?;
            Ok(vec![text])
        }
    })
    .await
}
