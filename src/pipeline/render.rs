//! Rasterisation: render each single-page PDF to PNG.
//!
//! ## Why spawn_blocking?
//!
//! The pdfium C++ library uses thread-local state internally and is not
//! safe to call from async contexts, and PNG encoding is CPU-bound. Both run
//! on tokio's blocking pool so worker threads never stall.
//!
//! ## Fan-out
//!
//! A page file normally renders to exactly one image, written as
//! `{book}_page_{n}.png`. If the renderer yields more, the extra images are
//! written as `{book}_page_{n}_{k}.png` and returned right after the first,
//! all carrying the same page index.

use super::{blocking, run_items, StageOutput};
use crate::artifact::{Artifact, ArtifactLayout, Stage};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pdf::PdfBackend;
use image::{ImageError, ImageFormat};
use std::sync::Arc;
use tracing::debug;

/// Render every page artifact to one or more PNG artifacts.
///
/// # Errors
/// * [`PipelineError::ConversionError`] if the renderer cannot decode a page
///   file, yields no image, or the image cannot be encoded.
/// * [`PipelineError::WriteError`] if the image directory or a PNG cannot
///   be written.
pub async fn render_pages(
    pages: &[Artifact],
    layout: &ArtifactLayout,
    pdf: &Arc<dyn PdfBackend>,
    config: &PipelineConfig,
) -> Result<StageOutput<Artifact>, PipelineError> {
    create_image_dirs(pages, layout).await?;

    run_items(Stage::Rasterize, pages, config, |page| {
        let pdf = Arc::clone(pdf);
        let page = page.clone();
        let layout = layout.clone();
        async move {
            let path = page.path.clone();
            let images = blocking("render", move || pdf.render(&path))
                .await?
                .map_err(|detail| PipelineError::ConversionError {
                    path: page.path.clone(),
                    detail,
                })?;

            if images.is_empty() {
                return Err(PipelineError::ConversionError {
                    path: page.path.clone(),
                    detail: "renderer produced no image".into(),
                });
            }
            if images.len() > 1 {
                debug!("{} rendered to {} images", page.path.display(), images.len());
            }

            let mut produced = Vec::with_capacity(images.len());
            for (k, image) in images.into_iter().enumerate() {
                let artifact = layout.derive(&page, Stage::Rasterize, k + 1);
                let target = artifact.path.clone();
                blocking("PNG encode", move || {
                    image.save_with_format(&target, ImageFormat::Png)
                })
                .await?
                .map_err(|e| match e {
                    ImageError::IoError(io) => {
                        PipelineError::write(Stage::Rasterize, &artifact.path, io)
                    }
                    other => PipelineError::ConversionError {
                        path: page.path.clone(),
                        detail: format!("PNG encoding failed: {other}"),
                    },
                })?;
                produced.push(artifact);
            }
            Ok(produced)
        }
    })
    .await
}

/// Create the image directory of every book present in `pages`, once each.
async fn create_image_dirs(
    pages: &[Artifact],
    layout: &ArtifactLayout,
) -> Result<(), PipelineError> {
    let mut dirs: Vec<_> = pages
        .iter()
        .map(|p| layout.for_book(p.book_id.as_str()).dir_for(Stage::Rasterize))
        .collect();
    dirs.dedup();
    for dir in dirs {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::write(Stage::Rasterize, &dir, e))?;
    }
    Ok(())
}
