//! PDF collaborator: page counting, single-page extraction and rendering.
//!
//! The pipeline never talks to pdfium directly; the split and rasterize
//! stages go through [`PdfBackend`] so tests can substitute a fake and a
//! different engine can be plugged in without touching stage logic.
//!
//! ## Why blocking?
//!
//! pdfium uses thread-local state internally and is not async-safe. The
//! trait is deliberately synchronous; stages call it from
//! `tokio::task::spawn_blocking`.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// PDF operations the pipeline needs. Errors are human-readable details;
/// the calling stage attaches stage and path.
pub trait PdfBackend: Send + Sync {
    /// Number of pages in the document at `path`.
    fn page_count(&self, path: &Path) -> Result<usize, String>;

    /// A standalone single-page PDF holding page `index` (0-based).
    fn extract_page(&self, path: &Path, index: usize) -> Result<Vec<u8>, String>;

    /// Every page of the document as a standalone single-page PDF, in page
    /// order.
    ///
    /// The outer error means the document itself could not be opened; an
    /// inner error affects only that page. Backends that can open the
    /// document once should override the per-page default.
    fn extract_pages(&self, path: &Path) -> Result<Vec<Result<Vec<u8>, String>>, String> {
        let count = self.page_count(path)?;
        Ok((0..count).map(|i| self.extract_page(path, i)).collect())
    }

    /// Render every page of the document at `path`, in page order.
    ///
    /// A single-page file normally yields one image, but callers must
    /// accept more.
    fn render(&self, path: &Path) -> Result<Vec<DynamicImage>, String>;
}

/// [`PdfBackend`] backed by the pdfium C++ library via `pdfium-render`.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    library_dir: Option<PathBuf>,
    password: Option<String>,
    max_rendered_pixels: u32,
}

impl Default for PdfiumBackend {
    fn default() -> Self {
        Self {
            library_dir: None,
            password: None,
            max_rendered_pixels: 2000,
        }
    }
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend matching the render settings of `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            library_dir: None,
            password: config.pdf_password.clone(),
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }

    /// Load libpdfium from `dir` instead of the working directory or the
    /// system library path.
    pub fn library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.max_rendered_pixels = px.max(100);
        self
    }

    /// Verify that a pdfium library can be bound, so a missing library is
    /// reported once at start-up instead of once per page.
    pub fn check_binding(&self) -> Result<(), PipelineError> {
        self.bind().map(|_| ()).map_err(PipelineError::PdfiumBindingFailed)
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let dir = self
            .library_dir
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));
        let bindings = match dir {
            Some(ref dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| format!("{e:?}"))?;
        Ok(Pdfium::new(bindings))
    }

    fn load<'a>(&'a self, pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, String> {
        pdfium
            .load_pdf_from_file(path, self.password.as_deref())
            .map_err(|e| {
                let detail = format!("{e:?}");
                if detail.to_lowercase().contains("password") {
                    if self.password.is_some() {
                        "wrong password".to_string()
                    } else {
                        "document is encrypted and requires a password".to_string()
                    }
                } else {
                    format!("not a valid PDF container: {detail}")
                }
            })
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_count(&self, path: &Path) -> Result<usize, String> {
        let pdfium = self.bind()?;
        let document = self.load(&pdfium, path)?;
        Ok(document.pages().len() as usize)
    }

    fn extract_page(&self, path: &Path, index: usize) -> Result<Vec<u8>, String> {
        let pdfium = self.bind()?;
        let source = self.load(&pdfium, path)?;
        let total = source.pages().len() as usize;
        if index >= total {
            return Err(format!(
                "page {} is out of range (document has {} pages)",
                index + 1,
                total
            ));
        }
        copy_single_page(&pdfium, &source, index)
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<Result<Vec<u8>, String>>, String> {
        let pdfium = self.bind()?;
        let source = self.load(&pdfium, path)?;
        let total = source.pages().len() as usize;
        Ok((0..total)
            .map(|index| copy_single_page(&pdfium, &source, index))
            .collect())
    }

    fn render(&self, path: &Path) -> Result<Vec<DynamicImage>, String> {
        let pdfium = self.bind()?;
        let document = self.load(&pdfium, path)?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let mut images = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| format!("page {}: {e:?}", idx + 1))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered {} page {} → {}x{} px",
                path.display(),
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}

fn copy_single_page(
    pdfium: &Pdfium,
    source: &PdfDocument<'_>,
    index: usize,
) -> Result<Vec<u8>, String> {
    let mut single = pdfium.create_new_pdf().map_err(|e| format!("{e:?}"))?;
    single
        .pages_mut()
        .copy_page_from_document(source, index as PdfPageIndex, 0)
        .map_err(|e| format!("copy page {}: {e:?}", index + 1))?;

    let bytes = single.save_to_bytes().map_err(|e| format!("{e:?}"))?;
    debug!("Extracted page {} → {} bytes", index + 1, bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_pixels() {
        let b = PdfiumBackend::new().max_rendered_pixels(10);
        assert_eq!(b.max_rendered_pixels, 100);
    }

    #[test]
    fn from_config_copies_render_settings() {
        let config = PipelineConfig::builder()
            .input_file_path("a.pdf")
            .max_rendered_pixels(1200)
            .pdf_password("pw")
            .build()
            .unwrap();
        let b = PdfiumBackend::from_config(&config);
        assert_eq!(b.max_rendered_pixels, 1200);
        assert_eq!(b.password.as_deref(), Some("pw"));
    }

    #[test]
    fn missing_library_dir_fails_binding() {
        let b = PdfiumBackend::new().library_dir("/definitely/not/a/pdfium/dir");
        let err = b.check_binding().unwrap_err();
        assert!(matches!(err, PipelineError::PdfiumBindingFailed(_)));
    }
}
