//! Shared fakes for integration tests.
//!
//! The fakes stand in for pdfium and tesseract so the full pipeline can run
//! without native libraries:
//!
//! * A "PDF" is `%PDF\n` followed by page bodies separated by form feeds.
//! * Rendering a page yields one small image, or two if the body contains
//!   `FANOUT`; a body containing `CORRUPT` cannot be rendered.
//! * OCR returns `Text of {image stem}` and fails for configured stems.

#![allow(dead_code)]

use edgequake_pdf2index::{OcrEngine, PdfBackend};
use futures::future::BoxFuture;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HEADER: &str = "%PDF\n";

/// Write a fake PDF with the given page bodies.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, format!("{HEADER}{}", pages.join("\x0c"))).unwrap();
}

fn read_pages(path: &Path) -> Result<Vec<String>, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let body = text
        .strip_prefix(HEADER)
        .ok_or_else(|| "not a PDF container".to_string())?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    Ok(body.split('\x0c').map(str::to_string).collect())
}

pub struct FakePdf;

impl PdfBackend for FakePdf {
    fn page_count(&self, path: &Path) -> Result<usize, String> {
        read_pages(path).map(|p| p.len())
    }

    fn extract_page(&self, path: &Path, index: usize) -> Result<Vec<u8>, String> {
        let pages = read_pages(path)?;
        let body = pages.get(index).ok_or("page out of range")?;
        Ok(format!("{HEADER}{body}").into_bytes())
    }

    fn render(&self, path: &Path) -> Result<Vec<DynamicImage>, String> {
        let pages = read_pages(path)?;
        let body = pages.first().ok_or("page file has no page")?;
        if body.contains("CORRUPT") {
            return Err("cannot decode page content stream".into());
        }
        let n = if body.contains("FANOUT") { 2 } else { 1 };
        Ok((0..n).map(|_| DynamicImage::new_luma8(8, 8)).collect())
    }
}

#[derive(Default)]
pub struct FakeOcr {
    /// Image stems that fail recognition.
    pub failing: Vec<String>,
    /// Delay per image, shorter for later pages, to scramble completion
    /// order under concurrency.
    pub stagger: bool,
}

impl FakeOcr {
    pub fn failing_on(stem: &str) -> Self {
        Self {
            failing: vec![stem.to_string()],
            stagger: false,
        }
    }

    pub fn staggered() -> Self {
        Self {
            failing: Vec::new(),
            stagger: true,
        }
    }
}

impl OcrEngine for FakeOcr {
    fn name(&self) -> &str {
        "fake"
    }

    fn recognize<'a>(
        &'a self,
        image: &'a Path,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            if !image.exists() {
                return Err(format!("{} does not exist", image.display()));
            }
            let stem = image
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if self.stagger {
                let page: u64 = stem
                    .rsplit('_')
                    .next()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(1);
                tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(page * 10))).await;
            }
            if self.failing.iter().any(|f| *f == stem) {
                return Err("image too noisy".into());
            }
            Ok(format!("Text of {stem} [{language}]\n"))
        })
    }
}

/// A temp workspace: `in/` for sources, `out/` for artifacts, `json/` for
/// the persisted file.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn input(&self, name: &str) -> PathBuf {
        self.dir.path().join("in").join(name)
    }

    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn json(&self) -> PathBuf {
        self.dir.path().join("json")
    }
}
