//! OCR collaborator: turn a page image into text.
//!
//! [`OcrEngine`] is the seam; [`TesseractEngine`] drives the `tesseract`
//! command-line tool, which must be installed separately together with the
//! trained data for every language the pipeline is asked to read.

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Recognise the text in an image.
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognise `image` in `language` (a Tesseract language code).
    ///
    /// The returned text is used verbatim; engines must not trim or
    /// normalise it.
    fn recognize<'a>(
        &'a self,
        image: &'a Path,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, String>>;
}

/// [`OcrEngine`] running `tesseract <image> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            extra_args: Vec::new(),
        }
    }
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific tesseract binary instead of the one on `PATH`.
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = path.into();
        self
    }

    /// Extra arguments appended after the language, e.g. `--psm 6`.
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// `true` if the binary runs and reports a version.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize<'a>(
        &'a self,
        image: &'a Path,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let output = Command::new(&self.binary)
                .arg(image.as_os_str())
                .arg("stdout")
                .arg("-l")
                .arg(language)
                .args(&self.extra_args)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| {
                    format!(
                        "failed to run '{}' (is tesseract installed?): {e}",
                        self.binary.display()
                    )
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "tesseract exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ));
            }

            debug!(
                "tesseract read {} bytes from {}",
                output.stdout.len(),
                image.display()
            );
            String::from_utf8(output.stdout).map_err(|e| format!("OCR output is not UTF-8: {e}"))
        })
    }
}
