//! Pipeline runner: sequences the six stages over one source PDF.
//!
//! ```text
//! Split → Rasterize → Recognize → Assemble → Persist → Index → Done
//! ```
//!
//! Strictly sequential, no branching, no loop-back. Each stage consumes the
//! full output of the previous one. A fatal error in any state ends the run
//! and leaves already-written artifacts in place; a rerun starts again at
//! `Split` and overwrites every artifact at its deterministic path.

use crate::artifact::{ArtifactLayout, Stage};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::output::{BookDocumentSet, PipelineOutput, PipelineStats, StageTiming};
use crate::pdf::{PdfBackend, PdfiumBackend};
use crate::pipeline::{assemble, index, input, persist, recognize, render, split};
use crate::search::SearchIndex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Position of a run in the stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Split,
    Rasterize,
    Recognize,
    Assemble,
    Persist,
    Index,
    Done,
}

impl PipelineState {
    /// The state after this one. `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            PipelineState::Split => PipelineState::Rasterize,
            PipelineState::Rasterize => PipelineState::Recognize,
            PipelineState::Recognize => PipelineState::Assemble,
            PipelineState::Assemble => PipelineState::Persist,
            PipelineState::Persist => PipelineState::Index,
            PipelineState::Index | PipelineState::Done => PipelineState::Done,
        }
    }

    /// The stage executed in this state.
    pub fn stage(self) -> Option<Stage> {
        match self {
            PipelineState::Split => Some(Stage::Split),
            PipelineState::Rasterize => Some(Stage::Rasterize),
            PipelineState::Recognize => Some(Stage::Recognize),
            PipelineState::Assemble => Some(Stage::Assemble),
            PipelineState::Persist => Some(Stage::Persist),
            PipelineState::Index => Some(Stage::Index),
            PipelineState::Done => None,
        }
    }
}

/// One configured pipeline: config plus its collaborators.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2index::{
///     ElasticsearchIndex, Pipeline, PipelineConfig, SearchConfig,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::builder()
///     .input_file_path("books/story.pdf")
///     .output_dir("/tmp/out")
///     .index_name("ebooks")
///     .build()?;
/// let search = ElasticsearchIndex::new(&SearchConfig::with_url("http://localhost:9200"))?;
///
/// let output = Pipeline::from_config(config)
///     .with_search(Arc::new(search))
///     .run()
///     .await?;
/// println!("{} records → {}", output.documents.len(), output.json_path.display());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    search: Option<Arc<dyn SearchIndex>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, pdf: Arc<dyn PdfBackend>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            config,
            pdf,
            ocr,
            search: None,
        }
    }

    /// Pipeline with the pdfium backend and the `tesseract` on `PATH`.
    pub fn from_config(config: PipelineConfig) -> Self {
        let pdf = Arc::new(PdfiumBackend::from_config(&config));
        Self::new(config, pdf, Arc::new(TesseractEngine::new()))
    }

    /// Attach a search index; without one the Index state is skipped.
    pub fn with_search(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage once over the configured input.
    ///
    /// # Errors
    /// The first fatal [`PipelineError`] of any stage. In continue-on-error
    /// mode per-item failures are returned in
    /// [`PipelineOutput::failures`] instead.
    pub async fn run(&self) -> Result<PipelineOutput, PipelineError> {
        let total_start = Instant::now();
        let config = &self.config;

        let index_name = match (&self.search, &config.index_name) {
            (Some(_), None) => {
                return Err(PipelineError::InvalidConfig(
                    "index_name is required when a search index is attached".into(),
                ))
            }
            (Some(_), Some(name)) => Some(name.as_str()),
            (None, _) => None,
        };

        if let Some(ref cb) = config.progress_callback {
            cb.on_pipeline_start(&config.input_file_path);
        }

        let source = input::resolve_source(&config.input_file_path)?;
        let layout = ArtifactLayout::new(&config.output_dir, &source.book_id, config.layout);
        let language = config.effective_ocr_language();
        info!(
            "Processing '{}' (book '{}', OCR {}, {:?} layout)",
            source.path.display(),
            source.book_id,
            language,
            config.layout
        );

        let mut pages = Vec::new();
        let mut images = Vec::new();
        let mut texts = Vec::new();
        let mut documents = BookDocumentSet::default();
        let mut json_path = PathBuf::new();
        let mut index_report = None;
        let mut failures = Vec::new();
        let mut stats = PipelineStats::default();

        let mut state = PipelineState::Split;
        while let Some(stage) = state.stage() {
            let started = Instant::now();
            let (produced, failed) = match state {
                PipelineState::Split => {
                    let out =
                        split::split_pages(&source.path, &layout, &self.pdf, config).await?;
                    pages = out.items;
                    let failed = out.failures.len();
                    failures.extend(out.failures);
                    (pages.len(), failed)
                }
                PipelineState::Rasterize => {
                    let out = render::render_pages(&pages, &layout, &self.pdf, config).await?;
                    images = out.items;
                    let failed = out.failures.len();
                    failures.extend(out.failures);
                    (images.len(), failed)
                }
                PipelineState::Recognize => {
                    let out = recognize::recognize_images(
                        &images, language, &layout, &self.ocr, config,
                    )
                    .await?;
                    texts = out.items;
                    let failed = out.failures.len();
                    failures.extend(out.failures);
                    (texts.len(), failed)
                }
                PipelineState::Assemble => {
                    let out = assemble::assemble_documents(&texts, config).await?;
                    let failed = out.failures.len();
                    failures.extend(out.failures);
                    documents = BookDocumentSet::new(out.items);
                    (documents.len(), failed)
                }
                PipelineState::Persist => {
                    json_path = persist::persist_documents(&documents, &config.json_dir()).await?;
                    (1, 0)
                }
                PipelineState::Index => match (&self.search, index_name) {
                    (Some(search), Some(name)) => {
                        let report = index::index_with_progress(
                            &documents.records,
                            name,
                            search.as_ref(),
                            config.failure_mode,
                            config.progress_callback.as_ref(),
                        )
                        .await?;
                        let counts = (report.succeeded(), report.submitted() - report.succeeded());
                        index_report = Some(report);
                        counts
                    }
                    _ => {
                        warn!("No search index attached; skipping the index stage");
                        (0, 0)
                    }
                },
                PipelineState::Done => unreachable!("Done has no stage"),
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            info!(
                "[{}] {} produced, {} failed in {}ms",
                stage, produced, failed, duration_ms
            );
            stats.stages.push(StageTiming {
                stage,
                produced,
                failed,
                duration_ms,
            });
            state = state.next();
        }

        stats.pages = pages.len();
        stats.images = images.len();
        stats.texts = texts.len();
        stats.records = documents.len();
        stats.indexed = index_report.as_ref().map(|r| r.succeeded()).unwrap_or(0);
        stats.failed_items = failures.len()
            + index_report
                .as_ref()
                .map(|r| r.submitted() - r.succeeded())
                .unwrap_or(0);
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Pipeline complete: {} pages, {} records, {} indexed, {} failed, {}ms",
            stats.pages, stats.records, stats.indexed, stats.failed_items, stats.total_duration_ms
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_pipeline_complete(&stats);
        }

        Ok(PipelineOutput {
            book_id: source.book_id,
            pages,
            images,
            texts,
            documents,
            json_path,
            index_report,
            failures,
            stats,
        })
    }
}
