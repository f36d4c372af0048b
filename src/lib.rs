//! # edgequake-pdf2index
//!
//! Turn scanned PDF books into searchable documents: split the PDF into
//! pages, rasterise each page, OCR the images, assemble one document record
//! per page, persist the records as JSON, and index them into a search
//! engine.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Split      one single-page PDF per page            (pdfium, spawn_blocking)
//!  ├─ 2. Rasterize  page PDF → PNG, fan-out allowed         (pdfium, spawn_blocking)
//!  ├─ 3. Recognize  PNG → UTF-8 text in the OCR language    (tesseract)
//!  ├─ 4. Assemble   text → DocumentRecord + metadata
//!  ├─ 5. Persist    {title}.json, atomic write
//!  └─ 6. Index      one insert per record, then one refresh (Elasticsearch)
//! ```
//!
//! Stages exchange [`Artifact`] lists that carry book id and page index, so
//! every file can be traced back to its source page. All naming is owned by
//! [`ArtifactLayout`]; reruns overwrite the same paths.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2index::{Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .input_file_path("story.pdf")
//!         .output_dir("/tmp/out")
//!         .build()?;
//!     // No search index attached: the Index stage is skipped.
//!     let output = Pipeline::from_config(config).run().await?;
//!     println!("{} pages → {}", output.stats.pages, output.json_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! * **pdfium** shared library, found in `PDFIUM_LIB_PATH`, the working
//!   directory, or the system library path.
//! * **tesseract** with trained data for each OCR language used.
//! * An **Elasticsearch** cluster (self-hosted URL or Elastic Cloud ID) when
//!   indexing.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2index` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod error;
pub mod ocr;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod search;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{Artifact, ArtifactLayout, LayoutStyle, Stage};
pub use config::{
    FailureMode, MetadataDefaults, PipelineConfig, PipelineConfigBuilder, SearchConfig,
    TitlePolicy,
};
pub use error::{ErrorKind, ItemFailure, PipelineError};
pub use ocr::{OcrEngine, TesseractEngine};
pub use output::{
    BookDocumentSet, DocumentRecord, IndexOutcome, IndexReport, IndexStatus, PipelineOutput,
    PipelineStats, StageTiming,
};
pub use pdf::{PdfBackend, PdfiumBackend};
pub use pipeline::index::{index_documents, reindex_json_file};
pub use pipeline::persist::load_documents;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use runner::{Pipeline, PipelineState};
pub use search::{ElasticsearchIndex, InMemoryIndex, SearchIndex};
