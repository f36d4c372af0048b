//! Configuration types for the PDF → OCR → search-index pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built
//! via its [`PipelineConfigBuilder`]. The config is resolved once per run
//! and never mutated afterwards; every stage receives it by reference.
//!
//! Search-service credentials live in a separate [`SearchConfig`] so the
//! pipeline config can be logged freely. Neither struct has compiled-in
//! credentials; the CLI fills them from flags or the environment.

use crate::artifact::LayoutStyle;
use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// OCR language used when the caller supplies none.
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2index::{FailureMode, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .input_file_path("books/story.pdf")
///     .output_dir("/tmp/out")
///     .ocr_language("tam")
///     .failure_mode(FailureMode::ContinueOnError)
///     .build()
///     .unwrap();
/// assert_eq!(config.effective_ocr_language(), "tam");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Source PDF. Must exist and be readable.
    pub input_file_path: PathBuf,

    /// Root directory for intermediate artifacts. Created if absent.
    pub output_dir: PathBuf,

    /// Tesseract language code (`eng`, `tam`, `eng+fra`, …).
    /// Empty means [`DEFAULT_OCR_LANGUAGE`].
    pub ocr_language: String,

    /// Directory arrangement of intermediate artifacts. Default: Nested.
    pub layout: LayoutStyle,

    /// Items processed concurrently within one stage. Default: 1.
    ///
    /// Output order never depends on this value; stages preserve input
    /// order regardless of completion order.
    pub concurrency: usize,

    /// What a stage does when a single item fails. Default: FailFast.
    pub failure_mode: FailureMode,

    /// How record titles are derived. Default: FirstArtifact.
    pub title_policy: TitlePolicy,

    /// Placeholder metadata stamped on every document record.
    pub metadata: MetadataDefaults,

    /// Directory for the `{title}.json` file. `None` = current directory.
    pub json_output_dir: Option<PathBuf>,

    /// Search index receiving the records. Required when a search backend
    /// is attached to the pipeline.
    pub index_name: Option<String>,

    /// Longest edge of rendered page images, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// User password for encrypted source PDFs.
    pub pdf_password: Option<String>,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_file_path: PathBuf::new(),
            output_dir: PathBuf::from("output"),
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            layout: LayoutStyle::default(),
            concurrency: 1,
            failure_mode: FailureMode::default(),
            title_policy: TitlePolicy::default(),
            metadata: MetadataDefaults::default(),
            json_output_dir: None,
            index_name: None,
            max_rendered_pixels: 2000,
            pdf_password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_file_path", &self.input_file_path)
            .field("output_dir", &self.output_dir)
            .field("ocr_language", &self.ocr_language)
            .field("layout", &self.layout)
            .field("concurrency", &self.concurrency)
            .field("failure_mode", &self.failure_mode)
            .field("title_policy", &self.title_policy)
            .field("metadata", &self.metadata)
            .field("json_output_dir", &self.json_output_dir)
            .field("index_name", &self.index_name)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The OCR language actually passed to the engine.
    pub fn effective_ocr_language(&self) -> &str {
        let lang = self.ocr_language.trim();
        if lang.is_empty() {
            DEFAULT_OCR_LANGUAGE
        } else {
            lang
        }
    }

    /// Directory the persister writes into.
    pub fn json_dir(&self) -> PathBuf {
        self.json_output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn input_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_file_path = path.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn layout(mut self, style: LayoutStyle) -> Self {
        self.config.layout = style;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.failure_mode = mode;
        self
    }

    pub fn title_policy(mut self, policy: TitlePolicy) -> Self {
        self.config.title_policy = policy;
        self
    }

    pub fn metadata(mut self, metadata: MetadataDefaults) -> Self {
        self.config.metadata = metadata;
        self
    }

    pub fn json_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.json_output_dir = Some(dir.into());
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = Some(name.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.input_file_path.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "input_file_path is required".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "output_dir must not be empty".into(),
            ));
        }
        if let Some(ref name) = c.index_name {
            validate_index_name(name)?;
        }
        if c.ocr_language.chars().any(char::is_whitespace) && !c.ocr_language.trim().is_empty()
        {
            return Err(PipelineError::InvalidConfig(format!(
                "OCR language '{}' must not contain whitespace",
                c.ocr_language
            )));
        }
        Ok(self.config)
    }
}

/// Reject index names the search service would refuse anyway.
pub fn validate_index_name(name: &str) -> Result<(), PipelineError> {
    if name.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "index name must not be empty".into(),
        ));
    }
    if name != name.to_lowercase() {
        return Err(PipelineError::InvalidConfig(format!(
            "index name '{name}' must be lowercase"
        )));
    }
    if name.starts_with(['_', '-', '+']) {
        return Err(PipelineError::InvalidConfig(format!(
            "index name '{name}' must not start with '_', '-' or '+'"
        )));
    }
    if name
        .chars()
        .any(|c| matches!(c, '\\' | '/' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | ',' | '#' | ':'))
    {
        return Err(PipelineError::InvalidConfig(format!(
            "index name '{name}' contains a forbidden character"
        )));
    }
    Ok(())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Per-item failure handling inside a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailureMode {
    /// The first failing item aborts the run. (default)
    #[default]
    FailFast,
    /// Failing items are dropped from the stage output and listed in the
    /// run's failure report; the remaining items continue.
    ContinueOnError,
}

/// How [`crate::pipeline::assemble`] assigns titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TitlePolicy {
    /// Homogeneous-batch assumption: every record gets the title prefix of
    /// the *first* text artifact, even if later artifacts come from a
    /// different book. (default)
    #[default]
    FirstArtifact,
    /// Each record gets the title prefix of its own text artifact.
    PerArtifact,
}

/// Metadata stamped on every [`crate::output::DocumentRecord`].
///
/// None of these fields is derived from the document itself; they are a
/// defaulting policy the caller can override per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDefaults {
    pub author: String,
    pub publication_date: String,
    pub isbn: String,
    /// `None` derives the language name from the OCR language code.
    pub language: Option<String>,
    pub genre: Vec<String>,
}

impl Default for MetadataDefaults {
    fn default() -> Self {
        Self {
            author: "John Smith".to_string(),
            publication_date: "2023-08-20".to_string(),
            isbn: "978-1234567890".to_string(),
            language: None,
            genre: vec!["Adventure".to_string()],
        }
    }
}

impl MetadataDefaults {
    /// Resolve the record language for the given OCR language code.
    pub fn language_for(&self, ocr_language: &str) -> String {
        match self.language {
            Some(ref l) => l.clone(),
            None => language_name(ocr_language),
        }
    }
}

/// Human-readable name of a Tesseract language code.
///
/// Multi-language codes (`eng+fra`) use the first component. Unknown codes
/// pass through unchanged.
pub fn language_name(code: &str) -> String {
    let primary = code.split('+').next().unwrap_or(code).trim();
    let name = match primary {
        "" | "eng" => "English",
        "tam" => "Tamil",
        "hin" => "Hindi",
        "tel" => "Telugu",
        "kan" => "Kannada",
        "mal" => "Malayalam",
        "ben" => "Bengali",
        "fra" => "French",
        "deu" => "German",
        "spa" => "Spanish",
        "ita" => "Italian",
        "por" => "Portuguese",
        "nld" => "Dutch",
        "rus" => "Russian",
        "ara" => "Arabic",
        "chi_sim" => "Chinese (Simplified)",
        "chi_tra" => "Chinese (Traditional)",
        "jpn" => "Japanese",
        "kor" => "Korean",
        other => return other.to_string(),
    };
    name.to_string()
}

// ── Search service ───────────────────────────────────────────────────────

/// Connection settings for an Elasticsearch-compatible search service.
///
/// Exactly one of `url` / `cloud_id` must be set; authentication is either
/// `api_key` or `username` + `password`, or none.
#[derive(Clone, Default)]
pub struct SearchConfig {
    /// Base URL, e.g. `https://localhost:9200`.
    pub url: Option<String>,
    /// Elastic Cloud ID (`name:base64(host$es$kibana)`).
    pub cloud_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("SearchConfig")
            .field("url", &self.url)
            .field("cloud_id", &self.cloud_id)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SearchConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            timeout_secs: 30,
            ..Default::default()
        }
    }

    pub fn with_cloud_id(cloud_id: impl Into<String>) -> Self {
        Self {
            cloud_id: Some(cloud_id.into()),
            timeout_secs: 30,
            ..Default::default()
        }
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Check the combination of fields is usable.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match (&self.url, &self.cloud_id) {
            (None, None) => {
                return Err(PipelineError::InvalidConfig(
                    "search service needs a URL or a Cloud ID".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(PipelineError::InvalidConfig(
                    "set either a search URL or a Cloud ID, not both".into(),
                ))
            }
            _ => {}
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(PipelineError::InvalidConfig(
                "search username and password must be given together".into(),
            ));
        }
        if self.api_key.is_some() && self.username.is_some() {
            return Err(PipelineError::InvalidConfig(
                "use either an API key or basic auth, not both".into(),
            ));
        }
        Ok(())
    }
}
