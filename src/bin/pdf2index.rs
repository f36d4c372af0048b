//! CLI binary for edgequake-pdf2index.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `PipelineConfig` / `SearchConfig`, runs the pipeline and
//! prints a summary plus any per-item failure report.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_pdf2index::{
    reindex_json_file, ElasticsearchIndex, FailureMode, IndexReport, IndexStatus, LayoutStyle,
    MetadataDefaults, PdfiumBackend, Pipeline, PipelineConfig, PipelineOutput,
    PipelineProgressCallback, PipelineStats, ProgressCallback, SearchConfig, SearchIndex, Stage,
    TesseractEngine, TitlePolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit status when the run finished but dropped items or documents.
const EXIT_PARTIAL: u8 = 2;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar reused for every stage, re-sized when a stage
/// starts. Item errors are printed above the bar as they happen.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn unit(stage: Stage) -> &'static str {
        match stage {
            Stage::Split => "pages",
            Stage::Rasterize => "pages",
            Stage::Recognize => "images",
            Stage::Assemble => "texts",
            Stage::Persist => "files",
            Stage::Index => "docs",
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, input: &Path) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {}", input.display()))
        ));
    }

    fn on_stage_start(&self, stage: Stage, total_items: usize) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {}  ⏱ {{elapsed_precise}}",
            Self::unit(stage)
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_style(style);
        self.bar.set_length(total_items as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(format!("{stage:<9}"));
        self.bar.reset_eta();
    }

    fn on_item_complete(&self, _stage: Stage, _path: &Path) {
        self.bar.inc(1);
    }

    fn on_item_error(&self, stage: Stage, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<9} {}  {}",
            red("✗"),
            stage,
            dim(&path.display().to_string()),
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage, produced: usize, failed: usize) {
        let mark = if failed == 0 { green("✓") } else { cyan("⚠") };
        let failed = if failed == 0 {
            String::new()
        } else {
            red(&format!("  ({failed} failed)"))
        };
        self.bar.println(format!(
            "  {} {:<9} {} {}{}",
            mark,
            stage,
            bold(&produced.to_string()),
            Self::unit(stage),
            failed
        ));
    }

    fn on_pipeline_complete(&self, _stats: &PipelineStats) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split, OCR and index a book (Elasticsearch from the environment)
  pdf2index run books/story.pdf -o output

  # Tamil book, 4 images in flight, keep going past bad pages
  pdf2index run kural.pdf -l tam --concurrency 4 --continue-on-error

  # Local processing only: no search service
  pdf2index run story.pdf --no-index

  # Re-index a previously written JSON file
  pdf2index index story.json --index-name ebooks

ENVIRONMENT VARIABLES:
  ES_URL                Elasticsearch base URL (self-hosted)
  ES_CLOUD_ID           Elastic Cloud deployment ID (instead of ES_URL)
  ES_CLOUD_USERNAME     Basic-auth user name
  ES_CLOUD_PASSWORD     Basic-auth password
  ES_API_KEY            API key (instead of user name + password)
  ES_INDEX_NAME         Target index
  PDF2INDEX_*           Any `run` option, e.g. PDF2INDEX_OCR_LANGUAGE=tam
  PDFIUM_LIB_PATH       Directory containing libpdfium
  TESSERACT_PATH        tesseract binary to use

  A .env file in the working directory is loaded first.

EXIT STATUS:
  0  every page processed and every document indexed
  1  fatal error (the message names the stage and file)
  2  finished with dropped pages or rejected documents (--continue-on-error)
"#;

/// Split, OCR and index scanned PDF books.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2index",
    version,
    about = "Split, OCR and index scanned PDF books into Elasticsearch",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2INDEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2INDEX_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2INDEX_NO_PROGRESS")]
    no_progress: bool,

    /// Also write a JSON-lines log file `pdf2index_<timestamp>.log` here.
    #[arg(long, global = true, env = "PDF2INDEX_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline over one PDF.
    Run(RunArgs),
    /// Index an existing JSON array of documents.
    Index(IndexArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Source PDF.
    input: PathBuf,

    /// Root directory for intermediate artifacts.
    #[arg(short, long, env = "PDF2INDEX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Tesseract language code (eng, tam, eng+fra, …).
    #[arg(short = 'l', long, env = "PDF2INDEX_OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// Artifact directory arrangement.
    #[arg(long, env = "PDF2INDEX_LAYOUT", value_enum, default_value = "nested")]
    layout: LayoutArg,

    /// Items processed concurrently within a stage.
    #[arg(short, long, env = "PDF2INDEX_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Drop failing pages/documents and report them instead of aborting.
    #[arg(long, env = "PDF2INDEX_CONTINUE_ON_ERROR")]
    continue_on_error: bool,

    /// Title each record from its own file instead of the first file.
    #[arg(long, env = "PDF2INDEX_PER_PAGE_TITLES")]
    per_page_titles: bool,

    /// Directory for `{title}.json` (default: current directory).
    #[arg(long, env = "PDF2INDEX_JSON_DIR")]
    json_dir: Option<PathBuf>,

    /// Author stamped on every record.
    #[arg(long, env = "PDF2INDEX_AUTHOR")]
    author: Option<String>,

    /// Publication date stamped on every record.
    #[arg(long, env = "PDF2INDEX_PUBLICATION_DATE")]
    publication_date: Option<String>,

    /// ISBN stamped on every record.
    #[arg(long, env = "PDF2INDEX_ISBN")]
    isbn: Option<String>,

    /// Record language (default: derived from the OCR language).
    #[arg(long, env = "PDF2INDEX_LANGUAGE")]
    language: Option<String>,

    /// Genres, comma separated.
    #[arg(long, env = "PDF2INDEX_GENRE", value_delimiter = ',')]
    genre: Vec<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2INDEX_PDF_PASSWORD")]
    pdf_password: Option<String>,

    /// Longest edge of rendered page images, in pixels.
    #[arg(long, env = "PDF2INDEX_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Directory containing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// tesseract binary.
    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Skip the index stage.
    #[arg(long, env = "PDF2INDEX_NO_INDEX")]
    no_index: bool,

    /// Print the run result as JSON on stdout.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    search: SearchArgs,
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// JSON file holding an array of documents.
    file: PathBuf,

    /// Keep indexing past rejected documents and report them.
    #[arg(long, env = "PDF2INDEX_CONTINUE_ON_ERROR")]
    continue_on_error: bool,

    #[command(flatten)]
    search: SearchArgs,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Elasticsearch base URL.
    #[arg(long, env = "ES_URL", conflicts_with = "cloud_id")]
    es_url: Option<String>,

    /// Elastic Cloud ID.
    #[arg(long, env = "ES_CLOUD_ID")]
    cloud_id: Option<String>,

    /// Basic-auth user name.
    #[arg(long, env = "ES_CLOUD_USERNAME")]
    es_username: Option<String>,

    /// Basic-auth password.
    #[arg(long, env = "ES_CLOUD_PASSWORD", hide_env_values = true)]
    es_password: Option<String>,

    /// API key.
    #[arg(long, env = "ES_API_KEY", hide_env_values = true)]
    es_api_key: Option<String>,

    /// Target index.
    #[arg(long, env = "ES_INDEX_NAME")]
    index_name: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "ES_TIMEOUT", default_value_t = 30)]
    es_timeout: u64,
}

impl SearchArgs {
    fn to_config(&self) -> Result<SearchConfig> {
        let mut config = match (&self.es_url, &self.cloud_id) {
            (Some(url), _) => SearchConfig::with_url(url),
            (None, Some(id)) => SearchConfig::with_cloud_id(id),
            (None, None) => bail!(
                "no search service configured: set ES_URL or ES_CLOUD_ID (or pass --no-index)"
            ),
        };
        config.username = self.es_username.clone();
        config.password = self.es_password.clone();
        config.api_key = self.es_api_key.clone();
        config.timeout_secs = self.es_timeout;
        config.validate()?;
        Ok(config)
    }

    fn index_name(&self) -> Result<&str> {
        self.index_name
            .as_deref()
            .ok_or_else(|| anyhow!("no index name: set ES_INDEX_NAME or pass --index-name"))
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Nested,
    Flat,
}

impl From<LayoutArg> for LayoutStyle {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::Nested => LayoutStyle::Nested,
            LayoutArg::Flat => LayoutStyle::Flat,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Environment variables from .env fill in anything the shell did not set.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let show_progress = !cli.quiet
        && !cli.no_progress
        && !matches!(cli.command, Command::Run(RunArgs { json: true, .. }));

    let _guard = match init_logging(&cli, show_progress) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {e:#}", red("error:"));
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Run(ref args) => run(&cli, args, show_progress).await,
        Command::Index(ref args) => index(&cli, args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", red("error:"));
            ExitCode::FAILURE
        }
    }
}

// ── Logging ──────────────────────────────────────────────────────────────────

/// Stderr logging, plus an optional JSON-lines file in `--log-dir`.
///
/// INFO-level library logs are suppressed on stderr while the progress bar
/// is active; the log file always records INFO and above.
fn init_logging(cli: &Cli, show_progress: bool) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let (file_layer, guard) = match cli.log_dir {
        Some(ref dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
            let path = dir.join(format!("pdf2index_{}.log", log_timestamp()));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("create log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let file_level = if cli.verbose { "debug" } else { "info" };
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new(file_level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    info!(
        "pdf2index {} started at {}",
        env!("CARGO_PKG_VERSION"),
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string())
    );
    Ok(guard)
}

/// `YYYYMMDD_HHMMSS` in local time, UTC when the offset is unknown.
fn log_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

// ── Commands ─────────────────────────────────────────────────────────────────

async fn run(cli: &Cli, args: &RunArgs, show_progress: bool) -> Result<ExitCode> {
    let search: Option<Arc<dyn SearchIndex>> = if args.no_index {
        None
    } else {
        let config = args.search.to_config()?;
        Some(Arc::new(
            ElasticsearchIndex::new(&config).context("Invalid search configuration")?,
        ))
    };

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress)?;

    let mut pdf = PdfiumBackend::from_config(&config);
    if let Some(ref dir) = args.pdfium_lib_path {
        pdf = pdf.library_dir(dir);
    }
    tokio::task::block_in_place(|| pdf.check_binding())?;

    let ocr = TesseractEngine::new().binary(&args.tesseract);
    if !ocr.is_available().await {
        bail!(
            "tesseract not found at '{}': install it (with the '{}' trained data) or set TESSERACT_PATH",
            args.tesseract.display(),
            config.effective_ocr_language()
        );
    }

    let mut pipeline = Pipeline::new(config, Arc::new(pdf), Arc::new(ocr));
    if let Some(search) = search {
        pipeline = pipeline.with_search(search);
    }

    let output = pipeline.run().await.context("Pipeline failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output);
    }

    Ok(if output.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

async fn index(cli: &Cli, args: &IndexArgs) -> Result<ExitCode> {
    let config = args.search.to_config()?;
    let index_name = args.search.index_name()?;
    let search = ElasticsearchIndex::new(&config).context("Invalid search configuration")?;
    let mode = if args.continue_on_error {
        FailureMode::ContinueOnError
    } else {
        FailureMode::FailFast
    };

    let report = reindex_json_file(&args.file, index_name, &search, mode)
        .await
        .with_context(|| format!("Indexing {} failed", args.file.display()))?;

    if !cli.quiet {
        print_index_report(&report);
    }
    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &RunArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let defaults = MetadataDefaults::default();
    let metadata = MetadataDefaults {
        author: args.author.clone().unwrap_or(defaults.author),
        publication_date: args
            .publication_date
            .clone()
            .unwrap_or(defaults.publication_date),
        isbn: args.isbn.clone().unwrap_or(defaults.isbn),
        language: args.language.clone(),
        genre: if args.genre.is_empty() {
            defaults.genre
        } else {
            args.genre.clone()
        },
    };

    let mut builder = PipelineConfig::builder()
        .input_file_path(&args.input)
        .output_dir(&args.output_dir)
        .ocr_language(&args.ocr_language)
        .layout(args.layout.into())
        .concurrency(args.concurrency)
        .failure_mode(if args.continue_on_error {
            FailureMode::ContinueOnError
        } else {
            FailureMode::FailFast
        })
        .title_policy(if args.per_page_titles {
            TitlePolicy::PerArtifact
        } else {
            TitlePolicy::FirstArtifact
        })
        .metadata(metadata)
        .max_rendered_pixels(args.max_pixels);

    if let Some(ref dir) = args.json_dir {
        builder = builder.json_output_dir(dir);
    }
    if let Some(ref pwd) = args.pdf_password {
        builder = builder.pdf_password(pwd);
    }
    if !args.no_index {
        builder = builder.index_name(args.search.index_name()?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

// ── Reporting ────────────────────────────────────────────────────────────────

fn print_summary(output: &PipelineOutput) {
    let stats = &output.stats;
    let mark = if output.is_clean() {
        green("✔")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {} pages  {} images  {} records  {}ms  →  {}",
        mark,
        stats.pages,
        stats.images,
        stats.records,
        stats.total_duration_ms,
        bold(&output.json_path.display().to_string()),
    );

    if !output.failures.is_empty() {
        eprintln!("{}", red(&format!("{} item(s) dropped:", output.failures.len())));
        for failure in &output.failures {
            eprintln!("  {} {}", red("✗"), failure);
        }
    }

    match output.index_report {
        Some(ref report) => print_index_report(report),
        None => eprintln!("   {}", dim("indexing skipped")),
    }
}

fn print_index_report(report: &IndexReport) {
    eprintln!(
        "   Indexed {}/{} documents into '{}'{}",
        report.succeeded(),
        report.submitted(),
        report.index,
        if report.refreshed {
            String::new()
        } else {
            red("  (refresh failed)")
        }
    );
    for outcome in report.failures() {
        if let IndexStatus::Failed { ref reason } = outcome.status {
            eprintln!(
                "  {} document {} ({}): {}",
                red("✗"),
                outcome.position,
                outcome.path.display(),
                reason
            );
        }
    }
}
