//! Integration tests for the full split → OCR → index pipeline.
//!
//! pdfium and tesseract are replaced by the fakes in `common`, and the
//! search service by `InMemoryIndex`, so these run anywhere:
//!
//!   cargo test --test pipeline

mod common;

use common::{write_pdf, FakeOcr, FakePdf, Workspace};
use edgequake_pdf2index::{
    load_documents, reindex_json_file, ErrorKind, FailureMode, InMemoryIndex, IndexStatus,
    LayoutStyle, Pipeline, PipelineConfig, PipelineConfigBuilder, PipelineError,
    PipelineProgressCallback, PipelineStats, Stage,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config(ws: &Workspace, input: &Path) -> PipelineConfigBuilder {
    PipelineConfig::builder()
        .input_file_path(input)
        .output_dir(ws.out())
        .json_output_dir(ws.json())
        .ocr_language("eng")
}

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(config, Arc::new(FakePdf), Arc::new(FakeOcr::default()))
}

fn file_names(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| {
            p.as_ref()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string()
        })
        .collect()
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_page_story_end_to_end() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["Once", "upon", "a time"]);

    let search = Arc::new(InMemoryIndex::new());
    let cfg = config(&ws, &input).index_name("ebooks").build().unwrap();
    let output = pipeline(cfg).with_search(search.clone()).run().await.unwrap();

    let out = ws.out();
    for n in 1..=3 {
        assert!(out.join(format!("story/extracted_pdfs/story_page_{n}.pdf")).is_file());
        assert!(out.join(format!("story/extracted_images/story_page_{n}.png")).is_file());
        assert!(out.join(format!("story/extracted_text/story_page_{n}.txt")).is_file());
    }
    assert_eq!(output.book_id, "story");
    assert_eq!(
        file_names(output.pages.iter().map(|a| &a.path)),
        ["story_page_1.pdf", "story_page_2.pdf", "story_page_3.pdf"]
    );

    // story.json: 3 objects, all titled "story".
    assert_eq!(output.json_path, ws.json().join("story.json"));
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output.json_path).unwrap()).unwrap();
    let array = raw.as_array().unwrap();
    assert_eq!(array.len(), 3);
    assert!(array.iter().all(|d| d["title"] == "story"));
    assert_eq!(array[1]["content"], "Text of story_page_2 [eng]\n");
    assert!(array[2]["content_as_image"]
        .as_str()
        .unwrap()
        .ends_with("story/extracted_images/story_page_3.png"));

    // Indexed and searchable after refresh.
    let report = output.index_report.as_ref().unwrap();
    assert!(report.is_complete());
    assert_eq!(output.stats.indexed, 3);
    let hits = search.search("ebooks", "story_page_2");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1["title"], "story");

    assert!(output.is_clean());
    assert_eq!(output.stats.pages, 3);
    assert_eq!(output.stats.records, 3);
    let stages: Vec<_> = output.stats.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ALL);
}

#[tokio::test]
async fn test_flat_layout() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a", "b"]);

    let cfg = config(&ws, &input).layout(LayoutStyle::Flat).build().unwrap();
    let output = pipeline(cfg).run().await.unwrap();

    let out = ws.out();
    assert!(out.join("story_page_1.pdf").is_file());
    assert!(out.join("extracted_images/story_page_2.png").is_file());
    assert!(out.join("extracted_text/story_page_2.txt").is_file());
    assert_eq!(output.documents.len(), 2);
    assert!(output.index_report.is_none());
}

#[tokio::test]
async fn test_persisted_records_round_trip() {
    let ws = Workspace::new();
    let input = ws.input("kural.pdf");
    write_pdf(&input, &["one", "two"]);

    let cfg = config(&ws, &input).ocr_language("tam").build().unwrap();
    let output = pipeline(cfg).run().await.unwrap();

    let back = load_documents(&output.json_path).await.unwrap();
    assert_eq!(back, output.documents.records);
    assert_eq!(back[0].language, "Tamil");
    assert_eq!(back[0].content, "Text of kural_page_1 [tam]\n");
}

#[tokio::test]
async fn test_fan_out_page_produces_extra_records() {
    let ws = Workspace::new();
    let input = ws.input("atlas.pdf");
    write_pdf(&input, &["map", "FANOUT", "index"]);

    let output = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(output.stats.pages, 3);
    assert_eq!(output.stats.images, 4);
    assert_eq!(
        file_names(output.images.iter().map(|a| &a.path)),
        [
            "atlas_page_1.png",
            "atlas_page_2.png",
            "atlas_page_2_2.png",
            "atlas_page_3.png"
        ]
    );
    let pages: Vec<_> = output.texts.iter().map(|a| a.page_index).collect();
    assert_eq!(pages, [1, 2, 2, 3]);
    assert_eq!(output.documents.len(), 4);
}

#[tokio::test]
async fn test_concurrency_keeps_page_order() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["1", "2", "3", "4", "5"]);

    let cfg = config(&ws, &input).concurrency(4).build().unwrap();
    let output = Pipeline::new(cfg, Arc::new(FakePdf), Arc::new(FakeOcr::staggered()))
        .run()
        .await
        .unwrap();

    let contents: Vec<_> = output
        .documents
        .iter()
        .map(|r| r.content.trim().to_string())
        .collect();
    assert_eq!(
        contents,
        (1..=5)
            .map(|n| format!("Text of story_page_{n} [eng]"))
            .collect::<Vec<_>>()
    );
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fail_fast_aborts_and_keeps_partial_artifacts() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["fine", "CORRUPT", "fine"]);

    let err = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert_eq!(err.stage(), Some(Stage::Rasterize));
    assert!(err
        .artifact_path()
        .unwrap()
        .ends_with("story/extracted_pdfs/story_page_2.pdf"));

    // No rollback: split pages stay on disk, no JSON was written.
    assert!(ws.out().join("story/extracted_pdfs/story_page_3.pdf").is_file());
    assert!(!ws.json().join("story.json").exists());
}

#[tokio::test]
async fn test_continue_on_error_reports_dropped_page() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["fine", "CORRUPT", "fine"]);

    let cfg = config(&ws, &input)
        .failure_mode(FailureMode::ContinueOnError)
        .build()
        .unwrap();
    let output = pipeline(cfg).run().await.unwrap();

    assert_eq!(output.failures.len(), 1);
    let failure = &output.failures[0];
    assert_eq!(failure.stage, Stage::Rasterize);
    assert_eq!(failure.kind, ErrorKind::Conversion);
    assert!(failure.path.ends_with("story_page_2.pdf"));

    assert_eq!(output.documents.len(), 2);
    let images: Vec<_> = output
        .documents
        .iter()
        .map(|r| r.content_source_image_path.clone())
        .collect();
    assert_eq!(file_names(images), ["story_page_1.png", "story_page_3.png"]);
    assert!(!output.is_clean());
    assert_eq!(output.stats.failed_items, 1);
}

#[tokio::test]
async fn test_ocr_failure_in_continue_mode() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a", "b"]);

    let cfg = config(&ws, &input)
        .failure_mode(FailureMode::ContinueOnError)
        .build()
        .unwrap();
    let output = Pipeline::new(cfg, Arc::new(FakePdf), Arc::new(FakeOcr::failing_on("story_page_1")))
        .run()
        .await
        .unwrap();

    assert_eq!(output.failures[0].stage, Stage::Recognize);
    assert_eq!(output.failures[0].kind, ErrorKind::Recognition);
    // The first surviving text now defines the batch title.
    assert_eq!(output.documents.title, "story");
    assert_eq!(output.documents.len(), 1);
}

#[tokio::test]
async fn test_rejected_document_is_listed_not_dropped() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a", "b", "c"]);

    let search = Arc::new(InMemoryIndex::new().fail_on_content("story_page_2"));
    let cfg = config(&ws, &input)
        .index_name("ebooks")
        .failure_mode(FailureMode::ContinueOnError)
        .build()
        .unwrap();
    let output = pipeline(cfg).with_search(search.clone()).run().await.unwrap();

    let report = output.index_report.as_ref().unwrap();
    assert_eq!(report.submitted(), 3);
    assert_eq!(report.succeeded(), 2);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].position, 1);
    assert!(failed[0]
        .path
        .ends_with("story/extracted_images/story_page_2.png"));
    assert!(matches!(failed[0].status, IndexStatus::Failed { .. }));
    assert!(report.refreshed);
    assert!(!output.is_clean());
    assert_eq!(search.visible_count("ebooks"), 2);
}

#[tokio::test]
async fn test_rejected_document_fails_fast_by_default() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a", "b", "c"]);

    let search = Arc::new(InMemoryIndex::new().fail_on_content("story_page_2"));
    let cfg = config(&ws, &input).index_name("ebooks").build().unwrap();
    let err = pipeline(cfg).with_search(search).run().await.unwrap_err();
    assert!(matches!(err, PipelineError::IndexError { position: 1, .. }));
    assert_eq!(err.stage(), Some(Stage::Index));
    assert!(err
        .artifact_path()
        .unwrap()
        .ends_with("story/extracted_images/story_page_2.png"));
    // Persist ran before the failing stage.
    assert!(ws.json().join("story.json").is_file());
}

#[tokio::test]
async fn test_input_errors() {
    let ws = Workspace::new();

    let missing = ws.input("missing.pdf");
    let err = pipeline(config(&ws, &missing).build().unwrap())
        .run()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Read);
    assert!(err.to_string().contains("missing.pdf"));

    let text = ws.input("notes.pdf");
    std::fs::create_dir_all(text.parent().unwrap()).unwrap();
    std::fs::write(&text, "plain text").unwrap();
    let err = pipeline(config(&ws, &text).build().unwrap())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ReadError { stage: Stage::Split, .. }));
}

#[tokio::test]
async fn test_zero_page_pdf_is_empty_batch() {
    let ws = Workspace::new();
    let input = ws.input("blank.pdf");
    write_pdf(&input, &[]);

    let err = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::EmptyBatch {
            stage: Stage::Assemble
        }
    ));
}

#[tokio::test]
async fn test_search_without_index_name_is_rejected() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a"]);

    let err = pipeline(config(&ws, &input).build().unwrap())
        .with_search(Arc::new(InMemoryIndex::new()))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    // Nothing was written.
    assert!(!ws.out().exists());
}

#[tokio::test]
async fn test_leading_underscore_book_keeps_a_named_json() {
    let ws = Workspace::new();
    let input = ws.input("_draft.pdf");
    write_pdf(&input, &["a", "b"]);

    let output = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap();
    assert_eq!(output.documents.title, "_draft");
    assert_eq!(output.json_path, ws.json().join("_draft.json"));
    assert!(!ws.json().join(".json").exists());
}

// ── Reruns and re-indexing ───────────────────────────────────────────────────

#[tokio::test]
async fn test_rerun_overwrites_artifacts() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a", "b", "c"]);

    let first = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap();
    let second = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap();
    assert_eq!(first.pages, second.pages);
    assert_eq!(first.documents, second.documents);
    let pdf_dir = ws.out().join("story/extracted_pdfs");
    assert_eq!(std::fs::read_dir(&pdf_dir).unwrap().count(), 3);

    // A shorter source replaces the JSON; stale page files are not removed.
    write_pdf(&input, &["a"]);
    let third = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap();
    assert_eq!(load_documents(&third.json_path).await.unwrap().len(), 1);
    assert_eq!(std::fs::read_dir(&pdf_dir).unwrap().count(), 3);
}

#[tokio::test]
async fn test_reindex_persisted_file() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a", "b"]);
    let output = pipeline(config(&ws, &input).build().unwrap())
        .run()
        .await
        .unwrap();

    let search = InMemoryIndex::new();
    let report = reindex_json_file(&output.json_path, "ebooks", &search, FailureMode::FailFast)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(search.search("ebooks", "story_page_").len(), 2);
}

// ── Progress callback ────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for Recorder {
    fn on_pipeline_start(&self, _input: &Path) {
        self.events.lock().unwrap().push("start".into());
    }

    fn on_stage_start(&self, stage: Stage, total: usize) {
        self.events.lock().unwrap().push(format!("{stage}:{total}"));
    }

    fn on_stage_complete(&self, stage: Stage, produced: usize, failed: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{stage}={produced}/{failed}"));
    }

    fn on_pipeline_complete(&self, stats: &PipelineStats) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done:{}", stats.records));
    }
}

#[tokio::test]
async fn test_progress_events_follow_stage_order() {
    let ws = Workspace::new();
    let input = ws.input("story.pdf");
    write_pdf(&input, &["a", "b"]);

    let recorder = Arc::new(Recorder::default());
    let cfg = config(&ws, &input)
        .index_name("ebooks")
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    pipeline(cfg)
        .with_search(Arc::new(InMemoryIndex::new()))
        .run()
        .await
        .unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "start",
            "split:2",
            "split=2/0",
            "rasterize:2",
            "rasterize=2/0",
            "recognize:2",
            "recognize=2/0",
            "assemble:2",
            "assemble=2/0",
            "index:2",
            "index=2/0",
            "done:2",
        ]
    );
}
