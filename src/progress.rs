//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the runner moves through its stages and items.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2index::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, stage: Stage, _path: &Path) {
//!         if stage == Stage::Split {
//!             self.pages.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .input_file_path("story.pdf")
//!     .progress_callback(Arc::new(CountingCallback { pages: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::artifact::Stage;
use crate::output::PipelineStats;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline runner as it processes each stage.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1`,
/// `on_item_complete` and `on_item_error` may be called from several
/// tasks at once. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the split stage opens the input.
    fn on_pipeline_start(&self, input: &Path) {
        let _ = input;
    }

    /// Called when a stage begins.
    ///
    /// # Arguments
    /// * `stage`       — the stage starting
    /// * `total_items` — number of input items, 0 when unknown up front
    fn on_stage_start(&self, stage: Stage, total_items: usize) {
        let _ = (stage, total_items);
    }

    /// Called when one item of a stage finished; `path` is the input item.
    fn on_item_complete(&self, stage: Stage, path: &Path) {
        let _ = (stage, path);
    }

    /// Called when one item of a stage failed.
    fn on_item_error(&self, stage: Stage, path: &Path, error: &str) {
        let _ = (stage, path, error);
    }

    /// Called when a stage has produced its full output.
    fn on_stage_complete(&self, stage: Stage, produced: usize, failed: usize) {
        let _ = (stage, produced, failed);
    }

    /// Called once after the last stage.
    fn on_pipeline_complete(&self, stats: &PipelineStats) {
        let _ = stats;
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        items: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_stage_start(&self, stage: Stage, _total: usize) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_item_complete(&self, _stage: Stage, _path: &Path) {
            self.items.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, _stage: Stage, _path: &Path, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_pipeline_start(Path::new("a.pdf"));
        cb.on_stage_start(Stage::Split, 3);
        cb.on_item_complete(Stage::Split, Path::new("a_page_1.pdf"));
        cb.on_item_error(Stage::Rasterize, Path::new("a_page_2.pdf"), "boom");
        cb.on_stage_complete(Stage::Split, 3, 0);
        cb.on_pipeline_complete(&PipelineStats::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();
        cb.on_stage_start(Stage::Split, 2);
        cb.on_item_complete(Stage::Split, Path::new("x"));
        cb.on_item_complete(Stage::Split, Path::new("y"));
        cb.on_stage_start(Stage::Rasterize, 2);
        cb.on_item_error(Stage::Rasterize, Path::new("x"), "bad");

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Split, Stage::Rasterize]
        );
        assert_eq!(tracker.items.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
