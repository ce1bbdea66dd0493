//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the run moves through its stages. The binary uses it to drive a
//! terminal spinner; a web host could forward the same events to a socket.
//!
//! # Example
//!
//! ```rust
//! use arxiv_insights::{AnalysisConfig, AnalysisProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage, detail: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} done: {detail}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The linear stages of one analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Parse the user-supplied identifier or URL.
    Normalize,
    /// Download (or wrap) the PDF bytes.
    Fetch,
    /// Convert PDF bytes into plain text.
    Extract,
    /// Call the inference service.
    Analyze,
    /// Serialise the record to JSON.
    Export,
}

impl Stage {
    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize identifier",
            Stage::Fetch => "fetch document",
            Stage::Extract => "extract text",
            Stage::Analyze => "analyze paper",
            Stage::Export => "export analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the pipeline as it enters and leaves each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. A run is single-threaded, but the trait is
/// `Send + Sync` so one callback can be shared by runs on different tasks.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    ///
    /// # Arguments
    /// * `stage`: the stage that finished
    /// * `detail`: short summary (e.g. "48213 characters from 12/12 pages")
    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// Called when a stage fails; the run halts right after.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl AnalysisProgressCallback for RecordingCallback {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage:?}"));
        }

        fn on_stage_complete(&self, stage: Stage, _detail: &str) {
            self.events.lock().unwrap().push(format!("done:{stage:?}"));
        }

        fn on_stage_error(&self, stage: Stage, _error: &str) {
            self.events.lock().unwrap().push(format!("error:{stage:?}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Fetch);
        cb.on_stage_complete(Stage::Fetch, "1024 bytes");
        cb.on_stage_error(Stage::Extract, "not a PDF");
    }

    #[test]
    fn recording_callback_receives_events_in_order() {
        let cb = RecordingCallback::default();
        cb.on_stage_start(Stage::Fetch);
        cb.on_stage_complete(Stage::Fetch, "");
        cb.on_stage_start(Stage::Extract);
        cb.on_stage_error(Stage::Extract, "corrupt");

        let events = cb.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["start:Fetch", "done:Fetch", "start:Extract", "error:Extract"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Analyze);
        cb.on_stage_complete(Stage::Analyze, "7 sections");
    }

    #[test]
    fn stage_display_uses_label() {
        assert_eq!(Stage::Extract.to_string(), "extract text");
    }
}
