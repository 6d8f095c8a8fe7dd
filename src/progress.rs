//! Progress-callback trait for upload-flow stage events.
//!
//! Inject an [`Arc<dyn FlowProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to be told when
//! each vendor call starts and finishes. The vendor reports no transfer
//! progress, so events are per stage; a front end should show an
//! indeterminate indicator labelled with the current stage rather than a
//! percentage.
//!
//! # Example
//!
//! ```rust
//! use ocr_scanner::{FlowProgressCallback, FlowStage, OcrConfig};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StageLog(Mutex<Vec<FlowStage>>);
//!
//! impl FlowProgressCallback for StageLog {
//!     fn on_stage_start(&self, stage: FlowStage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(Arc::new(StageLog::default()) as Arc<dyn FlowProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// One step of the upload flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowStage {
    /// Size and type checks.
    Validate,
    /// File upload to the vendor.
    Upload,
    /// Signed URL retrieval.
    SignedUrl,
    /// OCR processing.
    Ocr,
    /// Writing the result to the store.
    Store,
}

impl FlowStage {
    pub fn label(self) -> &'static str {
        match self {
            FlowStage::Validate => "Validating",
            FlowStage::Upload => "Uploading",
            FlowStage::SignedUrl => "Signing URL",
            FlowStage::Ocr => "Running OCR",
            FlowStage::Store => "Saving result",
        }
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the upload flow as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run strictly one after another.
pub trait FlowProgressCallback: Send + Sync {
    /// Called just before a stage begins.
    fn on_stage_start(&self, stage: FlowStage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    ///
    /// # Arguments
    /// * `stage`:      the finished stage
    /// * `elapsed_ms`: wall-clock time the stage took
    fn on_stage_complete(&self, stage: FlowStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called once when the whole flow succeeded.
    ///
    /// # Arguments
    /// * `page_count`: pages in the OCR result
    fn on_flow_complete(&self, page_count: usize) {
        let _ = page_count;
    }

    /// Called once when a stage failed and the flow was aborted.
    fn on_flow_error(&self, stage: FlowStage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FlowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn FlowProgressCallback>;
