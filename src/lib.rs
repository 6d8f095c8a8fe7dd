//! # ocr-scanner
//!
//! Send a PDF or image to the Mistral OCR service and render what comes
//! back: paginated Markdown with embedded images and typeset math.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Validate  ≤ 5 MiB, PDF / JPEG / JPG / PNG
//!  ├─ 2. Vendor    upload → signed URL → OCR   (or one inline data: URL)
//!  ├─ 3. Store     last result + loading flag + error, persisted as JSON
//!  └─ 4. Render    per page: images → Markdown tree → MathML
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_scanner::{process_file, ImageMatch, MathMlEngine, OcrConfig, PageView, ResultStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from MISTRAL_API_KEY
//!     let config = OcrConfig::builder().build()?;
//!     let store = ResultStore::in_memory();
//!     let result = process_file("invoice.pdf", None, &config, &store).await?;
//!
//!     let mut view = PageView::new(&result, ImageMatch::Auto);
//!     view.pager_mut().next();
//!     if let Some(page) = view.render(&MathMlEngine) {
//!         println!("{}\n{}", page.label, page.html);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrscan` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! ocr-scanner = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod flow;
pub mod output;
pub mod progress;
pub mod render;
pub mod store;
pub mod validate;
pub mod vendor;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrConfig, OcrConfigBuilder, UploadMode};
pub use error::{OcrError, RenderError};
pub use export::{export_markdown, write_output};
pub use flow::{process_file, process_upload, FileUpload};
pub use output::{ImageRef, OcrPage, OcrResponse, PageDimensions, UsageInfo};
pub use progress::{FlowProgressCallback, FlowStage, NoopProgressCallback, ProgressCallback};
pub use render::images::{reconcile_images, ImageMatch};
pub use render::math::{MathDisplay, MathEngine, MathMlEngine};
pub use render::{render_document_html, render_page};
pub use store::{FileStorage, MemoryStorage, ResultState, ResultStore, StateStorage};
pub use validate::{validate_file, validate_selection, FileCandidate, ValidationReport};
pub use vendor::{DocumentKind, FileHandle, MistralClient, OcrVendor};
pub use view::{PageView, Pager, RenderedPage};
