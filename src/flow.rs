//! The upload flow: validate, send to the vendor, store the result.
//!
//! ```text
//! FileUpload
//!  │
//!  ├─ 1. Validate   size + declared type (no vendor call on failure)
//!  ├─ 2. Upload     multipart upload           ┐ SignedUrl mode
//!  ├─ 3. SignedUrl  temporary URL for the file ┘
//!  ├─ 4. Ocr        OCR on the signed URL, or on a data: URL in Inline mode
//!  └─ 5. Store      set_data + clear loading
//! ```
//!
//! Stages run one after another on the caller's runtime. The first failure,
//! including a failure to persist the result, aborts the flow: its message
//! is written to the store (which clears the loading flag) and the error is
//! returned.

use crate::config::{OcrConfig, UploadMode};
use crate::error::OcrError;
use crate::output::OcrResponse;
use crate::progress::{FlowProgressCallback, FlowStage, NoopProgressCallback};
use crate::store::ResultStore;
use crate::validate::{validate_file_with_limit, FileCandidate, MAX_FILE_SIZE};
use crate::vendor::{data_url, DocumentKind, MistralClient, OcrVendor};
use std::future::Future;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A selected file and its contents.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub candidate: FileCandidate,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    /// An in-memory file; its size is the length of `bytes`.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            candidate: FileCandidate::new(name, bytes.len() as u64, mime_type),
            bytes,
        }
    }

    /// Describe and read a file on disk.
    ///
    /// Files above the hard size limit are not read; they fail validation.
    pub async fn from_path(path: impl AsRef<Path>, mime_override: Option<&str>) -> Result<Self, OcrError> {
        let path = path.as_ref();
        let candidate = FileCandidate::from_path(path, mime_override)?;
        let bytes = if candidate.size <= MAX_FILE_SIZE {
            tokio::fs::read(path).await.map_err(|_| OcrError::FileNotFound {
                path: path.to_path_buf(),
            })?
        } else {
            Vec::new()
        };
        Ok(Self { candidate, bytes })
    }
}

/// Run one upload through `vendor`, recording progress in `store`.
///
/// # Errors
/// * [`OcrError::Validation`] before any vendor call when the file is rejected
/// * [`OcrError::VendorUpload`], [`OcrError::VendorUrl`] or
///   [`OcrError::VendorProcessing`] from the failing vendor call
/// * [`OcrError::StateWriteFailed`] when the result cannot be persisted
pub async fn process_upload(
    vendor: &dyn OcrVendor,
    store: &ResultStore,
    upload: FileUpload,
    config: &OcrConfig,
) -> Result<OcrResponse, OcrError> {
    let total_start = Instant::now();
    let noop = NoopProgressCallback;
    let cb: &dyn FlowProgressCallback = config.progress_callback.as_deref().unwrap_or(&noop);
    info!(
        "Processing '{}' ({} bytes, {})",
        upload.candidate.name, upload.candidate.size, upload.candidate.mime_type
    );

    let outcome = match run_stages(vendor, store, upload, config, cb).await {
        Ok(response) => commit(store, &response).map(|()| response),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(response) => {
            let page_count = response.page_count();
            cb.on_flow_complete(page_count);
            info!(
                "OCR complete: {} pages in {}ms",
                page_count,
                total_start.elapsed().as_millis()
            );
            Ok(response)
        }
        Err((stage, e)) => {
            warn!("{} failed: {}", stage, e);
            if let Err(store_err) = store.set_error(e.user_message()) {
                warn!("Could not record the error in the result store: {}", store_err);
            }
            cb.on_flow_error(stage, &e.user_message());
            Err(e)
        }
    }
}

/// Record a successful result and leave the loading state.
fn commit(store: &ResultStore, response: &OcrResponse) -> Result<(), (FlowStage, OcrError)> {
    store
        .set_data(response.clone())
        .and_then(|()| store.set_loading(false))
        .map_err(|e| (FlowStage::Store, e))
}

/// Validate, then drive the vendor calls for the configured upload mode.
async fn run_stages(
    vendor: &dyn OcrVendor,
    store: &ResultStore,
    upload: FileUpload,
    config: &OcrConfig,
    cb: &dyn FlowProgressCallback,
) -> Result<OcrResponse, (FlowStage, OcrError)> {
    let FileUpload { candidate, bytes } = upload;

    timed(cb, FlowStage::Validate, async {
        validate_file_with_limit(&candidate, config.max_file_size).into_result()
    })
    .await?;

    store
        .set_loading(true)
        .map_err(|e| (FlowStage::Validate, e))?;

    let kind = DocumentKind::from_mime(&candidate.mime_type);
    let url = match config.upload_mode {
        UploadMode::SignedUrl => {
            let handle = timed(cb, FlowStage::Upload, vendor.upload_file(&candidate.name, bytes)).await?;
            timed(cb, FlowStage::SignedUrl, vendor.get_signed_url(&handle)).await?
        }
        UploadMode::Inline => {
            debug!("Inline mode: sending '{}' as a data URL", candidate.name);
            data_url(&candidate.mime_type, &bytes)
        }
    };

    timed(cb, FlowStage::Ocr, vendor.run_ocr(&url, kind)).await
}

/// Run one stage, reporting its start and completion.
async fn timed<T>(
    cb: &dyn FlowProgressCallback,
    stage: FlowStage,
    fut: impl Future<Output = Result<T, OcrError>>,
) -> Result<T, (FlowStage, OcrError)> {
    let start = Instant::now();
    cb.on_stage_start(stage);
    let value = fut.await.map_err(|e| (stage, e))?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    debug!("{} took {}ms", stage, elapsed_ms);
    cb.on_stage_complete(stage, elapsed_ms);
    Ok(value)
}

/// Process a file on disk with the Mistral client built from `config`.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use ocr_scanner::{process_file, OcrConfig, ResultStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::builder().build()?;
/// let store = ResultStore::in_memory();
/// let result = process_file("scan.pdf", None, &config, &store).await?;
/// println!("{} pages", result.page_count());
/// # Ok(())
/// # }
/// ```
pub async fn process_file(
    path: impl AsRef<Path>,
    mime_override: Option<&str>,
    config: &OcrConfig,
    store: &ResultStore,
) -> Result<OcrResponse, OcrError> {
    let upload = FileUpload::from_path(path, mime_override).await?;
    let client = MistralClient::new(config)?;
    process_upload(&client, store, upload, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OcrPage;
    use crate::store::{ResultState, StateStorage};
    use crate::vendor::FileHandle;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ScriptedVendor {
        calls: Mutex<Vec<String>>,
        fail_ocr: bool,
    }

    #[async_trait]
    impl OcrVendor for ScriptedVendor {
        async fn upload_file(&self, name: &str, _bytes: Vec<u8>) -> Result<FileHandle, OcrError> {
            self.calls.lock().unwrap().push(format!("upload:{name}"));
            Ok(FileHandle::new("file-1"))
        }

        async fn get_signed_url(&self, handle: &FileHandle) -> Result<String, OcrError> {
            self.calls.lock().unwrap().push(format!("url:{}", handle.id));
            Ok("https://signed/file-1".into())
        }

        async fn run_ocr(&self, url: &str, kind: DocumentKind) -> Result<OcrResponse, OcrError> {
            let scheme = url.split(':').next().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(format!("ocr:{scheme}:{kind:?}"));
            if self.fail_ocr {
                return Err(OcrError::VendorProcessing {
                    reason: "HTTP 500".into(),
                });
            }
            Ok(OcrResponse {
                pages: vec![OcrPage {
                    index: 0,
                    markdown: "hello".into(),
                    images: vec![],
                    dimensions: None,
                }],
                model: "test".into(),
                usage_info: None,
            })
        }
    }

    #[derive(Default)]
    struct Stages(Mutex<Vec<String>>);

    impl FlowProgressCallback for Stages {
        fn on_stage_start(&self, stage: FlowStage) {
            self.0.lock().unwrap().push(format!("start:{stage:?}"));
        }
        fn on_flow_complete(&self, page_count: usize) {
            self.0.lock().unwrap().push(format!("done:{page_count}"));
        }
        fn on_flow_error(&self, stage: FlowStage, _error: &str) {
            self.0.lock().unwrap().push(format!("error:{stage:?}"));
        }
    }

    fn pdf() -> FileUpload {
        FileUpload::new("a.pdf", "application/pdf", b"%PDF-1.4".to_vec())
    }

    #[tokio::test]
    async fn signed_url_flow_calls_vendor_in_order() {
        let vendor = ScriptedVendor::default();
        let store = ResultStore::in_memory();
        let stages = Arc::new(Stages::default());
        let config = OcrConfig::builder()
            .progress_callback(stages.clone())
            .build()
            .unwrap();

        let res = process_upload(&vendor, &store, pdf(), &config).await.unwrap();
        assert_eq!(res.page_count(), 1);
        assert_eq!(
            *vendor.calls.lock().unwrap(),
            vec!["upload:a.pdf", "url:file-1", "ocr:https:Pdf"]
        );
        assert_eq!(
            *stages.0.lock().unwrap(),
            vec!["start:Validate", "start:Upload", "start:SignedUrl", "start:Ocr", "done:1"]
        );

        let state = store.snapshot();
        assert_eq!(state.data, Some(res));
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn inline_flow_skips_upload() {
        let vendor = ScriptedVendor::default();
        let store = ResultStore::in_memory();
        let config = OcrConfig::builder().upload_mode(UploadMode::Inline).build().unwrap();
        let png = FileUpload::new("a.png", "image/png", vec![0x89, b'P', b'N', b'G']);

        process_upload(&vendor, &store, png, &config).await.unwrap();
        assert_eq!(*vendor.calls.lock().unwrap(), vec!["ocr:data:Image"]);
    }

    #[tokio::test]
    async fn rejected_file_never_reaches_vendor() {
        let vendor = ScriptedVendor::default();
        let store = ResultStore::in_memory();
        let config = OcrConfig::default();
        let gif = FileUpload::new("a.gif", "image/gif", vec![0; 16]);

        let err = process_upload(&vendor, &store, gif, &config).await.unwrap_err();
        assert!(matches!(err, OcrError::Validation { .. }));
        assert!(vendor.calls.lock().unwrap().is_empty());
        assert_eq!(
            store.snapshot().error.as_deref(),
            Some("File type must be PDF, JPEG, JPG, or PNG")
        );
    }

    #[tokio::test]
    async fn vendor_failure_sets_error_and_clears_loading() {
        let vendor = ScriptedVendor {
            fail_ocr: true,
            ..Default::default()
        };
        let store = ResultStore::in_memory();
        let stages = Arc::new(Stages::default());
        let config = OcrConfig::builder()
            .progress_callback(stages.clone())
            .build()
            .unwrap();

        let err = process_upload(&vendor, &store, pdf(), &config).await.unwrap_err();
        assert!(matches!(err, OcrError::VendorProcessing { .. }));
        let state = store.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some("OCR processing failed: HTTP 500"));
        assert_eq!(stages.0.lock().unwrap().last().map(String::as_str), Some("error:Ocr"));
    }

    /// Accepts every save until one carries a result.
    struct RejectsResults;

    impl StateStorage for RejectsResults {
        fn load(&self) -> Result<ResultState, OcrError> {
            Ok(ResultState::default())
        }
        fn save(&self, state: &ResultState) -> Result<(), OcrError> {
            if state.data.is_some() {
                return Err(OcrError::StateWriteFailed {
                    path: "ocr-storage.json".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_result_save_clears_loading_and_reports() {
        let vendor = ScriptedVendor::default();
        let store = ResultStore::open(RejectsResults).unwrap();
        let stages = Arc::new(Stages::default());
        let config = OcrConfig::builder()
            .progress_callback(stages.clone())
            .build()
            .unwrap();

        let err = process_upload(&vendor, &store, pdf(), &config).await.unwrap_err();
        assert!(matches!(err, OcrError::StateWriteFailed { .. }), "got {err:?}");

        let state = store.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.error, Some(err.user_message()));
        assert_eq!(stages.0.lock().unwrap().last().map(String::as_str), Some("error:Store"));
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let upload = FileUpload::from_path(&path, None).await.unwrap();
        assert_eq!(upload.candidate.name, "scan.png");
        assert_eq!(upload.candidate.mime_type, "image/png");
        assert_eq!(upload.bytes, b"not really a png");
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = FileUpload::from_path("/definitely/not/here.pdf", None).await.unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }));
    }
}
