//! Configuration for the upload flow and vendor client.
//!
//! All behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. Callers set only what they care about and rely on
//! the documented defaults for the rest.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use crate::validate::MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default vendor endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Default OCR model.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Configuration for one upload flow.
///
/// # Example
/// ```rust
/// use ocr_scanner::{OcrConfig, UploadMode};
///
/// let config = OcrConfig::builder()
///     .api_key("sk-test")
///     .upload_mode(UploadMode::Inline)
///     .request_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "mistral-ocr-latest");
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Vendor API key. If None, `MISTRAL_API_KEY` is read when the client is built.
    pub api_key: Option<String>,

    /// Vendor base URL without a trailing slash. Default: `https://api.mistral.ai`.
    pub base_url: String,

    /// OCR model identifier. Default: `mistral-ocr-latest`.
    pub model: String,

    /// Per-request HTTP timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Lifetime requested for signed URLs, in hours. Default: 24.
    pub signed_url_expiry_hours: u32,

    /// Ask the vendor to embed extracted images as base64. Default: true.
    ///
    /// Without it every image reference in the result stays unmatched.
    pub include_image_base64: bool,

    /// How the file reaches the vendor. Default: [`UploadMode::SignedUrl`].
    pub upload_mode: UploadMode,

    /// Largest accepted file in bytes. Default: 5 MiB.
    pub max_file_size: u64,

    /// Receives stage events while a flow runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 120,
            signed_url_expiry_hours: 24,
            include_image_base64: true,
            upload_mode: UploadMode::default(),
            max_file_size: MAX_FILE_SIZE,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("signed_url_expiry_hours", &self.signed_url_expiry_hours)
            .field("include_image_base64", &self.include_image_base64)
            .field("upload_mode", &self.upload_mode)
            .field("max_file_size", &self.max_file_size)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn FlowProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured API key, falling back to `MISTRAL_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String, OcrError> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(OcrError::MissingApiKey),
        }
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.signed_url_expiry_hours = hours;
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    pub fn upload_mode(mut self, mode: UploadMode) -> Self {
        self.config.upload_mode = mode;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(OcrError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.model.trim().is_empty() {
            return Err(OcrError::InvalidConfig("model must not be empty".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(OcrError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.signed_url_expiry_hours == 0 {
            return Err(OcrError::InvalidConfig(
                "signed URL expiry must be ≥ 1 hour".into(),
            ));
        }
        if c.max_file_size == 0 || c.max_file_size > MAX_FILE_SIZE {
            return Err(OcrError::InvalidConfig(format!(
                "max file size must be 1–{} bytes, got {}",
                MAX_FILE_SIZE, c.max_file_size
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the selected file reaches the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploadMode {
    /// Upload the file, fetch a signed URL for it, then run OCR on that URL. (default)
    #[default]
    SignedUrl,
    /// Skip the upload and send the file as a `data:` URL in the OCR request.
    Inline,
}
