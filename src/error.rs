//! Error types for the ocr-scanner library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrError`]: **Fatal** for the current upload attempt: the file was
//!   rejected, a vendor call failed, or the state file could not be written.
//!   Returned as `Err(OcrError)` from [`crate::flow::process_upload`] and the
//!   vendor adapter. The flow is aborted and the message is surfaced verbatim.
//!
//! * [`RenderError`]: **Non-fatal**: a single math segment could not be
//!   typeset. It is contained to that segment, which degrades to literal
//!   text; the rest of the page renders normally.
//!
//! An image reference that matches no image is not an error at all; the
//! reference is passed through unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr-scanner library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The selected file violates the size or type rules.
    ///
    /// `issues` holds one human-readable message per violated rule.
    #[error("{}", issues.join("; "))]
    Validation { issues: Vec<String> },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    // ── Vendor errors ─────────────────────────────────────────────────────
    /// Upload to the OCR vendor failed (transport or authentication).
    #[error("Upload failed: {reason}")]
    VendorUpload { reason: String },

    /// The vendor could not issue a signed URL for the uploaded file.
    #[error("Could not get a signed URL for file '{file_id}': {reason}")]
    VendorUrl { file_id: String, reason: String },

    /// OCR processing failed on the vendor side or returned a malformed body.
    #[error("OCR processing failed: {reason}")]
    VendorProcessing { reason: String },

    /// No API key was configured or found in the environment.
    #[error("Mistral API key is not configured.\nSet MISTRAL_API_KEY or pass --api-key.")]
    MissingApiKey,

    // ── Result errors ─────────────────────────────────────────────────────
    /// A page number outside the stored result was requested.
    #[error("Page {page} is out of range (result has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The persisted state file exists but could not be read.
    #[error("Failed to read state file '{path}': {source}")]
    StateReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted state file could not be written.
    #[error("Failed to write state file '{path}': {source}")]
    StateWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// The single user-visible message for this failure.
    ///
    /// Validation failures show only the first issue, matching what the
    /// result store records; every other variant uses its full display text.
    pub fn user_message(&self) -> String {
        match self {
            OcrError::Validation { issues } => issues
                .first()
                .cloned()
                .unwrap_or_else(|| "Invalid file".to_string()),
            other => other.to_string(),
        }
    }
}

/// A non-fatal error for a single math segment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The typesetting engine rejected the expression.
    #[error("could not typeset '{latex}': {detail}")]
    Typeset { latex: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_joins_issues() {
        let e = OcrError::Validation {
            issues: vec![
                "File size must be less than 5MB".into(),
                "File type must be PDF, JPEG, JPG, or PNG".into(),
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("5MB"), "got: {msg}");
        assert!(msg.contains("PDF, JPEG"), "got: {msg}");
    }

    #[test]
    fn user_message_uses_first_issue() {
        let e = OcrError::Validation {
            issues: vec!["first".into(), "second".into()],
        };
        assert_eq!(e.user_message(), "first");
    }

    #[test]
    fn vendor_url_display() {
        let e = OcrError::VendorUrl {
            file_id: "abc-123".into(),
            reason: "HTTP 404".into(),
        };
        assert!(e.to_string().contains("abc-123"));
        assert!(e.to_string().contains("404"));
    }

    #[test]
    fn page_out_of_range_display() {
        let e = OcrError::PageOutOfRange { page: 7, total: 3 };
        assert!(e.to_string().contains("Page 7"));
        assert!(e.to_string().contains("3 pages"));
    }

    #[test]
    fn render_error_display() {
        let e = RenderError::Typeset {
            latex: r"\frac{1}".into(),
            detail: "missing argument".into(),
        };
        assert!(e.to_string().contains(r"\frac{1}"));
    }
}
