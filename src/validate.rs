//! File validation before submission.
//!
//! A pure check against the declared size and MIME type. The content is
//! never sniffed: a file that claims `application/pdf` is trusted to be one,
//! and the vendor rejects it later if it is not.

use crate::error::OcrError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Largest accepted file: 5 MiB.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Declared MIME types the vendor accepts.
pub const ACCEPTED_FILE_TYPES: [&str; 4] = ["application/pdf", "image/jpeg", "image/jpg", "image/png"];

pub const SIZE_ISSUE: &str = "File size must be less than 5MB";
pub const TYPE_ISSUE: &str = "File type must be PDF, JPEG, JPG, or PNG";
pub const NO_FILE_ISSUE: &str = "Please select a file";
pub const MULTIPLE_FILES_ISSUE: &str = "Only one file is supported";

/// A file the user selected, described by what it declares about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// Where the file lives on disk, when it came from one.
    pub path: Option<PathBuf>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            path: None,
        }
    }

    /// Describe a file on disk.
    ///
    /// The size comes from file metadata. The declared type is
    /// `mime_override` when given, otherwise it is derived from the file
    /// extension; an unknown extension declares `application/octet-stream`.
    pub fn from_path(path: &Path, mime_override: Option<&str>) -> Result<Self, OcrError> {
        let meta = std::fs::metadata(path).map_err(|_| OcrError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        if !meta.is_file() {
            return Err(OcrError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let mime_type = match mime_override {
            Some(m) => m.to_string(),
            None => mime_guess::from_path(path)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Candidate {} ({} bytes, {})", name, meta.len(), mime_type);
        Ok(Self {
            name,
            size: meta.len(),
            mime_type,
            path: Some(path.to_path_buf()),
        })
    }
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Ok(())` when no rule was violated, otherwise [`OcrError::Validation`].
    pub fn into_result(self) -> Result<(), OcrError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(OcrError::Validation {
                issues: self.issues,
            })
        }
    }
}

/// Check a candidate against the default 5 MiB limit and accepted types.
pub fn validate_file(candidate: &FileCandidate) -> ValidationReport {
    validate_file_with_limit(candidate, MAX_FILE_SIZE)
}

/// Check a candidate against `max_size` and the accepted types.
///
/// Each violated rule contributes exactly one issue.
pub fn validate_file_with_limit(candidate: &FileCandidate, max_size: u64) -> ValidationReport {
    let mut issues = Vec::new();
    if candidate.size > max_size {
        issues.push(SIZE_ISSUE.to_string());
    }
    if !ACCEPTED_FILE_TYPES.contains(&candidate.mime_type.as_str()) {
        issues.push(TYPE_ISSUE.to_string());
    }
    ValidationReport { issues }
}

/// Enforce the one-file-per-submission rule and validate that file.
pub fn validate_selection(files: &[FileCandidate]) -> ValidationReport {
    match files {
        [] => ValidationReport {
            issues: vec![NO_FILE_ISSUE.to_string()],
        },
        [single] => validate_file(single),
        _ => ValidationReport {
            issues: vec![MULTIPLE_FILES_ISSUE.to_string()],
        },
    }
}
