//! Whole-document export and output files.

use crate::error::OcrError;
use crate::output::OcrResponse;
use crate::render::images::{reconcile_images, ImageMatch};
use std::path::Path;

/// Separator placed between pages in exported Markdown.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Concatenate every page's Markdown, in page order.
///
/// With `embed_images` false the page text is exported exactly as the
/// vendor returned it. With `embed_images` true each page is reconciled
/// first, so image references carry their payloads.
pub fn export_markdown(response: &OcrResponse, embed_images: bool, strategy: ImageMatch) -> String {
    response
        .pages
        .iter()
        .map(|page| {
            if embed_images {
                reconcile_images(&page.markdown, &page.images, strategy)
            } else {
                page.markdown.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// Write `contents` to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_output(path: impl AsRef<Path>, contents: &str) -> Result<(), OcrError> {
    let path = path.as_ref();
    let write_err = |e| OcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ImageRef, OcrPage};

    fn two_pages() -> OcrResponse {
        OcrResponse {
            pages: vec![
                OcrPage {
                    index: 0,
                    markdown: "# One\n\n![a](img-0.jpeg)".into(),
                    images: vec![ImageRef::new("img-0.jpeg", Some("data:image/jpeg;base64,AA".into()))],
                    dimensions: None,
                },
                OcrPage {
                    index: 1,
                    markdown: "Two $x$".into(),
                    images: vec![],
                    dimensions: None,
                },
            ],
            model: "m".into(),
            usage_info: None,
        }
    }

    #[test]
    fn raw_export_joins_pages_unchanged() {
        assert_eq!(
            export_markdown(&two_pages(), false, ImageMatch::Auto),
            "# One\n\n![a](img-0.jpeg)\n\nTwo $x$"
        );
    }

    #[test]
    fn embedded_export_resolves_images() {
        let out = export_markdown(&two_pages(), true, ImageMatch::Auto);
        assert!(out.contains("![a](data:image/jpeg;base64,AA)"));
        assert!(out.ends_with("Two $x$"));
    }

    #[tokio::test]
    async fn write_output_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.md");
        write_output(&path, "hello").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert!(!dir.path().join("nested/out.md.tmp").exists());
    }
}
