//! Result types returned by the OCR vendor.
//!
//! The vendor speaks snake_case JSON. The camelCase spellings used by the
//! vendor's JavaScript SDK are accepted as aliases so state written by either
//! client loads. Unknown fields are ignored, and `image_base64` is optional
//! because the vendor only includes it when asked to.

use serde::{Deserialize, Serialize};

/// Full OCR result for one document.
///
/// Created once per successful vendor call and never merged: a new result
/// replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    /// One entry per processed page, in document order.
    pub pages: Vec<OcrPage>,

    /// Model that produced the result, e.g. `mistral-ocr-2505`.
    #[serde(default)]
    pub model: String,

    #[serde(default, alias = "usageInfo", skip_serializing_if = "Option::is_none")]
    pub usage_info: Option<UsageInfo>,
}

impl OcrResponse {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// One page of OCR output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    /// Page index as reported by the vendor (0-based).
    pub index: u32,

    /// Page content as Markdown, with image placeholders and `$…$` math.
    pub markdown: String,

    /// Images extracted from the page, referenced by id from `markdown`.
    #[serde(default)]
    pub images: Vec<ImageRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<PageDimensions>,
}

/// An image extracted from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Identifier used as the link target in the page Markdown (`img-0.jpeg`).
    pub id: String,

    /// Image payload: a `data:` URL or bare base64.
    #[serde(default, alias = "imageBase64", skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,

    #[serde(default, alias = "topLeftX", skip_serializing_if = "Option::is_none")]
    pub top_left_x: Option<u32>,
    #[serde(default, alias = "topLeftY", skip_serializing_if = "Option::is_none")]
    pub top_left_y: Option<u32>,
    #[serde(default, alias = "bottomRightX", skip_serializing_if = "Option::is_none")]
    pub bottom_right_x: Option<u32>,
    #[serde(default, alias = "bottomRightY", skip_serializing_if = "Option::is_none")]
    pub bottom_right_y: Option<u32>,
}

impl ImageRef {
    /// An image with only an id and payload; the bounding box is unset.
    pub fn new(id: impl Into<String>, image_base64: Option<String>) -> Self {
        Self {
            id: id.into(),
            image_base64,
            top_left_x: None,
            top_left_y: None,
            bottom_right_x: None,
            bottom_right_y: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
}

/// Billing counters reported by the vendor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default, alias = "pagesProcessed")]
    pub pages_processed: Option<u64>,
    #[serde(default, alias = "docSizeBytes")]
    pub doc_size_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vendor_body_with_unknown_fields() {
        let body = r##"{
            "pages": [{
                "index": 0,
                "markdown": "# Title\n\n![img-0.jpeg](img-0.jpeg)",
                "images": [{
                    "id": "img-0.jpeg",
                    "top_left_x": 10, "top_left_y": 20,
                    "bottom_right_x": 110, "bottom_right_y": 220,
                    "image_base64": "data:image/jpeg;base64,AAAA",
                    "image_annotation": null
                }],
                "dimensions": {"dpi": 200, "height": 2200, "width": 1700}
            }],
            "model": "mistral-ocr-2505",
            "document_annotation": null,
            "usage_info": {"pages_processed": 1, "doc_size_bytes": 12345}
        }"##;

        let resp: OcrResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(resp.page_count(), 1);
        assert_eq!(resp.model, "mistral-ocr-2505");
        let page = &resp.pages[0];
        assert_eq!(page.images[0].id, "img-0.jpeg");
        assert_eq!(page.images[0].top_left_x, Some(10));
        assert_eq!(page.dimensions.map(|d| d.width), Some(1700));
        assert_eq!(resp.usage_info.and_then(|u| u.doc_size_bytes), Some(12345));
    }

    #[test]
    fn accepts_camel_case_aliases_and_missing_payload() {
        let body = r#"{
            "pages": [{"index": 0, "markdown": "x", "images": [
                {"id": "a", "imageBase64": "QUJD"},
                {"id": "b"}
            ]}],
            "model": "m",
            "usageInfo": {"pagesProcessed": 2}
        }"#;

        let resp: OcrResponse = serde_json::from_str(body).expect("parse");
        let images = &resp.pages[0].images;
        assert_eq!(images[0].image_base64.as_deref(), Some("QUJD"));
        assert_eq!(images[1].image_base64, None);
        assert_eq!(resp.usage_info.and_then(|u| u.pages_processed), Some(2));
    }
}
