//! Result rendering: page Markdown in, HTML fragment out.
//!
//! ```text
//! OcrPage.markdown
//!  │
//!  ├─ 1. images  resolve ![alt](ref) to embedded data URLs
//!  ├─ 2. tree    parse Markdown into a node tree
//!  └─ 3. math    typeset $…$ spans inside every text node
//! ```

pub mod images;
pub mod math;
pub mod tree;

use crate::output::OcrPage;
use images::{reconcile_images, ImageMatch};
use math::{escape_html, MathEngine};

/// Render one page: reconcile its images, then render Markdown with math.
pub fn render_page(page: &OcrPage, strategy: ImageMatch, engine: &dyn MathEngine) -> String {
    let markdown = reconcile_images(&page.markdown, &page.images, strategy);
    tree::render_markdown(&markdown, engine)
}

const DOCUMENT_STYLE: &str = "\
body { max-width: 52rem; margin: 2rem auto; padding: 0 1rem; font-family: sans-serif; line-height: 1.5; }
img { max-width: 100%; }
table { border-collapse: collapse; }
td, th { border: 1px solid #ccc; padding: 0.25rem 0.5rem; }
.math-block, .math-display { display: block; margin: 1rem 0; text-align: center; }
.math-error { color: #b00020; }
";

/// Wrap an HTML fragment in a standalone document.
pub fn render_document_html(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        DOCUMENT_STYLE,
        body
    )
}
