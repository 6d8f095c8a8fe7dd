//! Pagination over one OCR result.
//!
//! [`Pager`] is pure position state; [`PageView`] pairs it with a response
//! and renders whatever page is current. The position is never persisted:
//! a new view always starts on the first page.

use crate::output::{OcrPage, OcrResponse};
use crate::render::images::{reconcile_images, ImageMatch};
use crate::render::math::MathEngine;
use crate::render::tree;
use serde::Serialize;

/// Current page over a fixed number of pages.
///
/// `current` is always in `[0, total - 1]`, or 0 when there are no pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    current: usize,
    total: usize,
}

impl Pager {
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Advance one page; stays on the last page.
    pub fn next(&mut self) -> usize {
        if self.current + 1 < self.total {
            self.current += 1;
        }
        self.current
    }

    /// Go back one page; stays on the first page.
    pub fn previous(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Jump to `index`, clamped into range.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.current = index.min(self.total.saturating_sub(1));
        self.current
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.total
    }

    /// "Page i of n", 1-based.
    pub fn label(&self) -> String {
        if self.total == 0 {
            return "No pages".to_string();
        }
        format!("Page {} of {}", self.current + 1, self.total)
    }
}

/// One rendered page, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPage {
    /// 0-based position in the response.
    pub position: usize,
    /// Page index reported by the vendor.
    pub vendor_index: u32,
    pub label: String,
    /// Markdown with image references resolved.
    pub markdown: String,
    /// HTML fragment with images embedded and math typeset.
    pub html: String,
}

/// A pager bound to a response.
#[derive(Debug, Clone)]
pub struct PageView<'r> {
    response: &'r OcrResponse,
    pager: Pager,
    strategy: ImageMatch,
}

impl<'r> PageView<'r> {
    pub fn new(response: &'r OcrResponse, strategy: ImageMatch) -> Self {
        Self {
            response,
            pager: Pager::new(response.page_count()),
            strategy,
        }
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    /// The current page, or `None` for an empty response.
    pub fn current_page(&self) -> Option<&'r OcrPage> {
        self.response.pages.get(self.pager.current())
    }

    pub fn reconciled_markdown(&self) -> Option<String> {
        self.current_page()
            .map(|page| reconcile_images(&page.markdown, &page.images, self.strategy))
    }

    /// Render the current page.
    pub fn render(&self, engine: &dyn MathEngine) -> Option<RenderedPage> {
        let page = self.current_page()?;
        let markdown = reconcile_images(&page.markdown, &page.images, self.strategy);
        let html = tree::render_markdown(&markdown, engine);
        Some(RenderedPage {
            position: self.pager.current(),
            vendor_index: page.index,
            label: self.pager.label(),
            markdown,
            html,
        })
    }
}
