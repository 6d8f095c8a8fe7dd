//! Math spans: find `$…$` / `$$…$$` in text and typeset them.
//!
//! Splitting is a single regex pass. An escaped `\$` is literal text and an
//! escaped `\\` is passed through untouched (it never escapes a dollar), a
//! `$$…$$` pair is one span, and any other `$…$` pair is one span. A `$$`
//! never closes a single-dollar span, so it acts as a boundary.
//!
//! Each span is classified block or inline, then handed to a [`MathEngine`].
//! A span the engine rejects is rendered as escaped literal source inside
//! `<code class="math-error">`; nothing else on the page is affected.

use crate::error::RenderError;
use latex2mathml::{latex_to_mathml, DisplayStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use tracing::warn;

/// Leading token of a multi-line matrix construct.
const MATRIX_PREFIX: &str = r"\left[\begin{array}";

static RE_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\\\|\\\$|\$\$(.+?)\$\$|\$([^$]+?)\$").unwrap());

/// How a span is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathDisplay {
    Inline,
    Block,
}

/// A piece of text after splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'t> {
    /// Plain text, passed through.
    Text(Cow<'t, str>),
    /// A math span.
    Math {
        /// Span content without delimiters, trimmed.
        latex: &'t str,
        /// The span as written, delimiters included.
        source: &'t str,
        display: MathDisplay,
    },
}

/// Split `text` into plain and math segments, in order.
///
/// Adjacent plain pieces (including unescaped `\$`) are merged into one
/// [`Segment::Text`]; text without any math comes back as a single segment.
pub fn split_math(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut pending = String::new();
    let mut last = 0;

    for caps in RE_MATH.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        pending.push_str(&text[last..whole.start]);
        last = whole.end;

        let (content, delimited_block) = match (caps.get(1), caps.get(2)) {
            (Some(m), _) => (m.as_str(), true),
            (None, Some(m)) => (m.as_str(), false),
            // An escaped backslash stays as written; an escaped dollar is a dollar.
            (None, None) => {
                match &text[whole.clone()] {
                    r"\\" => pending.push_str(r"\\"),
                    _ => pending.push('$'),
                }
                continue;
            }
        };

        let latex = content.trim();
        if latex.is_empty() {
            pending.push_str(&text[whole.clone()]);
            continue;
        }

        if !pending.is_empty() {
            segments.push(Segment::Text(Cow::Owned(std::mem::take(&mut pending))));
        }
        let display = if delimited_block {
            MathDisplay::Block
        } else {
            classify(latex)
        };
        segments.push(Segment::Math {
            latex,
            source: &text[whole],
            display,
        });
    }

    pending.push_str(&text[last..]);
    if !pending.is_empty() {
        if segments.is_empty() && pending.len() == text.len() {
            segments.push(Segment::Text(Cow::Borrowed(text)));
        } else {
            segments.push(Segment::Text(Cow::Owned(pending)));
        }
    }
    segments
}

/// Block if the content opens a matrix construct or contains a `\\` line break.
pub fn classify(latex: &str) -> MathDisplay {
    if latex.starts_with(MATRIX_PREFIX) || latex.contains(r"\\") {
        MathDisplay::Block
    } else {
        MathDisplay::Inline
    }
}

/// A typesetting backend.
pub trait MathEngine: Send + Sync {
    /// Typeset `latex` as an HTML fragment.
    fn render(&self, latex: &str, display: MathDisplay) -> Result<String, RenderError>;
}

/// MathML output via `latex2mathml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathMlEngine;

impl MathEngine for MathMlEngine {
    fn render(&self, latex: &str, display: MathDisplay) -> Result<String, RenderError> {
        let style = match display {
            MathDisplay::Inline => DisplayStyle::Inline,
            MathDisplay::Block => DisplayStyle::Block,
        };
        latex_to_mathml(latex, style).map_err(|e| RenderError::Typeset {
            latex: latex.to_string(),
            detail: e.to_string(),
        })
    }
}

/// Render one span, containing any failure to the span itself.
pub fn render_span(engine: &dyn MathEngine, latex: &str, source: &str, display: MathDisplay) -> String {
    match engine.render(latex, display) {
        Ok(html) => match display {
            MathDisplay::Inline => format!(r#"<span class="math math-inline">{html}</span>"#),
            MathDisplay::Block => format!(r#"<span class="math math-block">{html}</span>"#),
        },
        Err(e) => {
            warn!("Math render failed, showing source: {}", e);
            format!(r#"<code class="math-error">{}</code>"#, escape_html(source))
        }
    }
}

/// Render a plain string: text is escaped, math spans are typeset.
pub fn render_math_in_text(text: &str, engine: &dyn MathEngine) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in split_math(text) {
        match segment {
            Segment::Text(t) => out.push_str(&escape_html(&t)),
            Segment::Math {
                latex,
                source,
                display,
            } => out.push_str(&render_span(engine, latex, source, display)),
        }
    }
    out
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Echoes its input, failing on anything containing `BAD`.
    pub(crate) struct EchoEngine;

    impl MathEngine for EchoEngine {
        fn render(&self, latex: &str, display: MathDisplay) -> Result<String, RenderError> {
            if latex.contains("BAD") {
                return Err(RenderError::Typeset {
                    latex: latex.to_string(),
                    detail: "rejected".into(),
                });
            }
            Ok(format!("[{display:?}:{latex}]"))
        }
    }

    #[test]
    fn single_inline_span() {
        let segs = split_math("Energy is $E=mc^2$ today");
        assert_eq!(
            segs,
            vec![
                Segment::Text("Energy is ".into()),
                Segment::Math {
                    latex: "E=mc^2",
                    source: "$E=mc^2$",
                    display: MathDisplay::Inline
                },
                Segment::Text(" today".into()),
            ]
        );
    }

    #[test]
    fn text_without_math_is_one_borrowed_segment() {
        let segs = split_math("no math here");
        assert_eq!(segs.len(), 1);
        assert!(matches!(&segs[0], Segment::Text(Cow::Borrowed("no math here"))));
    }

    #[test]
    fn two_spans_stay_separate() {
        let segs = split_math("$a$ and $b$");
        let maths: Vec<_> = segs
            .iter()
            .filter_map(|s| match s {
                Segment::Math { latex, .. } => Some(*latex),
                _ => None,
            })
            .collect();
        assert_eq!(maths, vec!["a", "b"]);
    }

    #[test]
    fn double_dollar_is_block_and_a_boundary() {
        let segs = split_math("before $$x^2$$ after");
        assert_eq!(
            segs[1],
            Segment::Math {
                latex: "x^2",
                source: "$$x^2$$",
                display: MathDisplay::Block
            }
        );
        assert_eq!(segs[2], Segment::Text(" after".into()));
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let segs = split_math(r"costs \$5 and \$6");
        assert_eq!(segs, vec![Segment::Text("costs $5 and $6".into())]);
    }

    #[test]
    fn escaped_backslash_does_not_escape_the_dollar() {
        let segs = split_math(r"path C:\\$x$ end");
        assert_eq!(
            segs,
            vec![
                Segment::Text(r"path C:\\".into()),
                Segment::Math {
                    latex: "x",
                    source: "$x$",
                    display: MathDisplay::Inline
                },
                Segment::Text(" end".into()),
            ]
        );
    }

    #[test]
    fn span_may_cross_lines() {
        let segs = split_math("$$\nE=mc^2\n$$");
        assert_eq!(
            segs,
            vec![Segment::Math {
                latex: "E=mc^2",
                source: "$$\nE=mc^2\n$$",
                display: MathDisplay::Block
            }]
        );
    }

    #[test]
    fn unclosed_dollar_is_literal() {
        assert_eq!(split_math("price: $5"), vec![Segment::Text("price: $5".into())]);
    }

    #[test]
    fn empty_span_is_literal() {
        assert_eq!(split_math("a $ $ b"), vec![Segment::Text("a $ $ b".into())]);
    }

    #[test]
    fn classification() {
        assert_eq!(classify(r"x + y"), MathDisplay::Inline);
        assert_eq!(classify(r"a \\ b"), MathDisplay::Block);
        assert_eq!(
            classify(r"\left[\begin{array}{cc} 1 & 2 \end{array}\right]"),
            MathDisplay::Block
        );
    }

    #[test]
    fn failure_is_contained_to_its_segment() {
        let html = render_math_in_text("ok $a$ then $BAD<x>$ then $b$", &EchoEngine);
        assert_eq!(
            html,
            concat!(
                "ok ",
                r#"<span class="math math-inline">[Inline:a]</span>"#,
                " then ",
                r#"<code class="math-error">$BAD&lt;x&gt;$</code>"#,
                " then ",
                r#"<span class="math math-inline">[Inline:b]</span>"#,
            )
        );
    }

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(render_math_in_text("a < b & c", &EchoEngine), "a &lt; b &amp; c");
    }

    #[test]
    fn mathml_engine_renders_fraction() {
        let html = MathMlEngine
            .render(r"\frac{1}{2}", MathDisplay::Block)
            .expect("valid latex");
        assert!(html.contains("<math"), "got: {html}");
        assert!(html.contains("mfrac"), "got: {html}");
    }
}
