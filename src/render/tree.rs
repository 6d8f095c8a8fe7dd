//! Markdown as a node tree, with math typeset inside every text-bearing node.
//!
//! `pulldown-cmark` yields a flat event stream; [`parse`] folds it into
//! [`Node`]s (an element with children, or a leaf event). [`typeset`] is one
//! recursive walk over that tree: whatever the construct (paragraph,
//! emphasis, strong, heading, list item, table cell, link), its runs of text
//! go through the same math splitter. [`to_html`] flattens the tree back into
//! events for `pulldown-cmark`'s HTML writer.
//!
//! A text run is the adjacent text and soft line breaks of one node, so a
//! span may wrap across lines. Runs containing `$` are re-read from the
//! Markdown source so math keeps its backslashes (`\\`, `\{`) instead of the
//! unescaped form. The non-math parts are then decoded by `pulldown-cmark`
//! itself, which resolves escapes and entities.

use super::math::{render_span, split_math, MathEngine, Segment};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::ops::Range;

/// A Markdown node.
#[derive(Debug, Clone)]
pub enum Node<'a> {
    /// A container such as a paragraph or emphasis.
    Element {
        tag: Tag<'a>,
        end: TagEnd,
        span: Range<usize>,
        children: Vec<Node<'a>>,
    },
    /// Anything without children: text, inline code, breaks, raw HTML.
    Leaf { event: Event<'a>, span: Range<usize> },
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Parse Markdown into a forest of nodes.
pub fn parse(markdown: &str) -> Vec<Node<'_>> {
    let mut stack: Vec<(Tag<'_>, Range<usize>, Vec<Node<'_>>)> = Vec::new();
    let mut root = Vec::new();

    for (event, span) in Parser::new_ext(markdown, options()).into_offset_iter() {
        match event {
            Event::Start(tag) => stack.push((tag, span, Vec::new())),
            Event::End(end) => match stack.pop() {
                Some((tag, span, children)) => attach(
                    &mut stack,
                    &mut root,
                    Node::Element {
                        tag,
                        end,
                        span,
                        children,
                    },
                ),
                None => root.push(Node::Leaf {
                    event: Event::End(end),
                    span,
                }),
            },
            other => attach(&mut stack, &mut root, Node::Leaf { event: other, span }),
        }
    }

    // The parser always balances its events; keep whatever is left regardless.
    while let Some((tag, span, children)) = stack.pop() {
        let target = match stack.last_mut() {
            Some((_, _, siblings)) => siblings,
            None => &mut root,
        };
        target.push(Node::Leaf {
            event: Event::Start(tag),
            span,
        });
        target.extend(children);
    }
    root
}

fn attach<'a>(stack: &mut [(Tag<'a>, Range<usize>, Vec<Node<'a>>)], root: &mut Vec<Node<'a>>, node: Node<'a>) {
    match stack.last_mut() {
        Some((_, _, children)) => children.push(node),
        None => root.push(node),
    }
}

/// Typeset math throughout `nodes`.
///
/// `source` is the Markdown the nodes were parsed from.
pub fn typeset<'a>(nodes: Vec<Node<'a>>, source: &'a str, engine: &dyn MathEngine) -> Vec<Node<'a>> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut run: Vec<Node<'a>> = Vec::new();

    for node in nodes {
        match node {
            leaf @ Node::Leaf {
                event: Event::Text(_) | Event::SoftBreak,
                ..
            } => run.push(leaf),
            other => {
                flush_text(&mut run, &mut out, source, engine);
                out.push(match other {
                    Node::Element {
                        tag: Tag::CodeBlock(kind),
                        end,
                        span,
                        children,
                    } => typeset_code_block(Tag::CodeBlock(kind), end, span, children, engine),
                    // Alt text is an attribute, not content.
                    Node::Element {
                        tag: tag @ Tag::Image { .. },
                        end,
                        span,
                        children,
                    } => Node::Element {
                        tag,
                        end,
                        span,
                        children,
                    },
                    Node::Element {
                        tag,
                        end,
                        span,
                        children,
                    } => Node::Element {
                        tag,
                        end,
                        span,
                        children: typeset(children, source, engine),
                    },
                    Node::Leaf {
                        event: Event::Code(code),
                        span,
                    } => typeset_code_span(code, span, engine),
                    leaf => leaf,
                });
            }
        }
    }
    flush_text(&mut run, &mut out, source, engine);
    out
}

/// Emit a run of text and soft breaks, splitting out math spans.
fn flush_text<'a>(run: &mut Vec<Node<'a>>, out: &mut Vec<Node<'a>>, source: &str, engine: &dyn MathEngine) {
    let has_math = run.iter().any(|node| match node {
        Node::Leaf {
            event: Event::Text(text),
            ..
        } => text.contains('$'),
        _ => false,
    });
    if !has_math {
        out.append(run);
        return;
    }

    let span = match (run.first(), run.last()) {
        (Some(first), Some(last)) => node_span(first).start..node_span(last).end,
        _ => return,
    };
    let raw = raw_source(run, source);
    run.clear();

    for segment in split_math(&raw) {
        let event = match segment {
            Segment::Text(text) => Event::Text(CowStr::from(decode_inline(&text))),
            Segment::Math {
                latex,
                source,
                display,
            } => Event::InlineHtml(CowStr::from(render_span(engine, latex, source, display))),
        };
        out.push(Node::Leaf {
            event,
            span: span.clone(),
        });
    }
}

fn node_span<'n>(node: &'n Node<'_>) -> &'n Range<usize> {
    match node {
        Node::Element { span, .. } | Node::Leaf { span, .. } => span,
    }
}

/// The Markdown source behind a run, one line per soft break.
///
/// Each line is sliced from the source on its own, so container markers
/// between lines (`> `, list indentation) are left out.
fn raw_source(run: &[Node<'_>], source: &str) -> String {
    let mut raw = String::new();
    let mut line: Option<Range<usize>> = None;
    let mut parsed = String::new();

    for node in run {
        match node {
            Node::Leaf {
                event: Event::Text(text),
                span,
            } => {
                parsed.push_str(text);
                line = Some(match line {
                    Some(open) => open.start..span.end,
                    None => span.clone(),
                });
            }
            _ => {
                push_line(&mut raw, line.take(), &mut parsed, source);
                raw.push('\n');
            }
        }
    }
    push_line(&mut raw, line, &mut parsed, source);
    raw
}

fn push_line(raw: &mut String, line: Option<Range<usize>>, parsed: &mut String, source: &str) {
    match line.and_then(|range| source.get(range)) {
        Some(slice) => raw.push_str(slice),
        None => raw.push_str(parsed),
    }
    parsed.clear();
}

/// `` `$$…$$` `` renders as block math; any other inline code is kept.
fn typeset_code_span<'a>(code: CowStr<'a>, span: Range<usize>, engine: &dyn MathEngine) -> Node<'a> {
    let rendered = fenced_math(code.trim()).map(|(latex, source, display)| render_span(engine, latex, source, display));
    match rendered {
        Some(html) => Node::Leaf {
            event: Event::InlineHtml(CowStr::from(html)),
            span,
        },
        None => Node::Leaf {
            event: Event::Code(code),
            span,
        },
    }
}

/// A code block whose whole content is `$$…$$` renders as display math.
fn typeset_code_block<'a>(
    tag: Tag<'a>,
    end: TagEnd,
    span: Range<usize>,
    children: Vec<Node<'a>>,
    engine: &dyn MathEngine,
) -> Node<'a> {
    let content: String = children
        .iter()
        .filter_map(|child| match child {
            Node::Leaf {
                event: Event::Text(t),
                ..
            } => Some(&**t),
            _ => None,
        })
        .collect();

    let rendered = fenced_math(content.trim()).map(|(latex, source, display)| render_span(engine, latex, source, display));
    match rendered {
        Some(html) => Node::Leaf {
            event: Event::Html(CowStr::from(format!(r#"<div class="math-display">{html}</div>"#) + "\n")),
            span,
        },
        None => Node::Element {
            tag,
            end,
            span,
            children,
        },
    }
}

/// The content is exactly one `$$…$$` span.
fn fenced_math(text: &str) -> Option<(&str, &str, super::math::MathDisplay)> {
    if !(text.starts_with("$$") && text.ends_with("$$")) {
        return None;
    }
    match split_math(text).as_slice() {
        [Segment::Math {
            latex,
            source,
            display,
        }] if source.len() == text.len() => Some((*latex, *source, *display)),
        _ => None,
    }
}

/// Resolve Markdown escapes and entities in plain text from a run.
///
/// Each line is parsed between two guard characters so it stays inline
/// text: no heading, list or indented code can start, and edge whitespace
/// survives. A line that parses into anything but text is kept as written.
fn decode_inline(text: &str) -> String {
    text.split('\n').map(decode_line).collect::<Vec<_>>().join("\n")
}

fn decode_line(line: &str) -> String {
    let guarded = format!("x{line}x");
    let mut decoded = String::with_capacity(guarded.len());
    for event in Parser::new_ext(&guarded, options()) {
        match event {
            Event::Text(t) => decoded.push_str(&t),
            Event::Start(Tag::Paragraph) | Event::End(TagEnd::Paragraph) => {}
            _ => return line.to_string(),
        }
    }
    match decoded.strip_prefix('x').and_then(|d| d.strip_suffix('x')) {
        Some(inner) => inner.to_string(),
        None => line.to_string(),
    }
}

fn flatten<'a>(nodes: Vec<Node<'a>>, out: &mut Vec<Event<'a>>) {
    for node in nodes {
        match node {
            Node::Element {
                tag, end, children, ..
            } => {
                out.push(Event::Start(tag));
                flatten(children, out);
                out.push(Event::End(end));
            }
            Node::Leaf { event, .. } => out.push(event),
        }
    }
}

/// Render nodes as an HTML fragment.
pub fn to_html(nodes: Vec<Node<'_>>) -> String {
    let mut events = Vec::new();
    flatten(nodes, &mut events);
    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}

/// Markdown in, HTML with typeset math out.
pub fn render_markdown(markdown: &str, engine: &dyn MathEngine) -> String {
    to_html(typeset(parse(markdown), markdown, engine))
}
