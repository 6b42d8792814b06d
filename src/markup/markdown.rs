//! Markdown to HTML with heading anchors and a table of contents.
//!
//! Headings without an explicit `{#id}` get a slugified id, deduplicated
//! with a numeric suffix (`intro`, `intro-1`).
//!
//! Template spans (`{{ … }}`, `{% … %}`) are swapped for inert tokens before
//! parsing and restored verbatim afterwards, so `{{ page.__toc__ }}` is not
//! read as emphasis and quotes inside tags are not entity-escaped.

use crate::naming::slugify;
use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html as md_html};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static TEMPLATE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").expect("valid regex"));

struct Heading {
    level: usize,
    id: String,
    text: String,
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Convert Markdown, returning `(html, toc_html)`.
pub fn convert(source: &str) -> (String, String) {
    let (shielded, spans) = shield(source);
    let mut events: Vec<Event> = Parser::new_ext(&shielded, options()).collect();
    let headings = anchor_headings(&mut events, &spans);

    let mut html = String::with_capacity(source.len() * 3 / 2);
    md_html::push_html(&mut html, events.into_iter());
    (restore(&html, &spans), toc_html(&headings))
}

fn span_token(index: usize) -> String {
    format!("yassspan{index}z")
}

/// Replace every template span with a token Markdown leaves alone.
fn shield(source: &str) -> (String, Vec<String>) {
    let mut spans = Vec::new();
    let shielded = TEMPLATE_SPAN.replace_all(source, |caps: &regex::Captures| {
        spans.push(caps[0].to_string());
        span_token(spans.len() - 1)
    });
    (shielded.into_owned(), spans)
}

fn restore(text: &str, spans: &[String]) -> String {
    let mut out = text.to_string();
    for (index, span) in spans.iter().enumerate() {
        out = out.replace(&span_token(index), span);
    }
    out
}

/// Assign ids to every heading and collect them in document order.
fn anchor_headings(events: &mut [Event<'_>], spans: &[String]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut used: HashMap<String, usize> = HashMap::new();

    let mut i = 0;
    while i < events.len() {
        let Event::Start(Tag::Heading { level, id, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = heading_depth(*level);
        let explicit = id.as_ref().map(|id| id.to_string());

        let mut text = String::new();
        let mut end = i + 1;
        while end < events.len() {
            match &events[end] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) | Event::InlineHtml(t) => text.push_str(t),
                _ => {}
            }
            end += 1;
        }

        let text = restore(&text, spans);
        let id = match explicit {
            Some(id) => id,
            None => unique_id(&mut used, &text),
        };
        if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[i] {
            *slot = Some(CowStr::from(id.clone()));
        }
        headings.push(Heading {
            level,
            id,
            text: text.trim().to_string(),
        });
        i = end + 1;
    }
    headings
}

fn unique_id(used: &mut HashMap<String, usize>, text: &str) -> String {
    let base = match slugify(text) {
        s if s.is_empty() => "section".to_string(),
        s => s,
    };
    let count = used.entry(base.clone()).or_insert(0);
    let id = if *count == 0 {
        base.clone()
    } else {
        format!("{base}-{count}")
    };
    *count += 1;
    id
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Nested `<ul>` list, relative to the shallowest heading.
fn toc_html(headings: &[Heading]) -> String {
    let Some(base) = headings.iter().map(|h| h.level).min() else {
        return String::new();
    };

    let mut out = String::from("<div class=\"toc\">\n");
    let mut depth = 0;
    for heading in headings {
        let target = heading.level - base + 1;
        while depth < target {
            out.push_str("<ul>\n");
            depth += 1;
        }
        while depth > target {
            out.push_str("</ul>\n");
            depth -= 1;
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>\n",
            heading.id,
            escape(&heading.text)
        ));
    }
    while depth > 0 {
        out.push_str("</ul>\n");
        depth -= 1;
    }
    out.push_str("</div>\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
