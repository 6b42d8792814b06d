//! Jade-style indentation markup, converted to Tera template source.
//!
//! Nesting is expressed by indentation; each line is one of:
//!
//! ```text
//! doctype html               → <!DOCTYPE html>
//! extends layouts/base.html  → {% extends "layouts/base.html" %}
//! block body                 → {% block body %} … {% endblock body %}
//! include partials/nav.html  → {% include "partials/nav.html" %}
//! if page.title / elif / else → {% if … %} … {% elif … %} … {% else %} … {% endif %}
//! for post in data.posts     → {% for … %} … {% endfor %}
//! ul#nav.menu                → <ul id="nav" class="menu"> … </ul>
//! a(href=post.url) Read      → <a href="{{ post.url }}">Read</a>
//! li: a(href="/") Home       → <li><a href="/">Home</a></li>
//! h1= page.title             → <h1>{{ page.title }}</h1>
//! script.                    → <script> raw indented text </script>
//! | text with #{expr}        → text with {{ expr }}
//! // comment                 → <!-- comment -->
//! //- hidden comment         → (nothing)
//! <raw html>, {% … %}, {{ … }} pass through unchanged
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JadeError {
    #[error("line {line}: unclosed attribute list")]
    UnclosedAttributes { line: usize },
    #[error("line {line}: unterminated string in attributes")]
    UnterminatedString { line: usize },
    #[error("line {line}: `{keyword}` without a matching `if`")]
    DanglingElse { line: usize, keyword: String },
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

struct Line<'a> {
    number: usize,
    indent: usize,
    raw: &'a str,
    text: &'a str,
}

struct Frame {
    indent: usize,
    closer: String,
    /// `if`/`for` frames accept `elif`/`else` siblings.
    control: bool,
}

enum Body {
    Empty,
    Text(String),
    Expr(String),
    Nested(String),
    RawBlock,
}

struct TagLine {
    name: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<String>,
    self_closing: bool,
    body: Body,
}

pub fn convert(source: &str) -> Result<String, JadeError> {
    let lines: Vec<Line> = source
        .lines()
        .enumerate()
        .filter(|(_, raw)| !raw.trim().is_empty())
        .map(|(i, raw)| {
            let text = raw.trim();
            Line {
                number: i + 1,
                indent: raw.len() - raw.trim_start().len(),
                raw,
                text,
            }
        })
        .collect();

    let mut out = String::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        let continuation = is_continuation(line.text);

        while let Some(top) = stack.last() {
            let sibling_branch = continuation && top.control && top.indent == line.indent;
            if top.indent < line.indent || sibling_branch {
                break;
            }
            if let Some(frame) = stack.pop() {
                push_line(&mut out, &frame.closer);
            }
        }

        let has_children = lines
            .get(i + 1)
            .is_some_and(|next| next.indent > line.indent);
        let text = line.text;

        if continuation {
            let attached = stack
                .last()
                .is_some_and(|top| top.control && top.indent == line.indent);
            if !attached {
                return Err(JadeError::DanglingElse {
                    line: line.number,
                    keyword: text.split_whitespace().next().unwrap_or(text).to_string(),
                });
            }
            push_line(&mut out, &continuation_tag(text));
            i += 1;
            continue;
        }

        if let Some(rest) = text.strip_prefix("//") {
            let end = block_end(&lines, i);
            if let Some(comment) = rest.strip_prefix('-') {
                log::trace!("jade: dropping silent comment `{}`", comment.trim());
            } else {
                let mut comment = String::from("<!--");
                if !rest.trim().is_empty() {
                    comment.push(' ');
                    comment.push_str(rest.trim());
                }
                for child in raw_block(&lines[i + 1..end]) {
                    comment.push('\n');
                    comment.push_str(child);
                }
                comment.push_str(" -->");
                push_line(&mut out, &comment);
            }
            i = end;
            continue;
        }

        if ["<", "{%", "{{", "{#"].iter().any(|p| text.starts_with(p)) {
            push_line(&mut out, text);
            i += 1;
            continue;
        }

        if let Some(rest) = text.strip_prefix('|') {
            push_line(&mut out, &interpolate(rest.strip_prefix(' ').unwrap_or(rest)));
            i += 1;
            continue;
        }

        let (word, rest) = match text.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (text, ""),
        };
        match word {
            "doctype" | "!!!" => {
                let kind = if rest.is_empty() { "html" } else { rest };
                push_line(&mut out, &format!("<!DOCTYPE {kind}>"));
            }
            "extends" => push_line(&mut out, &format!("{{% extends \"{}\" %}}", unquote(rest))),
            "include" => push_line(&mut out, &format!("{{% include \"{}\" %}}", unquote(rest))),
            "block" => {
                push_line(&mut out, &format!("{{% block {rest} %}}"));
                stack.push(Frame {
                    indent: line.indent,
                    closer: format!("{{% endblock {rest} %}}"),
                    control: false,
                });
            }
            "if" | "unless" | "for" if !rest.is_empty() => {
                let (open, closer) = match word {
                    "if" => (format!("{{% if {rest} %}}"), "{% endif %}"),
                    "unless" => (format!("{{% if not ({rest}) %}}"), "{% endif %}"),
                    _ => (format!("{{% for {rest} %}}"), "{% endfor %}"),
                };
                push_line(&mut out, &open);
                stack.push(Frame {
                    indent: line.indent,
                    closer: closer.to_string(),
                    control: true,
                });
            }
            _ => {
                let Some(tag) = parse_tag(text, line.number)? else {
                    push_line(&mut out, &interpolate(text));
                    i += 1;
                    continue;
                };
                let open = render_open(&tag);
                let closer = format!("</{}>", tag.name);
                let void = tag.self_closing || VOID_ELEMENTS.contains(&tag.name.as_str());

                let inline = match &tag.body {
                    Body::RawBlock => {
                        let end = block_end(&lines, i);
                        let mut block = open;
                        for child in raw_block(&lines[i + 1..end]) {
                            block.push('\n');
                            block.push_str(child);
                        }
                        block.push('\n');
                        block.push_str(&closer);
                        push_line(&mut out, &block);
                        i = end;
                        continue;
                    }
                    Body::Empty => String::new(),
                    Body::Text(text) => interpolate(text),
                    Body::Expr(expr) => format!("{{{{ {expr} }}}}"),
                    Body::Nested(nested) => convert(nested)?.trim_end().to_string(),
                };

                if void {
                    push_line(&mut out, &format!("{open}{inline}"));
                } else if has_children {
                    push_line(&mut out, &format!("{open}{inline}"));
                    stack.push(Frame {
                        indent: line.indent,
                        closer,
                        control: false,
                    });
                } else {
                    push_line(&mut out, &format!("{open}{inline}{closer}"));
                }
            }
        }
        i += 1;
    }

    while let Some(frame) = stack.pop() {
        push_line(&mut out, &frame.closer);
    }
    Ok(out)
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn is_continuation(text: &str) -> bool {
    text == "else" || text.starts_with("elif ") || text.starts_with("else if ")
}

fn continuation_tag(text: &str) -> String {
    if text == "else" {
        return "{% else %}".to_string();
    }
    let condition = text
        .strip_prefix("elif ")
        .or_else(|| text.strip_prefix("else if "))
        .unwrap_or_default()
        .trim();
    format!("{{% elif {condition} %}}")
}

/// Index of the first line after `lines[start]`'s indented children.
fn block_end(lines: &[Line], start: usize) -> usize {
    let indent = lines[start].indent;
    let mut end = start + 1;
    while end < lines.len() && lines[end].indent > indent {
        end += 1;
    }
    end
}

/// Child lines with their common indentation removed.
fn raw_block<'a>(children: &[Line<'a>]) -> Vec<&'a str> {
    let base = children.iter().map(|l| l.indent).min().unwrap_or(0);
    children
        .iter()
        .map(|l| l.raw.get(base..).unwrap_or(l.text).trim_end())
        .collect()
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// `#{expr}` → `{{ expr }}`.
fn interpolate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str("{{ ");
        out.push_str(rest[start + 2..start + 2 + len].trim());
        out.push_str(" }}");
        rest = &rest[start + 3 + len..];
    }
    out.push_str(rest);
    out
}

fn is_class_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_while(s: &str, pred: impl Fn(char) -> bool) -> (&str, &str) {
    let end = s.find(|c: char| !pred(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// Parse an element line. `None` when the line does not start like a tag.
fn parse_tag(text: &str, line: usize) -> Result<Option<TagLine>, JadeError> {
    let first = text.chars().next().unwrap_or(' ');
    let shorthand = (first == '#' || first == '.') && text[1..].starts_with(is_class_char);
    if !(first.is_ascii_alphabetic() || shorthand) {
        return Ok(None);
    }

    let (name, mut rest) = take_while(text, is_class_char);
    let mut tag = TagLine {
        name: if name.is_empty() { "div" } else { name }.to_string(),
        id: None,
        classes: Vec::new(),
        attrs: Vec::new(),
        self_closing: false,
        body: Body::Empty,
    };

    loop {
        if let Some(after) = rest.strip_prefix('#')
            && after.starts_with(is_class_char)
        {
            let (id, remaining) = take_while(after, is_class_char);
            tag.id = Some(id.to_string());
            rest = remaining;
        } else if let Some(after) = rest.strip_prefix('.')
            && after.starts_with(is_class_char)
        {
            let (class, remaining) = take_while(after, is_class_char);
            tag.classes.push(class.to_string());
            rest = remaining;
        } else {
            break;
        }
    }

    if rest.starts_with('(') {
        let close = matching_paren(rest, line)?;
        tag.attrs = parse_attrs(&rest[1..close], line)?;
        rest = &rest[close + 1..];
    }
    if let Some(after) = rest.strip_prefix('/') {
        tag.self_closing = true;
        rest = after;
    }

    tag.body = if rest == "." {
        Body::RawBlock
    } else if let Some(expr) = rest.strip_prefix('=') {
        Body::Expr(expr.trim().to_string())
    } else if let Some(nested) = rest.strip_prefix(':') {
        Body::Nested(nested.trim().to_string())
    } else if rest.trim().is_empty() {
        Body::Empty
    } else {
        Body::Text(rest.strip_prefix(' ').unwrap_or(rest).to_string())
    };
    Ok(Some(tag))
}

/// Byte index of the `)` closing the attribute list that opens `s`.
fn matching_paren(s: &str, line: usize) -> Result<usize, JadeError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(JadeError::UnclosedAttributes { line })
}

/// Render `name=value` pairs as HTML attributes.
///
/// Quoted values are literal; bare values are template expressions;
/// `true` and a missing value produce a boolean attribute; `false` drops it.
fn parse_attrs(s: &str, line: usize) -> Result<Vec<String>, JadeError> {
    let chars: Vec<char> = s.chars().collect();
    let mut attrs = Vec::new();
    let mut pos = 0;
    let skip = |pos: &mut usize, pred: &dyn Fn(char) -> bool| {
        while *pos < chars.len() && pred(chars[*pos]) {
            *pos += 1;
        }
    };

    loop {
        skip(&mut pos, &|c| c.is_whitespace() || c == ',');
        if pos >= chars.len() {
            break;
        }
        let start = pos;
        skip(&mut pos, &|c| !(c.is_whitespace() || c == ',' || c == '='));
        let name: String = chars[start..pos].iter().collect();
        skip(&mut pos, &char::is_whitespace);

        if pos >= chars.len() || chars[pos] != '=' {
            attrs.push(name);
            continue;
        }
        pos += 1;
        skip(&mut pos, &char::is_whitespace);

        if pos < chars.len() && (chars[pos] == '"' || chars[pos] == '\'') {
            let quote = chars[pos];
            let value_start = pos + 1;
            let Some(len) = chars[value_start..].iter().position(|&c| c == quote) else {
                return Err(JadeError::UnterminatedString { line });
            };
            let value: String = chars[value_start..value_start + len].iter().collect();
            pos = value_start + len + 1;
            let value = interpolate(&value);
            if value.contains('"') {
                attrs.push(format!("{name}='{value}'"));
            } else {
                attrs.push(format!("{name}=\"{value}\""));
            }
        } else {
            let value_start = pos;
            let mut depth = 0i32;
            while pos < chars.len() {
                match chars[pos] {
                    '(' | '[' => depth += 1,
                    ')' | ']' => depth -= 1,
                    c if depth == 0 && (c == ',' || c.is_whitespace()) => break,
                    _ => {}
                }
                pos += 1;
            }
            let expr: String = chars[value_start..pos].iter().collect();
            match expr.as_str() {
                "true" => attrs.push(name),
                "false" => {}
                _ => attrs.push(format!("{name}=\"{{{{ {expr} }}}}\"")),
            }
        }
    }
    Ok(attrs)
}

fn render_open(tag: &TagLine) -> String {
    let mut open = format!("<{}", tag.name);
    if let Some(id) = &tag.id {
        open.push_str(&format!(" id=\"{id}\""));
    }
    if !tag.classes.is_empty() {
        open.push_str(&format!(" class=\"{}\"", tag.classes.join(" ")));
    }
    for attr in &tag.attrs {
        open.push(' ');
        open.push_str(attr);
    }
    open.push('>');
    open
}
