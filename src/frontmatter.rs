//! Front-matter splitting.
//!
//! A page may start with a delimited metadata header:
//!
//! ```text
//! ---                      +++
//! title: About             title = "About"
//! slug: about-us           slug = "about-us"
//! ---                      +++
//! Body content...          Body content...
//! ```
//!
//! `---` blocks are YAML, `+++` blocks are TOML. A file without an opening
//! delimiter on its first line, or without a closing one, has no front matter
//! and its whole text is the body.

use crate::types::Record;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Front matter conversion: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Front matter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// A source file split into metadata and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub meta: Record,
    pub body: String,
}

#[derive(Clone, Copy)]
enum Format {
    Yaml,
    Toml,
}

pub fn parse(source: &str) -> Result<Document, FrontMatterError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some((format, header, body)) = split(source) else {
        return Ok(Document {
            meta: Record::new(),
            body: source.to_string(),
        });
    };

    let value: Value = match format {
        Format::Yaml if header.trim().is_empty() => Value::Null,
        Format::Yaml => serde_yaml::from_str(header)?,
        Format::Toml => serde_json::to_value(toml::from_str::<toml::Value>(header)?)?,
    };
    let meta = match value {
        Value::Object(map) => map,
        Value::Null => Record::new(),
        Value::Array(_) => return Err(FrontMatterError::NotAMapping("a sequence")),
        _ => return Err(FrontMatterError::NotAMapping("a scalar")),
    };

    Ok(Document {
        meta,
        body: body.to_string(),
    })
}

/// Locate the header and body slices. `None` when there is no complete header.
fn split(source: &str) -> Option<(Format, &str, &str)> {
    let first_end = source.find('\n').unwrap_or(source.len());
    let (format, delimiter) = match source[..first_end].trim_end() {
        "---" => (Format::Yaml, "---"),
        "+++" => (Format::Toml, "+++"),
        _ => return None,
    };

    let header_start = (first_end + 1).min(source.len());
    let mut offset = header_start;
    for line in source[header_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == delimiter || (matches!(format, Format::Yaml) && trimmed == "...") {
            let header = &source[header_start..offset];
            let body = &source[offset + line.len()..];
            return Some((format, header, body));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_front_matter() {
        let doc = parse("---\ntitle: Hello\nslug: hello-world\n---\n# Body\n").unwrap();
        assert_eq!(doc.meta["title"], json!("Hello"));
        assert_eq!(doc.meta["slug"], json!("hello-world"));
        assert_eq!(doc.body, "# Body\n");
    }

    #[test]
    fn toml_front_matter() {
        let doc = parse("+++\ntitle = \"Hi\"\npretty_url = false\n+++\nbody").unwrap();
        assert_eq!(doc.meta["title"], json!("Hi"));
        assert_eq!(doc.meta["pretty_url"], json!(false));
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn nested_yaml_values() {
        let doc = parse(
            "---\n_generator:\n  type: pagination\n  per_page: 2\nmeta:\n  keywords: [a, b]\n---\n",
        )
        .unwrap();
        assert_eq!(doc.meta["_generator"]["per_page"], json!(2));
        assert_eq!(doc.meta["meta"]["keywords"], json!(["a", "b"]));
        assert_eq!(doc.body, "");
    }

    #[test]
    fn no_front_matter_keeps_whole_body() {
        let doc = parse("<h1>Hi</h1>\n---\n").unwrap();
        assert!(doc.meta.is_empty());
        assert_eq!(doc.body, "<h1>Hi</h1>\n---\n");
    }

    #[test]
    fn unclosed_header_is_body() {
        let doc = parse("---\ntitle: x\nno closing").unwrap();
        assert!(doc.meta.is_empty());
        assert!(doc.body.starts_with("---"));
    }

    #[test]
    fn empty_header_is_empty_meta() {
        let doc = parse("---\n---\ncontent").unwrap();
        assert!(doc.meta.is_empty());
        assert_eq!(doc.body, "content");
    }

    #[test]
    fn crlf_delimiters() {
        let doc = parse("---\r\ntitle: Win\r\n---\r\nbody").unwrap();
        assert_eq!(doc.meta["title"], json!("Win"));
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn non_mapping_header_is_error() {
        assert!(matches!(
            parse("---\n- a\n- b\n---\nbody"),
            Err(FrontMatterError::NotAMapping(_))
        ));
    }
}
