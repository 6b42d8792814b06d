//! Shared types used across the build pipeline.
//!
//! Page metadata, generator records and render contexts all travel as JSON
//! values so the same data can be read by Rust code and by templates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object: a data record, a front-matter block, or a render context.
pub type Record = Map<String, Value>;

/// Source markup of a page body.
///
/// Serialized with the short names front matter uses (`html`, `md`, `jade`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Markup {
    #[default]
    #[serde(rename = "html", alias = "htm")]
    Html,
    #[serde(rename = "md", alias = "markdown")]
    Markdown,
    #[serde(rename = "jade", alias = "pug")]
    Jade,
}

impl Markup {
    /// Map a file extension (without the dot) to its markup kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "md" | "markdown" => Some(Self::Markdown),
            "jade" | "pug" => Some(Self::Jade),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
            Self::Jade => "jade",
        }
    }
}

impl std::fmt::Display for Markup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_from_extension() {
        assert_eq!(Markup::from_extension("md"), Some(Markup::Markdown));
        assert_eq!(Markup::from_extension("HTML"), Some(Markup::Html));
        assert_eq!(Markup::from_extension("jade"), Some(Markup::Jade));
        assert_eq!(Markup::from_extension("txt"), None);
    }

    #[test]
    fn markup_serde_uses_short_names() {
        assert_eq!(serde_json::to_value(Markup::Markdown).unwrap(), "md");
        let parsed: Markup = serde_json::from_value("markdown".into()).unwrap();
        assert_eq!(parsed, Markup::Markdown);
    }
}
