//! Page metadata resolution.
//!
//! Every source page under `pages/` resolves to a [`PageMeta`]: its front
//! matter merged over built-in defaults and the site-wide `site.meta`, plus
//! the destination file and public URL derived from its path.
//!
//! ## Destination Rules
//!
//! | Source                | slug          | pretty_url | Destination                    | URL                  |
//! |-----------------------|---------------|------------|--------------------------------|----------------------|
//! | `about.md`            |               | true       | `about/index.html`             | `/about/`            |
//! | `about.md`            |               | false      | `about.html`                   | `/about.html`        |
//! | `blog/post1.md`       | `hello-world` | true       | `blog/hello-world/index.html`  | `/blog/hello-world/` |
//! | `docs/index.jade`     |               | true       | `docs/index.html`              | `/docs/`             |
//!
//! ## Caching
//!
//! [`PageIndex`] caches resolved metadata by source-relative path for the life
//! of one build session. It is shared (behind `Arc`) with the template link
//! helpers, which resolve arbitrary pages referenced from templates.

use crate::frontmatter::{self, FrontMatterError};
use crate::generator::{GeneratorDirective, Paginator, scalar_string};
use crate::naming::{is_index_file, slugify, split_fragment, split_markup_extension};
use crate::types::{Markup, Record};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Cannot read page {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: FrontMatterError,
    },
    #[error("Invalid page metadata in {path}: {source}")]
    Meta {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolved metadata for one page.
///
/// Unknown front-matter keys are kept in `extra` and flattened back into the
/// template's `page` object, so `page.author` works for any custom key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default, deserialize_with = "scalar_text")]
    pub title: String,
    #[serde(default)]
    pub markup: Markup,
    #[serde(default, deserialize_with = "optional_scalar_text")]
    pub slug: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub description: String,
    #[serde(default = "default_pretty_url")]
    pub pretty_url: bool,
    /// Head metadata: `site.meta` overridden key-by-key by the page's `meta`.
    #[serde(default)]
    pub meta: Record,
    #[serde(default)]
    pub layout: Option<String>,
    /// When set, the page renders from this template and ignores its body.
    #[serde(default)]
    pub template: Option<String>,
    /// Destination relative to the build directory.
    #[serde(default)]
    pub filepath: String,
    #[serde(rename = "_generator", default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorDirective>,
    /// The data record (single) or chunk (pagination) of a generated page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paginator: Option<Paginator>,
    /// Table of contents of a Markdown body.
    #[serde(rename = "__toc__", default, skip_serializing_if = "Option::is_none")]
    pub toc: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

fn default_pretty_url() -> bool {
    true
}

/// Numbers and booleans read as their text (`title: 404`, `slug: 2020`).
fn optional_scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_string(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected text, found {v}"))),
    }
}

fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_scalar_text(deserializer)?.unwrap_or_default())
}

impl Default for PageMeta {
    fn default() -> Self {
        Self {
            title: String::new(),
            markup: Markup::default(),
            slug: None,
            url: String::new(),
            description: String::new(),
            pretty_url: true,
            meta: Record::new(),
            layout: None,
            template: None,
            filepath: String::new(),
            generator: None,
            context: None,
            paginator: None,
            toc: None,
            extra: Record::new(),
        }
    }
}

impl PageMeta {
    /// The metadata as a template value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Built-in metadata defaults, before site meta and front matter.
fn default_meta_record() -> Record {
    let mut map = Record::new();
    map.insert("title".into(), json!(""));
    map.insert("markup".into(), Value::Null);
    map.insert("slug".into(), Value::Null);
    map.insert("url".into(), json!(""));
    map.insert("description".into(), json!(""));
    map.insert("pretty_url".into(), json!(true));
    map.insert("meta".into(), json!({}));
    map.insert("layout".into(), Value::Null);
    map.insert("template".into(), Value::Null);
    map
}

/// Merge defaults ← site meta ← front matter.
///
/// `meta` merges key-by-key; every other key is replaced whole. A `null`
/// front-matter value leaves the default in place.
pub fn merge_meta(site_meta: &Record, front_matter: Record) -> Record {
    let mut merged = default_meta_record();
    if let Some(Value::Object(meta)) = merged.get_mut("meta") {
        meta.extend(site_meta.clone());
    }

    for (key, value) in front_matter {
        if value.is_null() {
            continue;
        }
        if key == "meta"
            && let Value::Object(overrides) = &value
            && let Some(Value::Object(base)) = merged.get_mut("meta")
        {
            base.extend(overrides.clone());
            continue;
        }
        merged.insert(key, value);
    }
    merged
}

/// Derive `(destination, url)` for a source page.
///
/// A pure function of its arguments: the destination is relative to the
/// build directory and the URL is `/` + destination without a trailing
/// `index.html`.
pub fn resolve_destination(source: &str, slug: Option<&str>, pretty_url: bool) -> (String, String) {
    let source = source.trim_start_matches('/');
    let (dir, filename) = match source.rsplit_once('/') {
        Some((dir, filename)) => (dir, filename),
        None => ("", source),
    };

    let basename = match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slugify(slug),
        None => split_markup_extension(filename).0.to_string(),
    };

    let destination = if !pretty_url {
        join(dir, &format!("{basename}.html"))
    } else if is_index_file(filename) {
        join(dir, "index.html")
    } else {
        join(&join(dir, &basename), "index.html")
    };

    let url = format!("/{}", url_path(&destination));
    (destination, url)
}

/// Strip a trailing `index.html` from a build-relative path.
pub fn url_path(destination: &str) -> &str {
    destination.strip_suffix("index.html").unwrap_or(destination)
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Resolve a source page without caching: returns the metadata and body.
pub fn load_page(pages_dir: &Path, source: &str, site_meta: &Record) -> Result<(PageMeta, String), PageError> {
    let path = pages_dir.join(source);
    let text = fs::read_to_string(&path).map_err(|source| PageError::Io {
        path: path.clone(),
        source,
    })?;
    let doc = frontmatter::parse(&text).map_err(|source| PageError::FrontMatter {
        path: path.clone(),
        source,
    })?;

    let mut merged = merge_meta(site_meta, doc.meta);
    if merged.get("markup").is_none_or(Value::is_null) {
        let filename = source.rsplit('/').next().unwrap_or(source);
        let markup = split_markup_extension(filename).1.unwrap_or_default();
        merged.insert("markup".into(), Value::String(markup.as_str().into()));
    }

    let mut meta: PageMeta =
        serde_json::from_value(Value::Object(merged)).map_err(|source| PageError::Meta {
            path: path.clone(),
            source,
        })?;
    let (filepath, url) = resolve_destination(source, meta.slug.as_deref(), meta.pretty_url);
    meta.filepath = filepath;
    meta.url = url;

    Ok((meta, doc.body))
}

/// Options of a `link_to` anchor.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    pub text: Option<String>,
    pub title: Option<String>,
    pub class: String,
    pub id: String,
}

/// Build-scoped metadata cache keyed by source-relative path.
#[derive(Debug)]
pub struct PageIndex {
    pages_dir: PathBuf,
    site_meta: Record,
    cache: Mutex<HashMap<String, Arc<PageMeta>>>,
}

impl PageIndex {
    pub fn new(pages_dir: impl Into<PathBuf>, site_meta: Record) -> Self {
        Self {
            pages_dir: pages_dir.into(),
            site_meta,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    /// Metadata for `source`, resolved on first reference and cached after.
    pub fn get(&self, source: &str) -> Result<Arc<PageMeta>, PageError> {
        let key = normalize_source(source);
        if let Some(meta) = self.lock().get(key) {
            return Ok(Arc::clone(meta));
        }

        let (meta, _) = load_page(&self.pages_dir, key, &self.site_meta)?;
        log::debug!("resolved {} → {}", key, meta.filepath);
        let meta = Arc::new(meta);
        Ok(Arc::clone(
            self.lock().entry(key.to_string()).or_insert(meta),
        ))
    }

    /// Body content of `source`, without its front matter.
    pub fn body(&self, source: &str) -> Result<String, PageError> {
        let key = normalize_source(source);
        let path = self.pages_dir.join(key);
        let text = fs::read_to_string(&path).map_err(|source| PageError::Io {
            path: path.clone(),
            source,
        })?;
        frontmatter::parse(&text)
            .map(|doc| doc.body)
            .map_err(|source| PageError::FrontMatter { path, source })
    }

    /// Number of cached pages.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URL of a page, with any `#fragment` carried over.
    pub fn url_to(&self, target: &str) -> Result<String, PageError> {
        let (page, fragment) = split_fragment(target);
        let meta = self.get(page)?;
        Ok(with_fragment(&meta.url, fragment))
    }

    /// An anchor tag to a page. The text defaults to the page title, then the link title.
    pub fn link_to(&self, target: &str, options: &LinkOptions) -> Result<String, PageError> {
        let (page, fragment) = split_fragment(target);
        let meta = self.get(page)?;
        let url = with_fragment(&meta.url, fragment);
        let title = options.title.clone().unwrap_or_default();
        let text = options
            .text
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| Some(meta.title.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| title.clone());
        Ok(format!(
            "<a href='{url}' class='{}' id='{}' title=\"{title}\">{text}</a>",
            options.class, options.id
        ))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<PageMeta>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalize_source(source: &str) -> &str {
    let source = source.trim();
    let source = source.strip_prefix("./").unwrap_or(source);
    source.trim_start_matches('/')
}

fn with_fragment(url: &str, fragment: Option<&str>) -> String {
    match fragment {
        Some(fragment) => format!("{url}#{fragment}"),
        None => url.to_string(),
    }
}
