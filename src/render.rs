//! Page rendering.
//!
//! The [`Renderer`] owns the Tera environment for one build session. Every
//! file under `templates/` is registered by its relative path (Jade files are
//! converted to Tera source first), so `{% extends "layouts/default.html" %}`
//! resolves across the whole set.
//!
//! ## Rendering Modes
//!
//! - **Template mode**: the page names a `template`; the registered template
//!   renders with the page context and the body is ignored.
//! - **Inline mode**: the body is converted by its markup kind, wrapped in its
//!   layout (see [`wrap_in_layout`]), compiled as an ad-hoc template and rendered.
//!
//! ## Template Context
//!
//! | Key        | Value                                              |
//! |------------|----------------------------------------------------|
//! | `site`     | the `[site]` config table                          |
//! | `data`     | everything under `data/` and `data_api_urls`       |
//! | `page`     | the page metadata (`page.context`, `page.paginator` on generated pages) |
//! | `__YASS__` | `NAME`, `VERSION`, `URL`, `GENERATOR`, `YEAR`      |
//!
//! ## Helpers
//!
//! - `link_to(page="about.md#team", text=…, title=…, class=…, id=…)` and
//!   `"about.md" | link_to`: an anchor to another page
//! - `url_to(page="about.md")` and `"about.md" | url_to`: its URL
//! - `date | format_datetime(format="%B %d, %Y")`
//! - `asset_url(bundle="main_css")`: public URL of an asset bundle

use crate::config::{Bundle, ConfigError, SiteConfig};
use crate::markup::{self, JadeError, MarkupError};
use crate::page::{LinkOptions, PageIndex, PageMeta, url_path};
use crate::types::{Markup, Record};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tera::{Context, Tera};
use thiserror::Error;
use walkdir::WalkDir;

/// Name under which inline page sources are compiled.
const PAGE_TEMPLATE: &str = "__yass_page__";

/// Extensions loaded from `templates/` as-is.
const TEMPLATE_EXTENSIONS: &[&str] = &["html", "htm", "xml", "txt", "md"];

static EXTENDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%-?\s*extends\s+(.*?)\s*-?%\}").expect("valid regex"));
static BLOCK_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%-?\s*block\s+body\s*-?%\}").expect("valid regex"));

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),
    #[error("Template {path}: {source}")]
    Jade { path: PathBuf, source: JadeError },
    #[error("Template error: {0}")]
    Template(String),
    #[error("Page context: {0}")]
    PageContext(#[from] serde_json::Error),
}

impl From<tera::Error> for RenderError {
    fn from(err: tera::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Template(message)
    }
}

/// One page to write into the build directory.
#[derive(Debug, Clone, Default)]
pub struct PageJob {
    /// Destination relative to the build directory; see [`normalize_filepath`].
    pub filepath: String,
    /// Page metadata. Defaults are used when absent.
    pub page: Option<PageMeta>,
    /// Additional top-level context entries.
    pub extra: Record,
    pub content: Option<String>,
    /// Named template; overrides `content`, `markup` and `layout`.
    pub template: Option<String>,
    pub markup: Markup,
    /// Layout to wrap inline content in; the site default when absent.
    pub layout: Option<String>,
}

impl PageJob {
    /// The job for a resolved source page and its body.
    pub fn for_page(meta: PageMeta, body: String) -> Self {
        Self {
            filepath: meta.filepath.clone(),
            content: Some(body),
            template: meta.template.clone(),
            markup: meta.markup,
            layout: meta.layout.clone(),
            page: Some(meta),
            extra: Record::new(),
        }
    }
}

/// `post/waldo/` → `post/waldo/index.html`; `feed.html` stays as is.
pub fn normalize_filepath(filepath: &str) -> String {
    let trimmed = filepath.trim_matches('/');
    if trimmed.ends_with(".html") {
        trimmed.to_string()
    } else if trimmed.is_empty() {
        "index.html".to_string()
    } else {
        format!("{trimmed}/index.html")
    }
}

/// Make page source extend a layout and fill its `body` block.
///
/// | Directive | Body block | Result                                          |
/// |-----------|------------|-------------------------------------------------|
/// | yes       | yes        | unchanged                                       |
/// | no        | no         | `extends layout` + content wrapped in `body`    |
/// | yes       | no         | directive moved to the top, rest wrapped in `body` |
/// | no        | yes        | `extends layout` prepended                      |
pub fn wrap_in_layout(content: &str, layout: &str) -> String {
    let has_block = BLOCK_BODY.is_match(content);
    match EXTENDS.find(content) {
        Some(_) if has_block => content.to_string(),
        Some(directive) => {
            let rest = format!("{}{}", &content[..directive.start()], &content[directive.end()..]);
            format!(
                "{}\n{{% block body %}}\n{}\n{{% endblock body %}}",
                directive.as_str(),
                rest.trim()
            )
        }
        None if has_block => format!("{{% extends \"{layout}\" %}}\n{content}"),
        None => format!(
            "{{% extends \"{layout}\" %}}\n{{% block body %}}\n{}\n{{% endblock body %}}",
            content.trim()
        ),
    }
}

/// The `__YASS__` global.
pub fn yass_globals() -> Value {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    json!({
        "NAME": name,
        "VERSION": version,
        "URL": env!("CARGO_PKG_HOMEPAGE"),
        "GENERATOR": format!("{name} {version}"),
        "YEAR": Utc::now().year(),
    })
}

/// Tera environment plus the session-wide context.
pub struct Renderer {
    tera: Tera,
    globals: Context,
    default_layout: String,
    /// Source last compiled as [`PAGE_TEMPLATE`].
    inline_source: Option<String>,
}

impl Renderer {
    pub fn new(
        templates_dir: &Path,
        config: &SiteConfig,
        data: &Record,
        pages: Arc<PageIndex>,
    ) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(load_templates(templates_dir)?)?;

        let link = LinkHelper {
            pages: Arc::clone(&pages),
        };
        let url = UrlHelper { pages };
        tera.register_function("link_to", link.clone());
        tera.register_filter("link_to", link);
        tera.register_function("url_to", url.clone());
        tera.register_filter("url_to", url);
        tera.register_filter("format_datetime", FormatDatetime);
        tera.register_function(
            "asset_url",
            AssetUrl {
                static_url: config.static_url(),
                bundles: config.assets_bundles()?,
            },
        );

        let mut globals = Context::new();
        globals.insert("site", &config.site());
        globals.insert("data", data);
        globals.insert("__YASS__", &yass_globals());

        Ok(Self {
            tera,
            globals,
            default_layout: config.default_layout(),
            inline_source: None,
        })
    }

    /// Names of all registered templates, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tera
            .get_template_names()
            .filter(|name| *name != PAGE_TEMPLATE)
            .collect();
        names.sort_unstable();
        names
    }

    /// Render one job into `build_dir`, overwriting any existing file.
    ///
    /// Returns the written path.
    pub fn create_page(&mut self, build_dir: &Path, job: &PageJob) -> Result<PathBuf, RenderError> {
        let filepath = normalize_filepath(&job.filepath);
        let dest = build_dir.join(&filepath);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut page = job.page.clone().unwrap_or_default();
        if page.url.is_empty() {
            page.url = format!("/{}", url_path(&filepath));
        }

        let name = match &job.template {
            Some(template) => template.clone(),
            None => {
                let converted = markup::convert(job.markup, job.content.as_deref().unwrap_or(""))?;
                if converted.toc.is_some() {
                    page.toc = converted.toc;
                }
                let layout = job.layout.as_deref().unwrap_or(&self.default_layout);
                let source = wrap_in_layout(&converted.html, layout);
                // Generated pages share one source; each add rebuilds every inheritance chain.
                if self.inline_source.as_deref() != Some(source.as_str()) {
                    self.inline_source = None;
                    self.tera.add_raw_template(PAGE_TEMPLATE, &source)?;
                    self.inline_source = Some(source);
                }
                PAGE_TEMPLATE.to_string()
            }
        };

        let mut context = self.globals.clone();
        for (key, value) in &job.extra {
            context.insert(key.as_str(), value);
        }
        context.insert("page", &page.to_value()?);

        let html = self.tera.render(&name, &context)?;
        fs::write(&dest, html)?;
        log::debug!("wrote {}", dest.display());
        Ok(dest)
    }
}

/// Read every template under `templates_dir` as `(relative name, source)`.
fn load_templates(templates_dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    let mut templates = Vec::new();
    if !templates_dir.is_dir() {
        return Ok(templates);
    }

    for entry in WalkDir::new(templates_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        let is_jade = Markup::from_extension(&ext) == Some(Markup::Jade);
        if !is_jade && !TEMPLATE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let name = path
            .strip_prefix(templates_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let source = fs::read_to_string(path)?;
        let source = if is_jade {
            markup::jade::convert(&source).map_err(|source| RenderError::Jade {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            source
        };
        templates.push((name, source));
    }
    Ok(templates)
}

// ============================================================================
// Template helpers
// ============================================================================

fn string_arg(args: &HashMap<String, Value>, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn required_arg(args: &HashMap<String, Value>, helper: &str, key: &str) -> tera::Result<String> {
    string_arg(args, key).ok_or_else(|| tera::Error::msg(format!("{helper}: missing `{key}` argument")))
}

fn link_options(args: &HashMap<String, Value>) -> LinkOptions {
    LinkOptions {
        text: string_arg(args, "text"),
        title: string_arg(args, "title"),
        class: string_arg(args, "class").unwrap_or_default(),
        id: string_arg(args, "id").unwrap_or_default(),
    }
}

#[derive(Clone)]
struct LinkHelper {
    pages: Arc<PageIndex>,
}

impl LinkHelper {
    fn link(&self, target: &str, args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.pages
            .link_to(target, &link_options(args))
            .map(Value::String)
            .map_err(|e| tera::Error::msg(format!("link_to `{target}`: {e}")))
    }
}

impl tera::Function for LinkHelper {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let target = required_arg(args, "link_to", "page")?;
        self.link(&target, args)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

impl tera::Filter for LinkHelper {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let target = value
            .as_str()
            .ok_or_else(|| tera::Error::msg("link_to: filter input must be a page path"))?;
        self.link(target, args)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

#[derive(Clone)]
struct UrlHelper {
    pages: Arc<PageIndex>,
}

impl UrlHelper {
    fn url(&self, target: &str) -> tera::Result<Value> {
        self.pages
            .url_to(target)
            .map(Value::String)
            .map_err(|e| tera::Error::msg(format!("url_to `{target}`: {e}")))
    }
}

impl tera::Function for UrlHelper {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let target = required_arg(args, "url_to", "page")?;
        self.url(&target)
    }
}

impl tera::Filter for UrlHelper {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let target = value
            .as_str()
            .ok_or_else(|| tera::Error::msg("url_to: filter input must be a page path"))?;
        self.url(target)
    }
}

struct FormatDatetime;

impl tera::Filter for FormatDatetime {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let format = string_arg(args, "format").unwrap_or_else(|| "%Y-%m-%d".to_string());
        let datetime = parse_datetime(value)
            .ok_or_else(|| tera::Error::msg(format!("format_datetime: cannot parse {value}")))?;
        format_datetime(&datetime, &format)
            .map(Value::String)
            .ok_or_else(|| tera::Error::msg(format!("format_datetime: invalid format `{format}`")))
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or a unix timestamp.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

/// strftime formatting; `None` for an invalid pattern.
pub fn format_datetime(datetime: &DateTime<Utc>, format: &str) -> Option<String> {
    use chrono::format::{Item, StrftimeItems};
    use std::fmt::Write;

    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", datetime.format_with_items(items.into_iter())).ok()?;
    Some(out)
}

struct AssetUrl {
    static_url: String,
    bundles: BTreeMap<String, Bundle>,
}

impl tera::Function for AssetUrl {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = required_arg(args, "asset_url", "bundle")?;
        let bundle = self
            .bundles
            .get(&name)
            .ok_or_else(|| tera::Error::msg(format!("asset_url: unknown bundle `{name}`")))?;
        Ok(Value::String(format!(
            "{}/{}",
            self.static_url,
            bundle.output.trim_start_matches('/')
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LAYOUT: &str = "<html><title>{{ page.title }}</title>{% block body %}{% endblock body %}</html>";

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().to_path_buf();
            fs::create_dir_all(root.join("templates/layouts")).unwrap();
            fs::create_dir_all(root.join("pages")).unwrap();
            fs::write(root.join("templates/layouts/default.html"), LAYOUT).unwrap();
            Self { _tmp: tmp, root }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn renderer(&self, config: serde_json::Value) -> Renderer {
            let config = SiteConfig::from_value(config);
            let pages = Arc::new(PageIndex::new(self.root.join("pages"), config.site_meta()));
            let mut data = Record::new();
            data.insert("nav".into(), json!(["home", "about"]));
            Renderer::new(&self.root.join("templates"), &config, &data, pages).unwrap()
        }

        fn build(&self) -> PathBuf {
            self.root.join("build")
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.build().join(rel))
                .unwrap_or_else(|e| panic!("missing output {rel}: {e}"))
        }
    }

    fn job(filepath: &str, content: &str, markup: Markup) -> PageJob {
        PageJob {
            filepath: filepath.into(),
            content: Some(content.into()),
            markup,
            ..Default::default()
        }
    }

    // =========================================================================
    // Layout auto-wrap
    // =========================================================================

    #[test]
    fn wrap_neither_present() {
        assert_eq!(
            wrap_in_layout("  <p>hi</p>\n", "layouts/x.html"),
            "{% extends \"layouts/x.html\" %}\n{% block body %}\n<p>hi</p>\n{% endblock body %}"
        );
    }

    #[test]
    fn wrap_both_present_is_unchanged() {
        let source = "{% extends \"a.html\" %}\n{% block body %}x{% endblock body %}";
        assert_eq!(wrap_in_layout(source, "layouts/x.html"), source);
        let once = wrap_in_layout("<p>x</p>", "l.html");
        assert_eq!(wrap_in_layout(&once, "other.html"), once);
    }

    #[test]
    fn wrap_directive_without_block() {
        assert_eq!(
            wrap_in_layout("<p>a</p>\n{% extends 'custom.html' %}\n<p>b</p>", "layouts/x.html"),
            "{% extends 'custom.html' %}\n{% block body %}\n<p>a</p>\n\n<p>b</p>\n{% endblock body %}"
        );
    }

    #[test]
    fn wrap_block_without_directive() {
        assert_eq!(
            wrap_in_layout("{% block body %}x{% endblock body %}", "l.html"),
            "{% extends \"l.html\" %}\n{% block body %}x{% endblock body %}"
        );
    }

    #[test]
    fn normalize_filepaths() {
        assert_eq!(normalize_filepath("/post/waldo/"), "post/waldo/index.html");
        assert_eq!(normalize_filepath("another/song.html"), "another/song.html");
        assert_eq!(normalize_filepath("post/page/5"), "post/page/5/index.html");
        assert_eq!(normalize_filepath(""), "index.html");
    }

    // =========================================================================
    // create_page
    // =========================================================================

    #[test]
    fn html_content_is_wrapped_in_default_layout() {
        let fx = Fixture::new();
        let mut renderer = fx.renderer(json!({}));
        let mut page = PageMeta::default();
        page.title = "Hello".into();
        let job = PageJob {
            page: Some(page),
            ..job("hello", "<p>{{ data.nav | length }}</p>", Markup::Html)
        };

        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(
            fx.read("hello/index.html").replace('\n', ""),
            "<html><title>Hello</title><p>2</p></html>"
        );
    }

    #[test]
    fn url_is_derived_when_missing() {
        let fx = Fixture::new();
        fx.write("templates/url.html", "{{ page.url }}");
        let mut renderer = fx.renderer(json!({}));
        let job = PageJob {
            filepath: "blog/page/2".into(),
            template: Some("url.html".into()),
            ..Default::default()
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(fx.read("blog/page/2/index.html"), "/blog/page/2/");
    }

    #[test]
    fn template_mode_ignores_content() {
        let fx = Fixture::new();
        fx.write("templates/list.html", "{{ site.title }}:{{ page.context | length }}");
        let mut renderer = fx.renderer(json!({"site": {"title": "T"}}));
        let page = PageMeta {
            context: Some(json!([1, 2, 3])),
            ..Default::default()
        };
        let job = PageJob {
            filepath: "list.html".into(),
            page: Some(page),
            content: Some("IGNORED".into()),
            template: Some("list.html".into()),
            ..Default::default()
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(fx.read("list.html"), "T:3");
    }

    #[test]
    fn markdown_toc_is_attached_to_page() {
        let fx = Fixture::new();
        fx.write(
            "templates/layouts/doc.html",
            "{{ page.__toc__ }}|{% block body %}{% endblock body %}",
        );
        let mut renderer = fx.renderer(json!({}));
        let job = PageJob {
            layout: Some("layouts/doc.html".into()),
            ..job("doc.html", "# Intro\n", Markup::Markdown)
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        let out = fx.read("doc.html");
        assert!(out.starts_with("<div class=\"toc\">"), "{out}");
        assert!(out.contains("<h1 id=\"intro\">Intro</h1>"));
    }

    #[test]
    fn jade_templates_and_content() {
        let fx = Fixture::new();
        fx.write(
            "templates/layouts/page.jade",
            "html\n  body\n    block body\n",
        );
        let mut renderer = fx.renderer(json!({}));
        assert!(renderer.template_names().contains(&"layouts/page.jade"));

        let job = PageJob {
            layout: Some("layouts/page.jade".into()),
            ..job("j.html", "p= __YASS__.NAME", Markup::Jade)
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(
            fx.read("j.html").replace('\n', ""),
            "<html><body><p>yass</p></body></html>"
        );
    }

    #[test]
    fn markdown_named_templates_are_loaded_as_is() {
        let fx = Fixture::new();
        fx.write("templates/partials/note.md", "# {{ page.title }}");
        let mut renderer = fx.renderer(json!({}));
        assert!(renderer.template_names().contains(&"partials/note.md"));

        let job = PageJob {
            filepath: "note.html".into(),
            page: Some(PageMeta {
                title: "Hi".into(),
                ..Default::default()
            }),
            template: Some("partials/note.md".into()),
            ..Default::default()
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(fx.read("note.html"), "# Hi");
    }

    #[test]
    fn shared_source_renders_each_page_context() {
        let fx = Fixture::new();
        let mut renderer = fx.renderer(json!({}));
        for title in ["One", "Two", "Three"] {
            let job = PageJob {
                page: Some(PageMeta {
                    title: title.into(),
                    ..Default::default()
                }),
                ..job(&format!("{title}.html"), "<p>{{ page.title }}</p>", Markup::Html)
            };
            renderer.create_page(&fx.build(), &job).unwrap();
        }
        assert!(fx.read("One.html").contains("<p>One</p>"));
        assert!(fx.read("Three.html").contains("<p>Three</p>"));

        renderer
            .create_page(&fx.build(), &job("other.html", "<p>other</p>", Markup::Html))
            .unwrap();
        assert!(fx.read("other.html").contains("<p>other</p>"));
    }

    #[test]
    fn failed_compile_does_not_stick() {
        let fx = Fixture::new();
        let mut renderer = fx.renderer(json!({}));
        assert!(
            renderer
                .create_page(&fx.build(), &job("bad.html", "{% if %}", Markup::Html))
                .is_err()
        );
        renderer
            .create_page(&fx.build(), &job("good.html", "<p>ok</p>", Markup::Html))
            .unwrap();
        assert!(fx.read("good.html").contains("<p>ok</p>"));
    }

    #[test]
    fn extra_context_entries_are_visible() {
        let fx = Fixture::new();
        fx.write("templates/x.html", "{{ greeting }}");
        let mut renderer = fx.renderer(json!({}));
        let mut extra = Record::new();
        extra.insert("greeting".into(), json!("hi"));
        let job = PageJob {
            filepath: "x.html".into(),
            template: Some("x.html".into()),
            extra,
            ..Default::default()
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(fx.read("x.html"), "hi");
    }

    #[test]
    fn existing_output_is_overwritten() {
        let fx = Fixture::new();
        fx.write("build/o.html", "stale");
        let mut renderer = fx.renderer(json!({}));
        renderer
            .create_page(&fx.build(), &job("o.html", "{% block body %}fresh{% endblock body %}", Markup::Html))
            .unwrap();
        assert!(fx.read("o.html").contains("fresh"));
    }

    #[test]
    fn missing_layout_is_template_error() {
        let fx = Fixture::new();
        let mut renderer = fx.renderer(json!({"default_layout": "layouts/nope.html"}));
        let err = renderer
            .create_page(&fx.build(), &job("x.html", "hi", Markup::Html))
            .unwrap_err();
        assert!(matches!(err, RenderError::Template(_)));
    }

    #[test]
    fn link_helpers_resolve_pages() {
        let fx = Fixture::new();
        fx.write("pages/about.md", "---\ntitle: About\n---\n");
        fx.write(
            "templates/links.html",
            "{{ link_to(page=\"about.md#team\", class=\"nav\") }}|{{ \"about.md\" | url_to }}",
        );
        let mut renderer = fx.renderer(json!({}));
        let job = PageJob {
            filepath: "links.html".into(),
            template: Some("links.html".into()),
            ..Default::default()
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(
            fx.read("links.html"),
            "<a href='/about/#team' class='nav' id='' title=\"\">About</a>|/about/"
        );
    }

    #[test]
    fn asset_url_uses_static_url() {
        let fx = Fixture::new();
        fx.write("templates/a.html", "{{ asset_url(bundle=\"css\") }}");
        let mut renderer = fx.renderer(json!({
            "static_url": "/assets/",
            "assets_bundles": {"css": {"contents": ["a.css"], "output": "gen/site.css"}}
        }));
        let job = PageJob {
            filepath: "a.html".into(),
            template: Some("a.html".into()),
            ..Default::default()
        };
        renderer.create_page(&fx.build(), &job).unwrap();
        assert_eq!(fx.read("a.html"), "/assets/gen/site.css");
    }

    #[test]
    fn yass_globals_are_present() {
        let globals = yass_globals();
        assert_eq!(globals["NAME"], json!("yass"));
        assert_eq!(
            globals["GENERATOR"],
            json!(format!("yass {}", env!("CARGO_PKG_VERSION")))
        );
        assert!(globals["YEAR"].as_i64().unwrap() >= 2024);
    }

    // =========================================================================
    // Date formatting
    // =========================================================================

    #[test]
    fn parse_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 5, 17).unwrap();
        for value in [json!("2020-05-17"), json!("2020-05-17T10:00:00Z"), json!("2020-05-17 10:00:00")] {
            assert_eq!(parse_datetime(&value).unwrap().date_naive(), expected);
        }
        assert!(parse_datetime(&json!("not a date")).is_none());
    }

    #[test]
    fn format_datetime_patterns() {
        let dt = parse_datetime(&json!("2020-05-17")).unwrap();
        assert_eq!(format_datetime(&dt, "%B %d, %Y").as_deref(), Some("May 17, 2020"));
        assert_eq!(format_datetime(&dt, "%Q"), None);
    }
}
