//! Site configuration module.
//!
//! Handles loading, merging, and querying `yass.toml`. The document is kept as
//! an open tree: templates read arbitrary keys out of `site`, so the config is
//! not a closed struct. Typed sections (pagination defaults, hosting targets,
//! asset bundles, data endpoints) are deserialized from their subtrees on
//! demand.
//!
//! ## Config File Location
//!
//! ```text
//! my-site/
//! ├── yass.toml        # Site config
//! ├── pages/
//! ├── templates/
//! ├── data/
//! └── static/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! sitename = "example.com"
//! default_layout = "layouts/default.html"
//! static_url = "/static"
//!
//! [site]
//! base_url = "/"            # Defaults to "/"
//! title = "My site"         # Anything else is free-form, exposed as `site.*`
//!
//! [site.meta]               # Head metadata merged into every page's `meta`
//! author = "Jane"
//!
//! [pagination]              # Defaults for pagination generators
//! per_page = 10
//! left_edge = 2
//! left_current = 3
//! right_current = 4
//! right_edge = 2
//!
//! [assets_bundles.main_css]
//! contents = ["css/reset.css", "css/site.css"]
//! output = "gen/main.css"
//!
//! [data_api_urls]
//! releases = "https://api.example.com/releases.json"
//!
//! [hosting.s3]
//! aws_access_key_id = "..."
//! aws_secret_access_key = "..."
//! aws_region = "us-east-1"
//! purge_files = true
//! purge_exclude_files = ["index.html", "error.html"]
//! bucket_root = "/srv/buckets"  # Directory acting as the bucket host
//! max_uploads = 8               # Upload workers (omit for auto = CPU cores)
//! ```
//!
//! ## Dotted-Path Lookup
//!
//! [`ConfigTree::get_path`] walks `a.b.0.c` style paths. Numeric segments
//! index into arrays. A missing key, an out-of-range index, or a scalar in
//! the middle of the path yields the caller's default instead of an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file in the site root.
pub const CONFIG_FILE: &str = "yass.toml";

/// Layout used when neither the page nor the config names one.
pub const DEFAULT_LAYOUT: &str = "layouts/default.html";

const DEFAULT_STATIC_URL: &str = "/static";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config section `{section}`: {source}")]
    Section {
        section: String,
        source: serde_json::Error,
    },
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Hosting target `{0}` is not configured (expected a [hosting.{0}] table)")]
    MissingHosting(String),
}

/// A parsed configuration document with dotted-path access.
///
/// Nodes are a tagged union of objects, arrays, and scalars
/// (`serde_json::Value`), which is also what the template context consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree(Value);

impl ConfigTree {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Borrowing lookup. `null` values count as absent.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut node = &self.0;
        for segment in path.split('.') {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!node.is_null()).then_some(node)
    }

    /// Look up `path`, falling back to `default` when any segment is missing.
    pub fn get_path(&self, path: &str, default: Value) -> Value {
        self.lookup(path).cloned().unwrap_or(default)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.lookup(path).and_then(Value::as_str)
    }

    /// Integer lookup accepting both numbers and numeric strings.
    pub fn get_usize(&self, path: &str) -> Option<usize> {
        self.lookup(path).and_then(value_as_usize)
    }
}

/// Interpret a JSON value as a non-negative integer (`3` or `"3"`).
pub fn value_as_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Site configuration loaded from `yass.toml`.
///
/// Immutable for the duration of a build; every build session loads its own.
#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    tree: ConfigTree,
}

/// Pagination defaults, used when a generator directive omits a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationDefaults {
    pub per_page: usize,
    pub left_edge: usize,
    pub left_current: usize,
    pub right_current: usize,
    pub right_edge: usize,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self {
            per_page: 10,
            left_edge: 2,
            left_current: 3,
            right_current: 4,
            right_edge: 2,
        }
    }
}

/// A static asset bundle: `contents` (relative to `static/`) concatenated into `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub contents: Vec<String>,
    pub output: String,
}

/// One `[hosting.<target>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingConfig {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    /// Delete previously uploaded keys before uploading the new build.
    pub purge_files: bool,
    /// Keys protected from purge.
    pub purge_exclude_files: Vec<String>,
    /// Directory acting as the bucket host. Relative paths resolve against the site root.
    pub bucket_root: Option<PathBuf>,
    /// Maximum number of parallel upload workers.
    /// When absent, defaults to the number of CPU cores.
    pub max_uploads: Option<usize>,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            purge_files: true,
            purge_exclude_files: vec!["index.html".to_string(), "error.html".to_string()],
            bucket_root: None,
            max_uploads: None,
        }
    }
}

impl SiteConfig {
    /// Build a config from a parsed TOML document.
    pub fn from_toml(value: toml::Value) -> Result<Self, ConfigError> {
        let json = serde_json::to_value(value).map_err(|source| ConfigError::Section {
            section: "<root>".to_string(),
            source,
        })?;
        Ok(Self::from_value(json))
    }

    pub fn from_value(value: Value) -> Self {
        Self {
            tree: ConfigTree::new(value),
        }
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn get_path(&self, path: &str, default: Value) -> Value {
        self.tree.get_path(path, default)
    }

    /// The bare site name (`https://www.example.com` → `example.com`).
    pub fn sitename(&self) -> Option<String> {
        self.tree
            .get_str("sitename")
            .map(extract_sitename)
            .filter(|s| !s.is_empty())
    }

    pub fn default_layout(&self) -> String {
        self.tree
            .get_str("default_layout")
            .unwrap_or(DEFAULT_LAYOUT)
            .to_string()
    }

    /// The `site` subtree, with `base_url` defaulted to `/`.
    pub fn site(&self) -> Value {
        let mut site = match self.tree.lookup("site") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        site.entry("base_url")
            .or_insert_with(|| Value::String("/".to_string()));
        Value::Object(site)
    }

    pub fn base_url(&self) -> String {
        self.tree.get_str("site.base_url").unwrap_or("/").to_string()
    }

    pub fn static_url(&self) -> String {
        self.tree
            .get_str("static_url")
            .unwrap_or(DEFAULT_STATIC_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Site-wide head metadata (`site.meta`).
    pub fn site_meta(&self) -> Map<String, Value> {
        match self.tree.lookup("site.meta") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Pagination defaults from `[pagination]`, falling back to `[site.pagination]`.
    pub fn pagination(&self) -> Result<PaginationDefaults, ConfigError> {
        let section = self
            .tree
            .lookup("pagination")
            .or_else(|| self.tree.lookup("site.pagination"));
        match section {
            Some(value) => section_from_value("pagination", value),
            None => Ok(PaginationDefaults::default()),
        }
    }

    pub fn assets_bundles(&self) -> Result<BTreeMap<String, Bundle>, ConfigError> {
        match self.tree.lookup("assets_bundles") {
            Some(value) => section_from_value("assets_bundles", value),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Named remote JSON endpoints (`data_api_urls`, or `site.data_api_urls`).
    pub fn data_api_urls(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        let section = self
            .tree
            .lookup("data_api_urls")
            .or_else(|| self.tree.lookup("site.data_api_urls"));
        match section {
            Some(value) => section_from_value("data_api_urls", value),
            None => Ok(BTreeMap::new()),
        }
    }

    /// The `[hosting.<target>]` table. Target names match exactly, then lowercased.
    pub fn hosting(&self, target: &str) -> Result<HostingConfig, ConfigError> {
        let lowered = target.to_lowercase();
        let section = self
            .tree
            .lookup(&format!("hosting.{target}"))
            .or_else(|| self.tree.lookup(&format!("hosting.{lowered}")))
            .ok_or_else(|| ConfigError::MissingHosting(target.to_string()))?;
        section_from_value(&format!("hosting.{target}"), section)
    }

    /// Validate typed sections that have range constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination()?.per_page == 0 {
            return Err(ConfigError::Validation(
                "pagination.per_page must be at least 1".into(),
            ));
        }
        if let Some(Value::Object(targets)) = self.tree.lookup("hosting") {
            for target in targets.keys() {
                if self.hosting(target)?.max_uploads == Some(0) {
                    return Err(ConfigError::Validation(format!(
                        "hosting.{target}.max_uploads must be at least 1"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn section_from_value<T: DeserializeOwned>(section: &str, value: &Value) -> Result<T, ConfigError> {
    serde_json::from_value(value.clone()).map_err(|source| ConfigError::Section {
        section: section.to_string(),
        source,
    })
}

/// Strip the scheme and any `www.` prefix from a site name.
pub fn extract_sitename(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme)
        .trim_end_matches('/')
        .to_string()
}

/// Resolve the effective upload worker count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(max: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    max.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `yass.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load the site config, merging caller `overrides` on top of the file.
pub fn load_config(root: &Path, overrides: Option<toml::Value>) -> Result<SiteConfig, ConfigError> {
    let base = load_raw_config(root)?.unwrap_or_else(|| toml::Value::Table(Default::default()));
    let merged = match overrides {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config = SiteConfig::from_toml(merged)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn tree() -> ConfigTree {
        ConfigTree::new(json!({
            "sitename": "example.com",
            "site": {
                "base_url": "/blog/",
                "authors": [{"name": "Ada"}, {"name": "Grace"}],
                "meta": {"author": "Ada"}
            },
            "count": 3
        }))
    }

    // =========================================================================
    // Dotted-path lookup
    // =========================================================================

    #[test]
    fn get_path_top_level_key() {
        assert_eq!(tree().get_path("sitename", json!(null)), json!("example.com"));
    }

    #[test]
    fn get_path_nested_key() {
        assert_eq!(tree().get_path("site.base_url", json!("/")), json!("/blog/"));
    }

    #[test]
    fn get_path_numeric_segment_indexes_array() {
        assert_eq!(tree().get_path("site.authors.1.name", json!("")), json!("Grace"));
    }

    #[test]
    fn get_path_out_of_range_index_uses_default() {
        assert_eq!(tree().get_path("site.authors.9.name", json!("none")), json!("none"));
    }

    #[test]
    fn get_path_missing_segment_uses_default() {
        assert_eq!(tree().get_path("site.nope.deeper", json!(42)), json!(42));
    }

    #[test]
    fn get_path_through_scalar_uses_default() {
        assert_eq!(tree().get_path("count.inner", json!("d")), json!("d"));
        assert_eq!(tree().get_path("sitename.0", json!("d")), json!("d"));
    }

    #[test]
    fn get_path_non_numeric_segment_on_array_uses_default() {
        assert_eq!(tree().get_path("site.authors.first", json!("d")), json!("d"));
    }

    #[test]
    fn get_usize_accepts_numeric_strings() {
        let tree = ConfigTree::new(json!({"a": "12", "b": 7, "c": "x"}));
        assert_eq!(tree.get_usize("a"), Some(12));
        assert_eq!(tree.get_usize("b"), Some(7));
        assert_eq!(tree.get_usize("c"), None);
    }

    // =========================================================================
    // Typed sections
    // =========================================================================

    #[test]
    fn site_defaults_base_url() {
        let config = SiteConfig::from_value(json!({}));
        assert_eq!(config.site(), json!({"base_url": "/"}));
        assert_eq!(config.base_url(), "/");
    }

    #[test]
    fn default_layout_and_static_url() {
        let config = SiteConfig::default();
        assert_eq!(config.default_layout(), DEFAULT_LAYOUT);
        assert_eq!(config.static_url(), "/static");

        let config = SiteConfig::from_value(json!({
            "default_layout": "layouts/post.html",
            "static_url": "/assets/"
        }));
        assert_eq!(config.default_layout(), "layouts/post.html");
        assert_eq!(config.static_url(), "/assets");
    }

    #[test]
    fn sitename_is_normalized() {
        let config = SiteConfig::from_value(json!({"sitename": "https://www.example.com/"}));
        assert_eq!(config.sitename().as_deref(), Some("example.com"));
        assert_eq!(SiteConfig::default().sitename(), None);
    }

    #[test]
    fn extract_sitename_variants() {
        assert_eq!(extract_sitename("example.com"), "example.com");
        assert_eq!(extract_sitename("http://example.com"), "example.com");
        assert_eq!(extract_sitename("www.example.com"), "example.com");
    }

    #[test]
    fn pagination_defaults_when_absent() {
        let config = SiteConfig::default();
        assert_eq!(config.pagination().unwrap(), PaginationDefaults::default());
    }

    #[test]
    fn pagination_partial_override_keeps_independent_fields() {
        let config = SiteConfig::from_value(json!({
            "pagination": {"per_page": 5, "left_edge": 1}
        }));
        let p = config.pagination().unwrap();
        assert_eq!(p.per_page, 5);
        assert_eq!(p.left_edge, 1);
        assert_eq!(p.left_current, 3);
        assert_eq!(p.right_current, 4);
        assert_eq!(p.right_edge, 2);
    }

    #[test]
    fn pagination_falls_back_to_site_subtree() {
        let config = SiteConfig::from_value(json!({
            "site": {"pagination": {"per_page": 20}}
        }));
        assert_eq!(config.pagination().unwrap().per_page, 20);
    }

    #[test]
    fn hosting_missing_target_is_error() {
        let config = SiteConfig::default();
        assert!(matches!(
            config.hosting("s3"),
            Err(ConfigError::MissingHosting(t)) if t == "s3"
        ));
    }

    #[test]
    fn hosting_target_lookup_is_case_insensitive_fallback() {
        let config = SiteConfig::from_value(json!({
            "hosting": {"s3": {"aws_region": "eu-west-1", "purge_files": false}}
        }));
        let hosting = config.hosting("S3").unwrap();
        assert_eq!(hosting.aws_region, "eu-west-1");
        assert!(!hosting.purge_files);
        assert_eq!(hosting.purge_exclude_files, vec!["index.html", "error.html"]);
    }

    #[test]
    fn data_api_urls_from_top_level_or_site() {
        let top = SiteConfig::from_value(json!({"data_api_urls": {"a": "http://x/a.json"}}));
        assert_eq!(top.data_api_urls().unwrap()["a"], "http://x/a.json");

        let nested = SiteConfig::from_value(json!({"site": {"data_api_urls": {"b": "http://x/b"}}}));
        assert_eq!(nested.data_api_urls().unwrap()["b"], "http://x/b");
    }

    #[test]
    fn invalid_bundle_section_is_error() {
        let config = SiteConfig::from_value(json!({"assets_bundles": {"css": {"output": 3}}}));
        assert!(matches!(
            config.assets_bundles(),
            Err(ConfigError::Section { .. })
        ));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_zero_per_page() {
        let config = SiteConfig::from_value(json!({"pagination": {"per_page": 0}}));
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_upload_workers() {
        let config = SiteConfig::from_value(json!({"hosting": {"s3": {"max_uploads": 0}}}));
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        assert_eq!(effective_threads(Some(1)), 1);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(Some(10_000)), cores);
        assert_eq!(effective_threads(None), cores);
    }

    // =========================================================================
    // Loading and merging
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[site]\ntitle = \"a\"\nbase_url = \"/\"").unwrap();
        let overlay: toml::Value = toml::from_str("[site]\ntitle = \"b\"").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["site"]["title"].as_str(), Some("b"));
        assert_eq!(merged["site"]["base_url"].as_str(), Some("/"));
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.default_layout(), DEFAULT_LAYOUT);
    }

    #[test]
    fn load_config_reads_file_and_applies_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "sitename = \"example.com\"\n[site]\ntitle = \"Hello\"\n",
        )
        .unwrap();
        let overrides: toml::Value = toml::from_str("[site]\ntitle = \"Override\"").unwrap();

        let config = load_config(tmp.path(), Some(overrides)).unwrap();
        assert_eq!(config.sitename().as_deref(), Some("example.com"));
        assert_eq!(config.tree().get_str("site.title"), Some("Override"));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path(), None), Err(ConfigError::Toml(_))));
    }
}
