//! Shared test utilities for the yass test suite.
//!
//! [`SiteFixture`] writes a throwaway site root into a temp directory, and
//! the lookup helpers panic with the available options on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fixture = SiteFixture::new().with_default_layout();
//! fixture.page("blog/post1.md", "---\nslug: hello-world\n---\nHello");
//!
//! let mut site = fixture.open();
//! let report = site.build().unwrap();
//! let page = find_built(&report, "blog/post1.md");
//! assert_eq!(page.output, "blog/hello-world/index.html");
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::site::{BuildReport, BuiltPage, Site};

/// Layout written by [`SiteFixture::with_default_layout`].
pub const DEFAULT_LAYOUT: &str =
    "<html><title>{{ page.title }}</title>{% block body %}{% endblock body %}</html>";

// =========================================================================
// Fixture setup
// =========================================================================

/// A site root in a temp directory. Removed on drop.
pub struct SiteFixture {
    dir: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `templates/layouts/default.html`.
    pub fn with_default_layout(self) -> Self {
        self.file("templates/layouts/default.html", DEFAULT_LAYOUT);
        self
    }

    /// Write `yass.toml`.
    pub fn with_config(self, toml: &str) -> Self {
        self.file("yass.toml", toml);
        self
    }

    /// Write a file relative to the site root, creating parent directories.
    pub fn file(&self, relative: &str, contents: &str) {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Write a page source under `pages/`.
    pub fn page(&self, relative: &str, contents: &str) {
        self.file(&format!("pages/{relative}"), contents);
    }

    /// Read a file relative to the site root. Panics with the path on miss.
    pub fn read(&self, relative: &str) -> String {
        let path = self.dir.path().join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    }

    /// Open a build session on the fixture.
    pub fn open(&self) -> Site {
        Site::open(self.dir.path(), None).unwrap()
    }
}

// =========================================================================
// Build report lookups. Both panic with a clear message on miss.
// =========================================================================

/// Output paths of every written page, in build order.
pub fn output_paths(report: &BuildReport) -> Vec<&str> {
    report.pages.iter().map(|p| p.output.as_str()).collect()
}

/// The first page built from `source`. Panics if not found.
pub fn find_built<'a>(report: &'a BuildReport, source: &str) -> &'a BuiltPage {
    report
        .pages
        .iter()
        .find(|p| p.source == source)
        .unwrap_or_else(|| {
            let sources: Vec<&str> = report.pages.iter().map(|p| p.source.as_str()).collect();
            panic!("page '{source}' not built. Built: {sources:?}")
        })
}
