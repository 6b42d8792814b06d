//! Build sessions: one [`Site`] per build or publish invocation.
//!
//! ## Directory Layout
//!
//! ```text
//! <root>/
//! ├── yass.toml        # site config
//! ├── static/          # copied to build/static/, plus asset bundles
//! ├── content/         # reserved, not read by the build
//! ├── pages/           # page sources (.html, .md, .jade)
//! │   └── _partials/   # top-level `_` directories are never built
//! ├── templates/       # layouts and named templates
//! ├── data/            # .json/.yaml/.yml/.toml → `data.<stem>`
//! └── build/           # output, recreated on every build
//! ```
//!
//! ## Build
//!
//! [`Site::build`] deletes and recreates `build/`, copies `static/`, writes
//! the asset bundles, then walks `pages/` in file-name order. Each page is
//! rendered directly, or expanded by its `_generator` directive into one job
//! per record or chunk.
//!
//! ## Publish
//!
//! [`Site::publish_to`] builds, then drives the [`Website`] state machine:
//! create the bucket (and its `www.` alias) when missing, resync the
//! manifest, purge, upload.

use crate::config::{self, ConfigError, HostingConfig, SiteConfig};
use crate::data::{self, DataError};
use crate::generator::{self, GeneratorError};
use crate::hosting::{
    DirectoryStore, DnsProvider, DnsSetup, ObjectStore, PublishError, PurgeReport, StoreError,
    UploadEvent, UploadReport, Website, setup_dns,
};
use crate::naming::is_page_file;
use crate::page::{PageError, PageIndex};
use crate::render::{PageJob, RenderError, Renderer};
use crate::types::Record;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

/// Hosting target used when none is given.
pub const DEFAULT_TARGET: &str = "s3";

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Page error: {0}")]
    Page(#[from] PageError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Generator error in {page}: {source}")]
    Generator {
        page: String,
        source: GeneratorError,
    },
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
    #[error("DNS error: {0}")]
    Dns(#[from] StoreError),
    #[error("Asset bundle `{bundle}`: cannot read {path}: {source}")]
    Bundle {
        bundle: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Missing site name: set `sitename` in yass.toml or pass one explicitly")]
    MissingSitename,
    #[error("hosting.{0}.bucket_root is not set")]
    MissingBucketRoot(String),
    #[error("{failed} of {total} uploads failed")]
    IncompleteUpload { failed: usize, total: usize },
}

/// Fixed directory layout under a site root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub static_dir: PathBuf,
    pub content_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub data_dir: PathBuf,
    pub build_static_dir: PathBuf,
}

impl SitePaths {
    pub fn new(root: &Path) -> Self {
        let build_dir = root.join("build");
        Self {
            root: root.to_path_buf(),
            build_static_dir: build_dir.join("static"),
            build_dir,
            static_dir: root.join("static"),
            content_dir: root.join("content"),
            pages_dir: root.join("pages"),
            templates_dir: root.join("templates"),
            data_dir: root.join("data"),
        }
    }

    /// Delete `build/` and recreate it empty.
    pub fn clean_build_dir(&self) -> std::io::Result<()> {
        if self.build_dir.is_dir() {
            fs::remove_dir_all(&self.build_dir)?;
        }
        fs::create_dir_all(&self.build_dir)
    }
}

/// A written page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPage {
    /// Source path relative to `pages/`.
    pub source: String,
    /// Output path relative to `build/`.
    pub output: String,
    /// Produced by a `_generator` directive.
    pub generated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub static_files: usize,
    /// Output paths of asset bundles, relative to `build/static/`.
    pub bundles: Vec<String>,
    pub pages: Vec<BuiltPage>,
    /// Generator records skipped for lack of a slug.
    pub skipped_records: usize,
}

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub target: String,
    /// Overrides `sitename` from the config.
    pub sitename: Option<String>,
    /// Purge old files first (also requires `purge_files` in the config).
    pub purge: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            sitename: None,
            purge: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub build: BuildReport,
    pub sitename: String,
    pub endpoint_url: String,
    pub created_website: bool,
    pub created_www: bool,
    /// `None` when purging was disabled.
    pub purge: Option<PurgeReport>,
    pub upload: UploadReport,
}

impl PublishReport {
    /// `Err` when any file failed to upload.
    pub fn check_upload(&self) -> Result<(), SiteError> {
        if self.upload.is_complete() {
            return Ok(());
        }
        Err(SiteError::IncompleteUpload {
            failed: self.upload.failed.len(),
            total: self.upload.failed.len() + self.upload.uploaded.len(),
        })
    }
}

/// One build session: config, data, page cache and templates.
pub struct Site {
    paths: SitePaths,
    config: SiteConfig,
    data: Record,
    pages: Arc<PageIndex>,
    renderer: Renderer,
}

impl Site {
    /// Load `yass.toml` (with `overrides` merged on top) and the site data.
    pub fn open(root: &Path, overrides: Option<toml::Value>) -> Result<Self, SiteError> {
        let config = config::load_config(root, overrides)?;
        let paths = SitePaths::new(root);
        let data = data::load_data(&paths.data_dir, &config.data_api_urls()?)?;
        Self::with_data(root, config, data)
    }

    /// Start a session from an already loaded config and data namespace.
    pub fn with_data(root: &Path, config: SiteConfig, data: Record) -> Result<Self, SiteError> {
        let paths = SitePaths::new(root);
        let pages = Arc::new(PageIndex::new(&paths.pages_dir, config.site_meta()));
        let renderer = Renderer::new(&paths.templates_dir, &config, &data, Arc::clone(&pages))?;
        Ok(Self {
            paths,
            config,
            data,
            pages,
            renderer,
        })
    }

    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn pages(&self) -> &PageIndex {
        &self.pages
    }

    pub fn clean_build_dir(&self) -> Result<(), SiteError> {
        Ok(self.paths.clean_build_dir()?)
    }

    /// Copy `static/` into `build/static/` and write the asset bundles.
    ///
    /// Returns the number of copied files and the bundle outputs.
    pub fn build_static(&self) -> Result<(usize, Vec<String>), SiteError> {
        fs::create_dir_all(&self.paths.build_static_dir)?;
        let copied = copy_tree(&self.paths.static_dir, &self.paths.build_static_dir)?;

        let mut outputs = Vec::new();
        for (name, bundle) in self.config.assets_bundles()? {
            let mut parts = Vec::with_capacity(bundle.contents.len());
            for item in &bundle.contents {
                let path = self.paths.static_dir.join(item);
                let text = fs::read_to_string(&path).map_err(|source| SiteError::Bundle {
                    bundle: name.clone(),
                    path: path.clone(),
                    source,
                })?;
                parts.push(text);
            }
            let dest = self.paths.build_static_dir.join(&bundle.output);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, parts.join("\n"))?;
            debug!("bundle {} → {}", name, dest.display());
            outputs.push(bundle.output);
        }
        Ok((copied, outputs))
    }

    /// Render every public page under `pages/`.
    pub fn build_pages(&mut self, report: &mut BuildReport) -> Result<(), SiteError> {
        let pages_dir = self.paths.pages_dir.clone();
        if !pages_dir.is_dir() {
            return Ok(());
        }

        let walker = WalkDir::new(&pages_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_type().is_dir() && is_private_dir(e)));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy();
            if !is_page_file(&filename) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&pages_dir) else {
                continue;
            };
            let source = relative_key(relative);
            self.build_page(&source, report)?;
        }
        Ok(())
    }

    fn build_page(&mut self, source: &str, report: &mut BuildReport) -> Result<(), SiteError> {
        let meta = self.pages.get(source)?;
        let body = self.pages.body(source)?;
        let job = PageJob::for_page(meta.as_ref().clone(), body);

        let Some(directive) = &meta.generator else {
            let output = self.create_page(&job)?;
            report.pages.push(BuiltPage {
                source: source.to_string(),
                output,
                generated: false,
            });
            return Ok(());
        };

        let defaults = self.config.pagination()?;
        let expansion = generator::expand(&job, directive, &self.data, &defaults).map_err(
            |e| SiteError::Generator {
                page: source.to_string(),
                source: e,
            },
        )?;
        report.skipped_records += expansion.skipped;
        for generated in &expansion.jobs {
            let output = self.create_page(generated)?;
            report.pages.push(BuiltPage {
                source: source.to_string(),
                output,
                generated: true,
            });
        }
        Ok(())
    }

    /// Render a single job into `build/`. Returns its path relative to `build/`.
    pub fn create_page(&mut self, job: &PageJob) -> Result<String, SiteError> {
        let dest = self.renderer.create_page(&self.paths.build_dir, job)?;
        let relative = dest.strip_prefix(&self.paths.build_dir).unwrap_or(&dest);
        Ok(relative_key(relative))
    }

    /// Clean, copy static files, then render all pages.
    pub fn build(&mut self) -> Result<BuildReport, SiteError> {
        info!("building {}", self.paths.root.display());
        self.clean_build_dir()?;
        let (static_files, bundles) = self.build_static()?;
        let mut report = BuildReport {
            static_files,
            bundles,
            ..BuildReport::default()
        };
        self.build_pages(&mut report)?;
        info!("built {} pages", report.pages.len());
        Ok(report)
    }

    fn sitename(&self, explicit: Option<&str>) -> Result<String, SiteError> {
        explicit
            .map(config::extract_sitename)
            .filter(|s| !s.is_empty())
            .or_else(|| self.config.sitename())
            .ok_or(SiteError::MissingSitename)
    }

    /// The directory store configured for `target`.
    pub fn directory_store(&self, target: &str) -> Result<DirectoryStore, SiteError> {
        let hosting = self.config.hosting(target)?;
        let root = hosting
            .bucket_root
            .ok_or_else(|| SiteError::MissingBucketRoot(target.to_string()))?;
        Ok(DirectoryStore::new(self.paths.root.join(root)))
    }

    /// Build and publish to the directory store configured for the target.
    pub fn publish(
        &mut self,
        options: &PublishOptions,
        events: Option<Sender<UploadEvent>>,
    ) -> Result<PublishReport, SiteError> {
        let build = self.build()?;
        self.publish_build(build, options, events)
    }

    /// Publish an existing `build/` to the directory store configured for the target.
    pub fn publish_build(
        &self,
        build: BuildReport,
        options: &PublishOptions,
        events: Option<Sender<UploadEvent>>,
    ) -> Result<PublishReport, SiteError> {
        let store = self.directory_store(&options.target)?;
        self.publish_build_to(&store, build, options, events)
    }

    /// Build and publish to `store`.
    pub fn publish_to<S: ObjectStore>(
        &mut self,
        store: &S,
        options: &PublishOptions,
        events: Option<Sender<UploadEvent>>,
    ) -> Result<PublishReport, SiteError> {
        let build = self.build()?;
        self.publish_build_to(store, build, options, events)
    }

    /// Publish the files of `build` to `store`: create the website when
    /// missing, rebuild the manifest, purge, then upload.
    pub fn publish_build_to<S: ObjectStore>(
        &self,
        store: &S,
        build: BuildReport,
        options: &PublishOptions,
        events: Option<Sender<UploadEvent>>,
    ) -> Result<PublishReport, SiteError> {
        let hosting: HostingConfig = self.config.hosting(&options.target)?;
        let sitename = self.sitename(options.sitename.as_deref())?;
        let website = Website::new(store, &sitename, &hosting.aws_region);

        let mut created_website = false;
        let mut created_www = false;
        if !website.exists()? {
            created_website = website.create_website()?;
            if created_website {
                created_www = website.create_www_website()?;
            }
        }

        website.rebuild_manifest_from_bucket()?;

        let purge = (options.purge && hosting.purge_files)
            .then(|| website.purge(&hosting.purge_exclude_files));

        let workers = config::effective_threads(hosting.max_uploads);
        info!("uploading {} with {} workers", self.paths.build_dir.display(), workers);
        let upload = website.upload(&self.paths.build_dir, workers, events)?;

        Ok(PublishReport {
            build,
            endpoint_url: website.endpoint_url(),
            sitename: website.sitename().to_string(),
            created_website,
            created_www,
            purge,
            upload,
        })
    }

    /// Set up DNS for the site through `dns`.
    pub fn setup_dns_with(
        &self,
        dns: &impl DnsProvider,
        target: &str,
        sitename: Option<&str>,
    ) -> Result<DnsSetup, SiteError> {
        let hosting = self.config.hosting(target)?;
        let sitename = self.sitename(sitename)?;
        Ok(setup_dns(dns, &sitename, &hosting.aws_region)?)
    }

    /// Set up DNS in the directory store configured for the target.
    pub fn setup_dns(&self, target: &str, sitename: Option<&str>) -> Result<DnsSetup, SiteError> {
        let store = self.directory_store(target)?;
        self.setup_dns_with(&store, target, sitename)
    }
}

fn is_private_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('_')
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recursively copy `src` into `dst`, skipping dotfiles. Returns the file count.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize, SiteError> {
    if !src.is_dir() {
        return Ok(0);
    }
    let mut copied = 0;
    let walker = WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
