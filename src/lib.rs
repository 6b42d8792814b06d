//! # Yass
//!
//! A static site generator for the common folks. Page sources in HTML,
//! Markdown or Jade are rendered through Tera layouts into `build/`, with
//! site data from `data/` and remote JSON endpoints. The build can then be
//! published to an object-store bucket configured as a website.
//!
//! # Architecture
//!
//! One [`site::Site`] session per build. It loads the config and data once,
//! then walks `pages/`:
//!
//! ```text
//! yass.toml + data/  →  Site (config, data, PageIndex, Renderer)
//! pages/**           →  PageMeta  →  PageJob(s)  →  build/**
//! build/**           →  Website (bucket, manifest, purge, upload)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `yass.toml` loading, overlay merge, dotted-path lookup, typed sections |
//! | [`data`] | `data/` directory scan and remote JSON endpoints |
//! | [`frontmatter`] | YAML `---` / TOML `+++` page headers |
//! | [`naming`] | Filename conventions: markup extensions, `index`, private `_`/`.` names |
//! | [`types`] | Shared types: [`types::Markup`], [`types::Record`] |
//! | [`page`] | Page metadata, destination paths and URLs, the build-scoped page cache |
//! | [`markup`] | Markdown (with table of contents) and Jade conversion |
//! | [`render`] | Tera environment, layout auto-wrap, page writing |
//! | [`generator`] | `_generator` expansion: one page per record, or paginated chunks |
//! | [`site`] | Build orchestration and publish sequencing |
//! | [`hosting`] | Object store and DNS traits, backends, the website publisher |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Tera With Auto-Wrapped Layouts
//!
//! Page bodies are themselves templates. Before compiling, a body without
//! `{% extends %}` gets the page's layout, and a body without a `body` block
//! gets wrapped in one, so a bare Markdown file renders inside the site
//! layout with no boilerplate. Autoescaping is off: page bodies are HTML.
//!
//! ## Deterministic Destinations
//!
//! Output path and URL depend only on the source path, the `slug` and the
//! `pretty_url` flag. `blog/post1.md` with `slug: hello-world` always lands in
//! `blog/hello-world/index.html` at `/blog/hello-world/`, so `link_to` and
//! `url_to` can resolve any page without building it first.
//!
//! ## Manifest-Tracked Publishing
//!
//! The bucket keeps a `.yass-manifest` object listing every key ever
//! uploaded. Purging deletes what the manifest lists (minus the protected
//! root documents), so files removed from the site disappear from the bucket
//! without a full listing on every publish. Uploads run on a bounded worker
//! pool and the manifest is written only after every upload has finished.

pub mod config;
pub mod data;
pub mod frontmatter;
pub mod generator;
pub mod hosting;
pub mod markup;
pub mod naming;
pub mod output;
pub mod page;
pub mod render;
pub mod site;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
