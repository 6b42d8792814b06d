//! Source filename conventions.
//!
//! The page tree is driven by filenames alone:
//! - `about.md`, `index.html`, `blog/post.jade` are pages (recognized extensions)
//! - `_partial.html` and `.draft.md` are private and never built
//! - directories whose path (relative to `pages/`) starts with `_` are skipped
//! - `index.*` files map onto their directory's `index.html`
//!
//! Link targets may carry a fragment: `docs/setup.md#install` looks up
//! `docs/setup.md` and reattaches `#install` to the resolved URL.

use crate::types::Markup;

/// Names starting with `_` or `.` are partials, drafts, or dotfiles.
pub fn is_private_name(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

/// Split `name.ext` into `(name, Some(markup))` when `ext` is a page format.
pub fn split_markup_extension(filename: &str) -> (&str, Option<Markup>) {
    if let Some((stem, ext)) = filename.rsplit_once('.')
        && !stem.is_empty()
        && let Some(markup) = Markup::from_extension(ext)
    {
        return (stem, Some(markup));
    }
    (filename, None)
}

/// Whether a filename is a buildable page (public name, recognized format).
pub fn is_page_file(filename: &str) -> bool {
    !is_private_name(filename) && split_markup_extension(filename).1.is_some()
}

/// Filename with its markup extension stripped (`post.md` → `post`).
pub fn strip_markup_extension(filename: &str) -> &str {
    split_markup_extension(filename).0
}

/// `index.html`, `index.md`, `index.jade`.
pub fn is_index_file(filename: &str) -> bool {
    matches!(split_markup_extension(filename), ("index", Some(_)))
}

/// URL-safe slug (`Hello World!` → `hello-world`).
pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

/// Split a link target into the page path and an optional `#fragment`.
pub fn split_fragment(target: &str) -> (&str, Option<&str>) {
    match target.split_once('#') {
        Some((page, fragment)) => (page, Some(fragment)),
        None => (target, None),
    }
}
