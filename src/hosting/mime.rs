//! Content types for uploaded files.
//!
//! Lookup order: the standard table, then a supplementary table for web
//! fonts, scripts and video, then `application/octet-stream`.

use std::path::Path;

pub const DEFAULT_MIME: &str = "application/octet-stream";

const STANDARD: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("xml", "text/xml"),
    ("rss", "application/rss+xml"),
    ("atom", "application/atom+xml"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("webmanifest", "application/manifest+json"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("wasm", "application/wasm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("ico", "image/vnd.microsoft.icon"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("wav", "audio/x-wav"),
    ("webm", "video/webm"),
    ("mpeg", "video/mpeg"),
];

const SUPPLEMENTARY: &[(&str, &str)] = &[
    ("js", "application/javascript"),
    ("mov", "video/quicktime"),
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("3gp", "video/3gpp"),
    ("woff", "application/font-woff"),
    ("woff2", "font/woff2"),
    ("eot", "application/vnd.ms-fontobject"),
    ("ttf", "application/x-font-truetype"),
    ("otf", "application/x-font-opentype"),
    ("svg", "image/svg+xml"),
];

fn find(table: &[(&str, &'static str)], ext: &str) -> Option<&'static str> {
    table.iter().find(|(e, _)| *e == ext).map(|(_, mime)| *mime)
}

/// The content type to upload `path` with. Extensions match case-insensitively.
pub fn mime_type(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME;
    };
    let ext = ext.to_ascii_lowercase();
    find(STANDARD, &ext)
        .or_else(|| find(SUPPLEMENTARY, &ext))
        .unwrap_or(DEFAULT_MIME)
}
