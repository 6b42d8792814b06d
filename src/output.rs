//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Static
//!     12 files copied
//!     Bundle: gen/main.css
//!
//! Pages
//!     about.md → about/index.html
//!     blog.html → blog/page/1/index.html (generated)
//!     blog.html → blog/index.html (generated)
//!
//! Built 3 pages (1 record skipped)
//! ```
//!
//! ## Publish
//!
//! ```text
//! Uploaded index.html (text/html)
//! FAILED static/app.js: connection reset
//!
//! Website: example.com (created, www alias created)
//! Purged 4 files in 1 batch
//! Uploaded 12 files, 1 failed
//! Endpoint: http://example.com.s3-website-us-east-1.amazonaws.com
//! ```
//!
//! Every command ends with [`separator`].
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::hosting::{DnsSetup, PurgeReport, UploadEvent, UploadReport};
use crate::site::{BuildReport, PublishReport};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 file`, `2 files`.
fn plural(n: usize, word: &str) -> String {
    count(n, word, &format!("{word}s"))
}

fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Trailing line printed after every command.
pub fn separator() -> String {
    "-".repeat(60)
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = vec!["Static".to_string()];
    lines.push(format!("{}{} copied", indent(1), plural(report.static_files, "file")));
    for bundle in &report.bundles {
        lines.push(format!("{}Bundle: {}", indent(1), bundle));
    }

    lines.push(String::new());
    lines.push("Pages".to_string());
    for page in &report.pages {
        let marker = if page.generated { " (generated)" } else { "" };
        lines.push(format!(
            "{}{} → {}{}",
            indent(1),
            page.source,
            page.output,
            marker
        ));
    }

    lines.push(String::new());
    let mut summary = format!("Built {}", plural(report.pages.len(), "page"));
    if report.skipped_records > 0 {
        summary.push_str(&format!(
            " ({} skipped)",
            plural(report.skipped_records, "record")
        ));
    }
    lines.push(summary);
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Publish
// ============================================================================

/// One line per finished upload, streamed while the pool runs.
pub fn format_upload_event(event: &UploadEvent) -> String {
    match event {
        UploadEvent::Uploaded { key, content_type } => {
            format!("Uploaded {} ({})", key, content_type)
        }
        UploadEvent::Failed { key, error } => format!("FAILED {}: {}", key, error),
    }
}

fn format_purge(purge: Option<&PurgeReport>) -> String {
    let Some(purge) = purge else {
        return "Purge skipped".to_string();
    };
    let mut line = format!(
        "Purged {} in {}",
        plural(purge.deleted(), "file"),
        count(purge.batches, "batch", "batches")
    );
    if purge.failed_batches > 0 {
        line.push_str(&format!(
            " ({} failed, {} not deleted)",
            count(purge.failed_batches, "batch", "batches"),
            plural(purge.failed_keys, "file")
        ));
    }
    line
}

fn format_upload(upload: &UploadReport) -> Vec<String> {
    let mut line = format!("Uploaded {}", plural(upload.uploaded.len(), "file"));
    if !upload.failed.is_empty() {
        line.push_str(&format!(", {} failed", upload.failed.len()));
    }
    let mut lines = vec![line];
    for failure in &upload.failed {
        lines.push(format!("{}{}: {}", indent(1), failure.key, failure.error));
    }
    lines
}

pub fn format_publish_output(report: &PublishReport) -> Vec<String> {
    let mut state = Vec::new();
    if report.created_website {
        state.push("created");
    }
    if report.created_www {
        state.push("www alias created");
    }
    let website = if state.is_empty() {
        format!("Website: {}", report.sitename)
    } else {
        format!("Website: {} ({})", report.sitename, state.join(", "))
    };

    let mut lines = vec![website, format_purge(report.purge.as_ref())];
    lines.extend(format_upload(&report.upload));
    lines.push(format!("Endpoint: {}", report.endpoint_url));
    lines
}

pub fn print_publish_output(report: &PublishReport) {
    for line in format_publish_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// DNS
// ============================================================================

pub fn format_dns_output(setup: &DnsSetup) -> Vec<String> {
    let zone = if setup.created_zone { "created" } else { "existing" };
    let mut lines = vec![format!(
        "Hosted zone {} ({}): {}",
        setup.zone.name.trim_end_matches('.'),
        setup.zone.id,
        zone
    )];
    for record in &setup.records {
        lines.push(format!("{}{} → {}", indent(1), record.name, record.target));
    }
    lines
}

pub fn print_dns_output(setup: &DnsSetup) {
    for line in format_dns_output(setup) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
