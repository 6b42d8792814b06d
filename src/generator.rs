//! Data-driven page expansion.
//!
//! A page whose front matter carries a `_generator` directive is expanded
//! into many output pages from a named data source:
//!
//! ```yaml
//! ---
//! _generator:
//!   type: single            # one page per record
//!   data_source: posts
//!   slug: "blog/{id}-{title}"
//! ---
//! ```
//!
//! ```yaml
//! ---
//! _generator:
//!   type: pagination        # one page per chunk of `per_page` records
//!   data_source: posts
//!   per_page: 5
//!   slug: "blog/page/{page_num}"
//!   index_slug: "blog"      # page 1 is also written here
//! ---
//! ```
//!
//! Expansion is pure: it turns the base [`PageJob`] into one job per output
//! page, each carrying its own deep copy of the page metadata. The site build
//! renders the jobs afterwards.

use crate::config::{PaginationDefaults, value_as_usize};
use crate::page::PageMeta;
use crate::render::{PageJob, normalize_filepath};
use crate::types::Record;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Generator data source `{0}` not found in data")]
    MissingDataSource(String),
    #[error("Generator data source `{0}` is not a list")]
    NotAList(String),
    #[error("Pagination generator for {0} requires a `slug` template")]
    MissingSlug(String),
    #[error("Pagination generator for {0}: per_page must be at least 1")]
    InvalidPerPage(String),
    #[error("Slug template `{template}`: {reason}")]
    Slug { template: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Single,
    Pagination,
}

/// The `_generator` block of a page's front matter.
///
/// Window parameters left unset fall back to the site's pagination defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorDirective {
    #[serde(rename = "type")]
    pub kind: GeneratorKind,
    pub data_source: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub index_slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub per_page: Option<usize>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub left_edge: Option<usize>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub left_current: Option<usize>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub right_current: Option<usize>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub right_edge: Option<usize>,
    /// Cap on the number of records used, applied before chunking.
    #[serde(default, deserialize_with = "lenient_usize")]
    pub limit: Option<usize>,
    /// Passed through to `page.paginator.padding` for templates.
    #[serde(default, deserialize_with = "lenient_usize")]
    pub padding: Option<usize>,
}

/// Accept `5` and `"5"` alike; front matter authors write both.
fn lenient_usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => value_as_usize(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected a non-negative integer, found {v}"))),
    }
}

/// One entry of a pagination window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPage {
    pub number: usize,
    pub url: String,
    pub current: bool,
}

/// Page controls for one chunk of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginator {
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
    pub left_edge: usize,
    pub left_current: usize,
    pub right_current: usize,
    pub right_edge: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: Option<usize>,
    pub next_page: Option<usize>,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub slug: String,
    pub index_slug: Option<String>,
    pub padding: Option<usize>,
    /// `1 2 … 8 9 10 … 19 20`; `None` marks a gap.
    pub window: Vec<Option<WindowPage>>,
}

/// Resolved pagination parameters for one directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub per_page: usize,
    pub left_edge: usize,
    pub left_current: usize,
    pub right_current: usize,
    pub right_edge: usize,
    pub padding: Option<usize>,
}

impl PaginationParams {
    /// Each parameter comes from the directive, then the site defaults.
    pub fn resolve(directive: &GeneratorDirective, defaults: &PaginationDefaults) -> Self {
        Self {
            per_page: directive.per_page.unwrap_or(defaults.per_page),
            left_edge: directive.left_edge.unwrap_or(defaults.left_edge),
            left_current: directive.left_current.unwrap_or(defaults.left_current),
            right_current: directive.right_current.unwrap_or(defaults.right_current),
            right_edge: directive.right_edge.unwrap_or(defaults.right_edge),
            padding: directive.padding,
        }
    }
}

/// Page numbers shown in the controls, Flask-SQLAlchemy `iter_pages` style.
///
/// Shows the first `left_edge` pages, the pages around `page`, and the last
/// `right_edge` pages, with `None` wherever numbers are skipped.
pub fn iter_pages(page: usize, pages: usize, params: &PaginationParams) -> Vec<Option<usize>> {
    let mut window = Vec::new();
    let mut last = 0;
    let page = page as i64;
    for num in 1..=pages {
        let n = num as i64;
        let in_left_edge = num <= params.left_edge;
        let near_current =
            n > page - params.left_current as i64 - 1 && n < page + params.right_current as i64;
        let in_right_edge = num + params.right_edge > pages;
        if in_left_edge || near_current || in_right_edge {
            if last + 1 != num {
                window.push(None);
            }
            window.push(Some(num));
            last = num;
        }
    }
    window
}

impl Paginator {
    pub fn new(
        total: usize,
        page: usize,
        params: &PaginationParams,
        slug: &str,
        index_slug: Option<&str>,
    ) -> Result<Self, GeneratorError> {
        let pages = total.div_ceil(params.per_page.max(1));
        let has_prev = page > 1;
        let has_next = page < pages;
        let prev_page = has_prev.then(|| page - 1);
        let next_page = has_next.then(|| page + 1);
        let prev_url = prev_page
            .map(|n| page_url(slug, index_slug, n))
            .transpose()?;
        let next_url = next_page
            .map(|n| page_url(slug, index_slug, n))
            .transpose()?;

        let window = iter_pages(page, pages, params)
            .into_iter()
            .map(|entry| {
                entry
                    .map(|number| {
                        page_url(slug, index_slug, number).map(|url| WindowPage {
                            number,
                            url,
                            current: number == page,
                        })
                    })
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            total,
            page,
            per_page: params.per_page,
            pages,
            left_edge: params.left_edge,
            left_current: params.left_current,
            right_current: params.right_current,
            right_edge: params.right_edge,
            has_prev,
            has_next,
            prev_page,
            next_page,
            prev_url,
            next_url,
            slug: slug.to_string(),
            index_slug: index_slug.map(str::to_string),
            padding: params.padding,
            window,
        })
    }
}

/// Public URL of listing page `number`. Page 1 links to the index slug when there is one.
fn page_url(slug: &str, index_slug: Option<&str>, number: usize) -> Result<String, GeneratorError> {
    if number == 1
        && let Some(index) = index_slug
    {
        return Ok(rooted_url(index));
    }
    let mut fields = Record::new();
    fields.insert("page_num".into(), Value::from(number));
    Ok(rooted_url(&format_slug(slug, &fields)?))
}

/// `/` + slug, with a trailing `/` unless the slug names an `.html` file.
pub fn rooted_url(slug: &str) -> String {
    let trimmed = slug.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.ends_with(".html") {
        format!("/{trimmed}")
    } else {
        format!("/{trimmed}/")
    }
}

/// Substitute `{field}` placeholders from a record.
///
/// `{{` and `}}` produce literal braces. A `:spec` suffix inside a
/// placeholder is ignored.
pub fn format_slug(template: &str, fields: &Record) -> Result<String, GeneratorError> {
    let err = |reason: String| GeneratorError::Slug {
        template: template.to_string(),
        reason,
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(err("unclosed `{`".into())),
                    }
                }
                let key = name.split(':').next().unwrap_or_default().trim();
                match fields.get(key) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(Value::Null) | None => {
                        return Err(err(format!("missing field `{key}`")));
                    }
                    Some(other) => out.push_str(&other.to_string()),
                }
            }
            '}' => return Err(err("single `}` outside a placeholder".into())),
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// Jobs produced from one generator page.
#[derive(Debug, Default)]
pub struct ExpansionReport {
    pub jobs: Vec<PageJob>,
    /// Records dropped because they produced no slug.
    pub skipped: usize,
}

/// Expand a generator page into its output jobs.
pub fn expand(
    base: &PageJob,
    directive: &GeneratorDirective,
    data: &Record,
    defaults: &PaginationDefaults,
) -> Result<ExpansionReport, GeneratorError> {
    let records = match data.get(&directive.data_source) {
        Some(Value::Array(records)) => records,
        Some(_) => return Err(GeneratorError::NotAList(directive.data_source.clone())),
        None => return Err(GeneratorError::MissingDataSource(directive.data_source.clone())),
    };
    let meta = base.page.clone().unwrap_or_default();
    match directive.kind {
        GeneratorKind::Single => Ok(expand_single(base, &meta, directive, records)),
        GeneratorKind::Pagination => expand_pagination(base, &meta, directive, records, defaults),
    }
}

const OVERLAY_KEYS: [&str; 3] = ["title", "slug", "description"];

fn expand_single(
    base: &PageJob,
    meta: &PageMeta,
    directive: &GeneratorDirective,
    records: &[Value],
) -> ExpansionReport {
    let mut report = ExpansionReport::default();

    for (i, record) in records.iter().enumerate() {
        let Value::Object(fields) = record else {
            log::warn!("{}: record {} is not a mapping, skipping", directive.data_source, i);
            report.skipped += 1;
            continue;
        };

        let mut page = meta.clone();
        for key in OVERLAY_KEYS {
            let Some(value) = fields.get(key).and_then(scalar_string) else {
                continue;
            };
            match key {
                "title" => page.title = value,
                "slug" => page.slug = Some(value),
                _ => page.description = value,
            }
        }

        if let Some(template) = &directive.slug {
            match format_slug(template, fields) {
                Ok(slug) => page.slug = Some(slug),
                Err(e) => {
                    log::warn!("{}: record {}: {}, skipping", directive.data_source, i, e);
                    report.skipped += 1;
                    continue;
                }
            }
        }

        let Some(slug) = page.slug.clone().filter(|s| !s.trim_matches('/').is_empty()) else {
            log::warn!(
                "{}: record {} is missing `slug`, skipping page",
                directive.data_source,
                i
            );
            report.skipped += 1;
            continue;
        };

        page.url = rooted_url(&slug);
        page.filepath = normalize_filepath(&slug);
        page.context = Some(record.clone());
        report.jobs.push(PageJob {
            filepath: slug,
            page: Some(page),
            ..base.clone()
        });
    }
    report
}

fn expand_pagination(
    base: &PageJob,
    meta: &PageMeta,
    directive: &GeneratorDirective,
    records: &[Value],
    defaults: &PaginationDefaults,
) -> Result<ExpansionReport, GeneratorError> {
    let source_page = || base.filepath.clone();
    let params = PaginationParams::resolve(directive, defaults);
    if params.per_page == 0 {
        return Err(GeneratorError::InvalidPerPage(source_page()));
    }
    let slug = directive
        .slug
        .as_deref()
        .ok_or_else(|| GeneratorError::MissingSlug(source_page()))?;
    let index_slug = directive.index_slug.as_deref();

    let records = match directive.limit {
        Some(limit) => &records[..limit.min(records.len())],
        None => records,
    };

    let mut report = ExpansionReport::default();
    for (i, chunk) in records.chunks(params.per_page).enumerate() {
        let page_num = i + 1;
        let paginator = Paginator::new(records.len(), page_num, &params, slug, index_slug)?;

        let mut fields = Record::new();
        fields.insert("page_num".into(), Value::from(page_num));
        let page_slug = format_slug(slug, &fields)?;

        let mut page = meta.clone();
        page.url = rooted_url(&page_slug);
        page.filepath = normalize_filepath(&page_slug);
        page.context = Some(Value::Array(chunk.to_vec()));
        page.paginator = Some(paginator);

        let job = PageJob {
            filepath: page_slug,
            page: Some(page),
            ..base.clone()
        };

        if page_num == 1
            && let Some(index) = index_slug
        {
            let mut alias = job.clone();
            alias.filepath = index.to_string();
            if let Some(page) = alias.page.as_mut() {
                page.filepath = normalize_filepath(index);
            }
            report.jobs.push(job);
            report.jobs.push(alias);
        } else {
            report.jobs.push(job);
        }
    }
    Ok(report)
}

pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
