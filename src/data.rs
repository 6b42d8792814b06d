//! Structured data loading.
//!
//! Every file under `data/` with a structured-data extension is parsed and
//! exposed to templates as `data.<file stem>`:
//!
//! ```text
//! data/
//! ├── authors.json       → data.authors
//! ├── nav.yaml           → data.nav
//! └── blog/
//!     └── posts.toml     → data.posts
//! ```
//!
//! Traversal is sorted by file name, so when two files share a stem the one
//! visited last wins deterministically (a sub-directory `a/x.json` is visited
//! before a sibling `x.json`).
//!
//! Remote endpoints listed under `data_api_urls` are fetched once at build
//! start and merged into the same namespace. Any non-200 response or transport
//! failure aborts the build; there are no retries.

use crate::types::Record;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("HTTP client error: {0}")]
    Client(String),
    #[error("Data API URLS Error: `{name} -> {url}` returns status code {status}")]
    RemoteStatus { name: String, url: String, status: u16 },
    #[error("Data API URLS Error: `{name} -> {url}`: {message}")]
    Remote {
        name: String,
        url: String,
        message: String,
    },
}

/// Extensions recognized as data files.
pub const DATA_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

/// Outcome of a single remote request.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// A 200 response with its decoded JSON body.
    Json(Value),
    /// Any other status code.
    Status(u16),
}

/// Fetches JSON documents over HTTP. Allows swapping the transport in tests.
pub trait JsonFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, String>;
}

/// Blocking `reqwest` transport.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("yass/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl JsonFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, String> {
        let response = self.client.get(url).send().map_err(|e| e.to_string())?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Ok(Fetched::Status(status.as_u16()));
        }
        response
            .json::<Value>()
            .map(Fetched::Json)
            .map_err(|e| e.to_string())
    }
}

/// Load the data directory and any remote endpoints into one namespace.
///
/// The HTTP client is only created when endpoints are configured.
pub fn load_data(data_dir: &Path, api_urls: &BTreeMap<String, String>) -> Result<Record, DataError> {
    let mut data = load_data_dir(data_dir)?;
    if !api_urls.is_empty() {
        let fetcher = HttpFetcher::new()?;
        fetch_remote(&fetcher, api_urls, &mut data)?;
    }
    Ok(data)
}

/// Parse every data file under `data_dir`. A missing directory yields no data.
pub fn load_data_dir(data_dir: &Path) -> Result<Record, DataError> {
    let mut data = Record::new();
    if !data_dir.is_dir() {
        return Ok(data);
    }

    for entry in WalkDir::new(data_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if !DATA_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let value = parse_data_file(path, &ext)?;
        if data.insert(name.clone(), value).is_some() {
            log::debug!("data `{}` overwritten by {}", name, path.display());
        }
    }
    Ok(data)
}

fn parse_data_file(path: &Path, ext: &str) -> Result<Value, DataError> {
    let content = fs::read_to_string(path)?;
    match ext {
        "json" => serde_json::from_str(&content).map_err(|source| DataError::Json {
            path: path.to_path_buf(),
            source,
        }),
        "toml" => {
            let value: toml::Value = toml::from_str(&content).map_err(|source| DataError::Toml {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::to_value(value).map_err(|source| DataError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => serde_yaml::from_str(&content).map_err(|source| DataError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Fetch each named endpoint and store its body under the name.
///
/// Fails fast on the first endpoint that errors or answers with a non-200 status.
pub fn fetch_remote(
    fetcher: &impl JsonFetcher,
    api_urls: &BTreeMap<String, String>,
    data: &mut Record,
) -> Result<(), DataError> {
    for (name, url) in api_urls {
        log::info!("fetching data `{}` from {}", name, url);
        match fetcher.fetch(url) {
            Ok(Fetched::Json(value)) => {
                data.insert(name.clone(), value);
            }
            Ok(Fetched::Status(status)) => {
                return Err(DataError::RemoteStatus {
                    name: name.clone(),
                    url: url.clone(),
                    status,
                });
            }
            Err(message) => {
                return Err(DataError::Remote {
                    name: name.clone(),
                    url: url.clone(),
                    message,
                });
            }
        }
    }
    Ok(())
}
