//! Publishing a build directory to a bucket configured as a website.
//!
//! A publish walks through these steps, each exposed separately:
//!
//! 1. [`Website::status`]: does the bucket exist with a website configuration?
//! 2. [`Website::create_website`] / [`Website::create_www_website`]: only
//!    from the not-found state.
//! 3. [`Website::rebuild_manifest_from_bucket`]: resync the manifest with
//!    the live objects.
//! 4. [`Website::purge`]: delete manifest keys in batches of
//!    [`PURGE_BATCH_SIZE`], best effort.
//! 5. [`Website::upload`]: push every file through a bounded worker pool,
//!    wait for all of them, then record the uploaded keys in the manifest.

use super::backend::{ObjectStore, StoreError, WebsiteConfig};
use super::manifest::{self, MANIFEST_KEY, Manifest};
use super::mime::mime_type;
use crate::config::extract_sitename;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

pub const INDEX_DOCUMENT: &str = "index.html";
pub const ERROR_DOCUMENT: &str = "error.html";

/// Upper bound on keys per delete request.
pub const PURGE_BATCH_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Can't create website's bucket '{bucket}'. Error: {message}")]
    CannotCreate { bucket: String, message: String },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Upload pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketStatus {
    /// Exists and serves as a website.
    Website,
    /// Missing, or present without a website configuration.
    NotFound,
    /// Owned by someone else or otherwise inaccessible.
    Forbidden(String),
}

/// Progress of a single upload, streamed while the pool runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Uploaded { key: String, content_type: String },
    Failed { key: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Manifest keys eligible for deletion.
    pub requested: usize,
    /// Keys protected by the exclude list.
    pub excluded: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Keys in batches that failed.
    pub failed_keys: usize,
}

impl PurgeReport {
    pub fn deleted(&self) -> usize {
        self.requested - self.failed_keys
    }
}

struct LocalFile {
    path: PathBuf,
    key: String,
}

pub struct Website<'s, S: ObjectStore> {
    store: &'s S,
    sitename: String,
    www_sitename: String,
    region: String,
}

impl<'s, S: ObjectStore> Website<'s, S> {
    /// `sitename` is normalized: scheme and `www.` prefix are dropped.
    pub fn new(store: &'s S, sitename: &str, region: &str) -> Self {
        let sitename = extract_sitename(sitename);
        Self {
            store,
            www_sitename: format!("www.{sitename}"),
            sitename,
            region: region.to_string(),
        }
    }

    pub fn sitename(&self) -> &str {
        &self.sitename
    }

    pub fn www_sitename(&self) -> &str {
        &self.www_sitename
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> String {
        format!("{}.{}", self.sitename, website_domain(&self.region))
    }

    pub fn endpoint_url(&self) -> String {
        format!("http://{}", self.endpoint())
    }

    pub fn status(&self, bucket: &str) -> Result<BucketStatus, PublishError> {
        let head = self
            .store
            .head_bucket(bucket)
            .and_then(|()| self.store.get_bucket_website(bucket));
        match head {
            Ok(Some(_)) => Ok(BucketStatus::Website),
            Ok(None) => {
                debug!("bucket {bucket} exists without a website configuration");
                Ok(BucketStatus::NotFound)
            }
            Err(StoreError::NotFound(_)) => Ok(BucketStatus::NotFound),
            Err(StoreError::Forbidden(message)) => Ok(BucketStatus::Forbidden(message)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self) -> Result<bool, PublishError> {
        Ok(self.status(&self.sitename)? == BucketStatus::Website)
    }

    /// Create the site bucket with a public-read policy and website mode.
    ///
    /// Returns `false` when the website already exists.
    pub fn create_website(&self) -> Result<bool, PublishError> {
        let bucket = self.sitename.as_str();
        match self.status(bucket)? {
            BucketStatus::Website => Ok(false),
            BucketStatus::Forbidden(message) => Err(PublishError::CannotCreate {
                bucket: bucket.to_string(),
                message,
            }),
            BucketStatus::NotFound => {
                info!("creating website bucket {bucket}");
                self.store.create_bucket(bucket)?;
                self.store
                    .put_bucket_policy(bucket, &public_read_policy(bucket))?;
                self.store.put_bucket_website(
                    bucket,
                    &WebsiteConfig::website(INDEX_DOCUMENT, ERROR_DOCUMENT),
                )?;
                Ok(true)
            }
        }
    }

    /// Create `www.<site>`, redirecting every request to the site.
    ///
    /// Returns `false` when the alias already exists.
    pub fn create_www_website(&self) -> Result<bool, PublishError> {
        let bucket = self.www_sitename.as_str();
        match self.status(bucket)? {
            BucketStatus::Website => Ok(false),
            BucketStatus::Forbidden(message) => Err(PublishError::CannotCreate {
                bucket: bucket.to_string(),
                message,
            }),
            BucketStatus::NotFound => {
                info!("creating redirect bucket {bucket}");
                self.store.create_bucket(bucket)?;
                self.store
                    .put_bucket_website(bucket, &WebsiteConfig::redirect(&self.sitename))?;
                Ok(true)
            }
        }
    }

    pub fn load_manifest(&self) -> Manifest {
        manifest::load(self.store, &self.sitename)
    }

    /// Replace the manifest with the keys currently in the bucket.
    pub fn rebuild_manifest_from_bucket(&self) -> Result<Manifest, PublishError> {
        let manifest: Manifest = self.store.list_objects(&self.sitename)?.into_iter().collect();
        manifest::save(self.store, &self.sitename, &manifest)?;
        debug!("manifest rebuilt with {} keys", manifest.len());
        Ok(manifest)
    }

    /// Delete every manifest key not in `exclude`.
    ///
    /// Batch failures are logged and counted, never raised. The manifest
    /// itself is left as is.
    pub fn purge(&self, exclude: &[String]) -> PurgeReport {
        let manifest = self.load_manifest();
        let mut report = PurgeReport::default();
        let keys: Vec<String> = manifest
            .keys()
            .filter(|key| {
                let keep = exclude.iter().any(|e| e == key);
                if keep {
                    report.excluded += 1;
                }
                !keep
            })
            .map(str::to_string)
            .collect();
        report.requested = keys.len();

        for batch in keys.chunks(PURGE_BATCH_SIZE) {
            report.batches += 1;
            if let Err(e) = self.store.delete_objects(&self.sitename, batch) {
                warn!("purge batch of {} keys failed: {e}", batch.len());
                report.failed_batches += 1;
                report.failed_keys += batch.len();
            }
        }
        report
    }

    /// Upload every file under `build_dir` with at most `workers` in flight.
    ///
    /// Returns once every upload has finished. Successful keys are then added
    /// to the manifest; failures are reported, not raised.
    pub fn upload(
        &self,
        build_dir: &Path,
        workers: usize,
        events: Option<Sender<UploadEvent>>,
    ) -> Result<UploadReport, PublishError> {
        let files = collect_files(build_dir)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()?;

        let outcomes: Vec<(String, Result<&'static str, String>)> = pool.install(|| {
            files
                .par_iter()
                .map_with(events, |events, file| {
                    let outcome = self.upload_file(file);
                    if let Some(tx) = events {
                        let event = match &outcome {
                            Ok(content_type) => UploadEvent::Uploaded {
                                key: file.key.clone(),
                                content_type: content_type.to_string(),
                            },
                            Err(error) => UploadEvent::Failed {
                                key: file.key.clone(),
                                error: error.clone(),
                            },
                        };
                        // Receiver may have hung up; the report still has it.
                        let _ = tx.send(event);
                    }
                    (file.key.clone(), outcome)
                })
                .collect()
        });

        let mut report = UploadReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(_) => report.uploaded.push(key),
                Err(error) => {
                    warn!("upload of {key} failed: {error}");
                    report.failed.push(UploadFailure { key, error });
                }
            }
        }

        let mut manifest = self.load_manifest();
        manifest.extend(report.uploaded.iter().cloned());
        manifest::save(self.store, &self.sitename, &manifest)?;
        Ok(report)
    }

    fn upload_file(&self, file: &LocalFile) -> Result<&'static str, String> {
        let body = fs::read(&file.path).map_err(|e| e.to_string())?;
        let content_type = mime_type(&file.path);
        self.store
            .put_object(&self.sitename, &file.key, &body, content_type)
            .map_err(|e| e.to_string())?;
        Ok(content_type)
    }
}

/// Regional website host, e.g. `s3-website-us-east-1.amazonaws.com`.
pub fn website_domain(region: &str) -> String {
    format!("s3-website-{region}.amazonaws.com")
}

/// Bucket policy granting public `GetObject` on every key.
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "Allow Public Access to All Objects",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{bucket}/*"),
        }]
    })
    .to_string()
}

/// Files under `build_dir` with their `/`-separated keys, sorted.
fn collect_files(build_dir: &Path) -> Result<Vec<LocalFile>, PublishError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(build_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(build_dir) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if key == MANIFEST_KEY {
            continue;
        }
        files.push(LocalFile {
            path: entry.path().to_path_buf(),
            key,
        });
    }
    Ok(files)
}
