//! Local directory acting as a bucket host.
//!
//! ```text
//! <root>/
//! ├── example.com/               # bucket: one file per object key
//! ├── example.com.bucket.json    # bucket policy + website configuration
//! └── .zones.json                # hosted zones and their alias records
//! ```
//!
//! Content types are not persisted; a web server in front of the directory
//! is expected to derive them from extensions the same way the publisher does.

use super::backend::{AliasRecord, DnsProvider, HostedZone, ObjectStore, StoreError, WebsiteConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

const ZONES_FILE: &str = ".zones.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct BucketMeta {
    policy: Option<String>,
    website: Option<WebsiteConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ZoneEntry {
    #[serde(flatten)]
    zone: HostedZone,
    #[serde(default)]
    records: Vec<AliasRecord>,
}

#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    // Serializes read-modify-write cycles on the metadata files.
    meta_lock: Mutex<()>,
}

fn json_error(e: serde_json::Error) -> StoreError {
    StoreError::Other(e.to_string())
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            meta_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(StoreError::Other(format!("invalid bucket name `{bucket}`")));
        }
        Ok(self.root.join(bucket))
    }

    fn existing_bucket(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        let dir = self.bucket_dir(bucket)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::NotFound(bucket.to_string()))
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let dir = self.existing_bucket(bucket)?;
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::Other(format!("invalid object key `{key}`")));
        }
        Ok(dir.join(relative))
    }

    fn meta_path(&self, bucket: &str) -> PathBuf {
        self.root.join(format!("{bucket}.bucket.json"))
    }

    fn read_meta(&self, bucket: &str) -> Result<BucketMeta, StoreError> {
        match fs::read_to_string(self.meta_path(bucket)) {
            Ok(text) => serde_json::from_str(&text).map_err(json_error),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BucketMeta::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn update_meta(&self, bucket: &str, f: impl FnOnce(&mut BucketMeta)) -> Result<(), StoreError> {
        self.existing_bucket(bucket)?;
        let _guard = self.meta_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut meta = self.read_meta(bucket)?;
        f(&mut meta);
        let text = serde_json::to_string_pretty(&meta).map_err(json_error)?;
        fs::write(self.meta_path(bucket), text)?;
        Ok(())
    }

    fn read_zones(&self) -> Result<Vec<ZoneEntry>, StoreError> {
        match fs::read_to_string(self.root.join(ZONES_FILE)) {
            Ok(text) => serde_json::from_str(&text).map_err(json_error),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_zones(&self, zones: &[ZoneEntry]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        let text = serde_json::to_string_pretty(zones).map_err(json_error)?;
        fs::write(self.root.join(ZONES_FILE), text)?;
        Ok(())
    }
}

impl ObjectStore for DirectoryStore {
    fn head_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.existing_bucket(bucket).map(|_| ())
    }

    fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.bucket_dir(bucket)?)?;
        Ok(())
    }

    fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StoreError> {
        self.update_meta(bucket, |meta| meta.policy = Some(policy.to_string()))
    }

    fn put_bucket_website(&self, bucket: &str, config: &WebsiteConfig) -> Result<(), StoreError> {
        self.update_meta(bucket, |meta| meta.website = Some(config.clone()))
    }

    fn get_bucket_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>, StoreError> {
        self.existing_bucket(bucket)?;
        Ok(self.read_meta(bucket)?.website)
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(format!("{bucket}/{key}")),
            _ => StoreError::Io(e),
        })
    }

    fn list_objects(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.existing_bucket(bucket)?;
        let mut keys = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|e| StoreError::Other(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&dir) {
                let key: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                keys.push(key.join("/"));
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            match fs::remove_file(self.object_path(bucket, key)?) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl DnsProvider for DirectoryStore {
    fn list_hosted_zones(&self) -> Result<Vec<HostedZone>, StoreError> {
        Ok(self.read_zones()?.into_iter().map(|z| z.zone).collect())
    }

    fn create_hosted_zone(&self, domain: &str) -> Result<HostedZone, StoreError> {
        let _guard = self.meta_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut zones = self.read_zones()?;
        let zone = HostedZone {
            id: format!("Z{:04}", zones.len() + 1),
            name: format!("{}.", domain.trim_end_matches('.')),
        };
        zones.push(ZoneEntry {
            zone: zone.clone(),
            records: Vec::new(),
        });
        self.write_zones(&zones)?;
        Ok(zone)
    }

    fn upsert_alias_records(
        &self,
        zone_id: &str,
        records: &[AliasRecord],
    ) -> Result<(), StoreError> {
        let _guard = self.meta_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut zones = self.read_zones()?;
        let entry = zones
            .iter_mut()
            .find(|z| z.zone.id == zone_id)
            .ok_or_else(|| StoreError::NotFound(format!("hosted zone {zone_id}")))?;
        for record in records {
            entry.records.retain(|r| r.name != record.name);
            entry.records.push(record.clone());
        }
        self.write_zones(&zones)
    }
}
