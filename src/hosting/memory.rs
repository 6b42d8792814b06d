//! Process-local object store and DNS provider.

use super::backend::{AliasRecord, DnsProvider, HostedZone, ObjectStore, StoreError, WebsiteConfig};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct Bucket {
    policy: Option<String>,
    website: Option<WebsiteConfig>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug)]
struct Zone {
    zone: HostedZone,
    records: BTreeMap<String, AliasRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, Bucket>>,
    forbidden: Mutex<HashSet<String>>,
    refused_keys: Mutex<HashSet<String>>,
    zones: Mutex<Vec<Zone>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request against `bucket` answer "forbidden", as when the
    /// name belongs to another account.
    pub fn forbid(&self, bucket: &str) {
        lock(&self.forbidden).insert(bucket.to_string());
    }

    /// Make every `put_object` of `key` fail, in any bucket.
    pub fn refuse_put(&self, key: &str) {
        lock(&self.refused_keys).insert(key.to_string());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        lock(&self.buckets)
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        lock(&self.buckets).get(bucket).and_then(|b| b.policy.clone())
    }

    pub fn records(&self, zone_id: &str) -> Vec<AliasRecord> {
        lock(&self.zones)
            .iter()
            .find(|z| z.zone.id == zone_id)
            .map(|z| z.records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check(&self, bucket: &str) -> Result<(), StoreError> {
        if lock(&self.forbidden).contains(bucket) {
            return Err(StoreError::Forbidden(bucket.to_string()));
        }
        Ok(())
    }

    fn with_bucket<R>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut Bucket) -> R,
    ) -> Result<R, StoreError> {
        self.check(bucket)?;
        let mut buckets = lock(&self.buckets);
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NotFound(bucket.to_string()))?;
        Ok(f(entry))
    }
}

impl ObjectStore for MemoryStore {
    fn head_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.with_bucket(bucket, |_| ())
    }

    fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.check(bucket)?;
        lock(&self.buckets).entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StoreError> {
        self.with_bucket(bucket, |b| b.policy = Some(policy.to_string()))
    }

    fn put_bucket_website(&self, bucket: &str, config: &WebsiteConfig) -> Result<(), StoreError> {
        self.with_bucket(bucket, |b| b.website = Some(config.clone()))
    }

    fn get_bucket_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>, StoreError> {
        self.with_bucket(bucket, |b| b.website.clone())
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        if lock(&self.refused_keys).contains(key) {
            return Err(StoreError::Other(format!("put refused for {key}")));
        }
        self.with_bucket(bucket, |b| {
            b.objects.insert(
                key.to_string(),
                StoredObject {
                    body: body.to_vec(),
                    content_type: content_type.to_string(),
                },
            );
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.with_bucket(bucket, |b| b.objects.get(key).map(|o| o.body.clone()))?
            .ok_or_else(|| StoreError::NotFound(format!("{bucket}/{key}")))
    }

    fn list_objects(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
        self.with_bucket(bucket, |b| b.objects.keys().cloned().collect())
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StoreError> {
        self.with_bucket(bucket, |b| {
            for key in keys {
                b.objects.remove(key);
            }
        })
    }
}

impl DnsProvider for MemoryStore {
    fn list_hosted_zones(&self) -> Result<Vec<HostedZone>, StoreError> {
        Ok(lock(&self.zones).iter().map(|z| z.zone.clone()).collect())
    }

    fn create_hosted_zone(&self, domain: &str) -> Result<HostedZone, StoreError> {
        let mut zones = lock(&self.zones);
        let zone = HostedZone {
            id: format!("Z{:04}", zones.len() + 1),
            name: format!("{}.", domain.trim_end_matches('.')),
        };
        zones.push(Zone {
            zone: zone.clone(),
            records: BTreeMap::new(),
        });
        Ok(zone)
    }

    fn upsert_alias_records(
        &self,
        zone_id: &str,
        records: &[AliasRecord],
    ) -> Result<(), StoreError> {
        let mut zones = lock(&self.zones);
        let zone = zones
            .iter_mut()
            .find(|z| z.zone.id == zone_id)
            .ok_or_else(|| StoreError::NotFound(format!("hosted zone {zone_id}")))?;
        for record in records {
            zone.records.insert(record.name.clone(), record.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bucket_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.head_bucket("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn forbidden_bucket_rejects_everything() {
        let store = MemoryStore::new();
        store.forbid("taken.com");
        assert!(matches!(store.head_bucket("taken.com"), Err(StoreError::Forbidden(_))));
        assert!(matches!(store.create_bucket("taken.com"), Err(StoreError::Forbidden(_))));
    }

    #[test]
    fn refused_key_fails_only_that_put() {
        let store = MemoryStore::new();
        store.create_bucket("b").unwrap();
        store.refuse_put("bad.js");
        assert!(matches!(
            store.put_object("b", "bad.js", b"x", "application/javascript"),
            Err(StoreError::Other(_))
        ));
        store.put_object("b", "ok.js", b"x", "application/javascript").unwrap();
        assert_eq!(store.list_objects("b").unwrap(), vec!["ok.js"]);
    }

    #[test]
    fn create_bucket_is_idempotent() {
        let store = MemoryStore::new();
        store.create_bucket("site.com").unwrap();
        store.put_object("site.com", "a.html", b"a", "text/html").unwrap();
        store.create_bucket("site.com").unwrap();
        assert_eq!(store.list_objects("site.com").unwrap(), vec!["a.html"]);
    }

    #[test]
    fn objects_overwrite_and_delete() {
        let store = MemoryStore::new();
        store.create_bucket("b").unwrap();
        store.put_object("b", "k", b"one", "text/plain").unwrap();
        store.put_object("b", "k", b"two", "text/plain").unwrap();
        assert_eq!(store.get_object("b", "k").unwrap(), b"two");

        store
            .delete_objects("b", &["k".to_string(), "missing".to_string()])
            .unwrap();
        assert!(matches!(store.get_object("b", "k"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn upsert_replaces_records_by_name() {
        let store = MemoryStore::new();
        let zone = store.create_hosted_zone("site.com").unwrap();
        assert_eq!(zone.name, "site.com.");

        let record = |target: &str| AliasRecord {
            name: "site.com".to_string(),
            target: target.to_string(),
        };
        store.upsert_alias_records(&zone.id, &[record("old")]).unwrap();
        store.upsert_alias_records(&zone.id, &[record("new")]).unwrap();

        let records = store.records(&zone.id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "new");
    }
}
