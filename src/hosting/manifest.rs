//! The upload manifest: every key ever uploaded for a site.
//!
//! Stored in the bucket itself under [`MANIFEST_KEY`] as a comma-joined
//! list. A missing or unreadable manifest reads as empty.

use super::backend::{ObjectStore, StoreError};
use log::warn;
use std::collections::BTreeSet;

pub const MANIFEST_KEY: &str = ".yass-manifest";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    keys: BTreeSet<String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        text.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn serialize(&self) -> String {
        self.keys.iter().cloned().collect::<Vec<_>>().join(",")
    }

    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<String> for Manifest {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter
                .into_iter()
                .filter(|k| k.as_str() != MANIFEST_KEY)
                .collect(),
        }
    }
}

impl Extend<String> for Manifest {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.keys
            .extend(iter.into_iter().filter(|k| k.as_str() != MANIFEST_KEY));
    }
}

/// Read the manifest from `bucket`. Failures are logged and read as empty.
pub fn load(store: &impl ObjectStore, bucket: &str) -> Manifest {
    match store.get_object(bucket, MANIFEST_KEY) {
        Ok(bytes) => Manifest::parse(&String::from_utf8_lossy(&bytes)),
        Err(StoreError::NotFound(_)) => Manifest::new(),
        Err(e) => {
            warn!("could not read manifest from {bucket}: {e}");
            Manifest::new()
        }
    }
}

pub fn save(store: &impl ObjectStore, bucket: &str, manifest: &Manifest) -> Result<(), StoreError> {
    store.put_object(
        bucket,
        MANIFEST_KEY,
        manifest.serialize().as_bytes(),
        "text/plain",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::memory::MemoryStore;

    #[test]
    fn parse_skips_blanks() {
        let manifest = Manifest::parse("index.html, ,about/index.html,");
        assert_eq!(
            manifest.keys().collect::<Vec<_>>(),
            vec!["about/index.html", "index.html"]
        );
    }

    #[test]
    fn never_lists_itself() {
        let mut manifest: Manifest = vec![MANIFEST_KEY.to_string(), "a".to_string()]
            .into_iter()
            .collect();
        manifest.extend([MANIFEST_KEY.to_string()]);
        assert_eq!(manifest.serialize(), "a");
    }

    #[test]
    fn missing_manifest_reads_empty() {
        let store = MemoryStore::new();
        store.create_bucket("site.com").unwrap();
        assert!(load(&store, "site.com").is_empty());
        // no bucket at all
        assert!(load(&store, "other.com").is_empty());
    }

    #[test]
    fn save_then_load() {
        let store = MemoryStore::new();
        store.create_bucket("site.com").unwrap();
        let manifest = Manifest::parse("b.html,a.html");
        save(&store, "site.com", &manifest).unwrap();

        let stored = store.object("site.com", MANIFEST_KEY).unwrap();
        assert_eq!(stored.body, b"a.html,b.html");
        assert_eq!(load(&store, "site.com"), manifest);
    }
}
