//! Saved access keys, kept in a small JSON file.
//!
//! The file is a JSON object whose keys are either `"<endpoint>/<bucket>"` or
//! `"<endpoint>"` and whose values are `[accessId, accessKey]` pairs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// An access id and secret key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[String; 2]", into = "[String; 2]")]
pub struct AccessKeys {
    pub id: String,
    pub secret: String,
}

impl AccessKeys {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }
}

impl From<[String; 2]> for AccessKeys {
    fn from([id, secret]: [String; 2]) -> Self {
        Self { id, secret }
    }
}

impl From<AccessKeys> for [String; 2] {
    fn from(keys: AccessKeys) -> Self {
        [keys.id, keys.secret]
    }
}

impl fmt::Debug for AccessKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKeys")
            .field("id", &redact(&self.id))
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Mask all but the last four characters.
pub fn redact(value: &str) -> String {
    let len = value.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let tail: String = value.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), tail)
}

/// Which saved entry matched a lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SavedScope {
    Bucket,
    Endpoint,
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    path: PathBuf,
    entries: BTreeMap<String, AccessKeys>,
}

impl CredentialStore {
    /// Load the store, treating a missing or unreadable file as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(store) => store,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "failed to load saved credentials; continuing without them"
                );
                Self {
                    path,
                    entries: BTreeMap::new(),
                }
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "loaded credential store");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find keys for `endpoint`, preferring an entry for the exact bucket.
    pub fn lookup(&self, endpoint: &str, bucket: &str) -> Option<(SavedScope, &AccessKeys)> {
        self.entries
            .get(&bucket_id(endpoint, bucket))
            .map(|keys| (SavedScope::Bucket, keys))
            .or_else(|| {
                self.entries
                    .get(endpoint)
                    .map(|keys| (SavedScope::Endpoint, keys))
            })
    }

    /// Record `keys` for both the bucket and the endpoint as a whole.
    pub fn remember(&mut self, endpoint: &str, bucket: &str, keys: &AccessKeys) {
        self.entries.insert(bucket_id(endpoint, bucket), keys.clone());
        self.entries.insert(endpoint.to_string(), keys.clone());
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// Save, logging instead of failing.
    pub fn try_save(&self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{err:#}"),
                    "failed to save credentials"
                );
                false
            }
        }
    }
}

fn bucket_id(endpoint: &str, bucket: &str) -> String {
    format!("{endpoint}/{bucket}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_keeps_last_four() {
        assert_eq!(redact("AKIAABCDEFGH"), "********EFGH");
        assert_eq!(redact("abcd"), "****");
        assert_eq!(redact(""), "");
    }

    #[test]
    fn bucket_entry_wins_over_endpoint_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("c.json"),
            r#"{
                "https://s3.wasabisys.com": ["endpoint-id", "endpoint-key"],
                "https://s3.wasabisys.com/photos": ["bucket-id", "bucket-key"]
            }"#,
        )
        .unwrap();
        let store = CredentialStore::load(dir.path().join("c.json"));

        let (scope, keys) = store.lookup("https://s3.wasabisys.com", "photos").unwrap();
        assert_eq!(scope, SavedScope::Bucket);
        assert_eq!(keys.id, "bucket-id");

        let (scope, keys) = store.lookup("https://s3.wasabisys.com", "other").unwrap();
        assert_eq!(scope, SavedScope::Endpoint);
        assert_eq!(keys.secret, "endpoint-key");

        assert!(store.lookup("https://s3.amazonaws.com", "photos").is_none());
    }

    #[test]
    fn remembered_keys_round_trip_through_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/credentials.json");

        let mut store = CredentialStore::load(&path);
        store.remember("http://minio:9000", "backups", &AccessKeys::new("id", "key"));
        assert!(store.try_save());

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["http://minio:9000/backups"], serde_json::json!(["id", "key"]));
        assert_eq!(json["http://minio:9000"], serde_json::json!(["id", "key"]));

        let reloaded = CredentialStore::load(&path);
        assert_eq!(
            reloaded.lookup("http://minio:9000", "backups").map(|(_, k)| k.clone()),
            Some(AccessKeys::new("id", "key"))
        );
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(CredentialStore::try_load(&path).is_err());
        let store = CredentialStore::load(&path);
        assert!(store.lookup("anything", "at-all").is_none());
        assert_eq!(store.path(), path);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let keys = AccessKeys::new("AKIAABCDEFGH", "topsecret");
        let shown = format!("{keys:?}");
        assert!(shown.contains("********EFGH"));
        assert!(!shown.contains("topsecret"));
    }
}
