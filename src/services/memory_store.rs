//! src/services/memory_store.rs
//!
//! MemoryStore: an in-process [`Connection`] keeping buckets in ordered maps.
//! Listing follows the same marker rules as an S3 `ListObjects` call (keys in
//! lexicographic order, strictly after the marker). Failures can be injected
//! per key and per stage, which is how the retry paths are exercised.

use crate::{
    errors::{StoreError, StoreResult},
    models::{
        object::{AccessLevel, ObjectRecord, Tier},
        page::Page,
    },
    services::connection::{Connection, FetchedObject, PutObject},
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tracing::debug;

const CHUNK_SIZE: usize = 8 * 1024;

/// Stage of a request that an injected failure applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailAt {
    AccessLevel,
    Get,
    Put,
}

/// A stored object: payload plus everything a migration must preserve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub tier: Tier,
    pub content_type: Option<String>,
    pub user_metadata: HashMap<String, String>,
    pub access: AccessLevel,
}

impl StoredObject {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            tier: Tier::Standard,
            content_type: None,
            user_metadata: HashMap::new(),
            access: AccessLevel::Private,
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_access(mut self, access: AccessLevel) -> Self {
        self.access = access;
        self
    }
}

#[derive(Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    failures: HashMap<(FailAt, String), u32>,
    listing_failures: u32,
    writes: HashMap<String, u32>,
    list_calls: u32,
    in_flight_puts: usize,
    peak_in_flight_puts: usize,
}

/// In-memory object store.
///
/// Cloning is cheap; clones share the same buckets.
#[derive(Clone, Default)]
pub struct MemoryStore {
    name: String,
    state: Arc<Mutex<State>>,
    put_latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Hold every write open for `latency` so concurrent writes overlap.
    pub fn with_put_latency(mut self, latency: Duration) -> Self {
        self.put_latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.lock().buckets.entry(bucket.to_string()).or_default();
    }

    pub fn insert(&self, bucket: &str, key: &str, object: StoredObject) {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock().buckets.get(bucket)?.get(key).cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a whole bucket, ordered by key.
    pub fn snapshot(&self, bucket: &str) -> BTreeMap<String, StoredObject> {
        self.lock().buckets.get(bucket).cloned().unwrap_or_default()
    }

    /// Make the next `times` requests of `stage` for `key` fail.
    pub fn fail_next(&self, stage: FailAt, key: &str, times: u32) {
        *self
            .lock()
            .failures
            .entry((stage, key.to_string()))
            .or_default() += times;
    }

    /// Make the next `times` listing calls fail.
    pub fn fail_next_listings(&self, times: u32) {
        self.lock().listing_failures += times;
    }

    /// Number of completed writes per key.
    pub fn write_count(&self, key: &str) -> u32 {
        self.lock().writes.get(key).copied().unwrap_or(0)
    }

    pub fn list_calls(&self) -> u32 {
        self.lock().list_calls
    }

    /// Highest number of writes that were in progress at the same time.
    pub fn peak_concurrent_writes(&self) -> usize {
        self.lock().peak_in_flight_puts
    }

    fn take_failure(&self, stage: FailAt, key: &str) -> StoreResult<()> {
        let mut state = self.lock();
        match state.failures.get_mut(&(stage, key.to_string())) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Injected(format!("{stage:?} of `{key}`")))
            }
            _ => Ok(()),
        }
    }

    fn no_such_bucket(bucket: &str) -> StoreError {
        StoreError::Service {
            code: "NoSuchBucket".into(),
            message: format!("bucket `{bucket}` does not exist"),
        }
    }

    fn stored(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        let state = self.lock();
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;
        objects.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl Connection for MemoryStore {
    fn describe(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn list_page(
        &self,
        bucket: &str,
        marker: Option<&str>,
        page_size: usize,
    ) -> StoreResult<Page> {
        let mut state = self.lock();
        state.list_calls += 1;
        if state.listing_failures > 0 {
            state.listing_failures -= 1;
            return Err(StoreError::Injected(format!("listing `{bucket}`")));
        }

        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;
        let lower = match marker {
            Some(marker) => Bound::Excluded(marker.to_string()),
            None => Bound::Unbounded,
        };

        // One extra row tells us whether the listing is truncated.
        let fetch_limit = page_size.max(1) + 1;
        let mut rows: Vec<ObjectRecord> = objects
            .range((lower, Bound::Unbounded))
            .take(fetch_limit)
            .map(|(key, stored)| ObjectRecord {
                name: key.clone(),
                tier: stored.tier.clone(),
                content_type: None,
                user_metadata: HashMap::new(),
                size_bytes: stored.data.len() as u64,
            })
            .collect();

        let mut next_marker = None;
        if rows.len() == fetch_limit {
            rows.pop();
            next_marker = rows.last().map(|last| last.name.clone());
        }

        Ok(Page {
            objects: rows,
            next_marker,
        })
    }

    async fn access_level(&self, bucket: &str, key: &str) -> StoreResult<AccessLevel> {
        self.take_failure(FailAt::AccessLevel, key)?;
        Ok(self.stored(bucket, key)?.access)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<FetchedObject> {
        self.take_failure(FailAt::Get, key)?;
        let stored = self.stored(bucket, key)?;

        let len = stored.data.len();
        let chunks: Vec<std::io::Result<Bytes>> = (0..len)
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(stored.data.slice(start..(start + CHUNK_SIZE).min(len))))
            .collect();

        Ok(FetchedObject {
            payload: Box::pin(stream::iter(chunks)),
            content_length: Some(len as u64),
            content_type: stored.content_type,
            user_metadata: stored.user_metadata,
        })
    }

    async fn put_object(&self, bucket: &str, object: PutObject) -> StoreResult<()> {
        if !self.lock().buckets.contains_key(bucket) {
            return Err(Self::no_such_bucket(bucket));
        }

        {
            let mut state = self.lock();
            state.in_flight_puts += 1;
            state.peak_in_flight_puts = state.peak_in_flight_puts.max(state.in_flight_puts);
        }
        let result = self.write_object(bucket, object).await;
        self.lock().in_flight_puts -= 1;
        result
    }
}

impl MemoryStore {
    async fn write_object(&self, bucket: &str, object: PutObject) -> StoreResult<()> {
        if let Some(latency) = self.put_latency {
            tokio::time::sleep(latency).await;
        }
        self.take_failure(FailAt::Put, &object.key)?;

        let PutObject {
            key,
            tier,
            content_type,
            user_metadata,
            access,
            content_length,
            mut payload,
        } = object;

        let mut data = BytesMut::new();
        while let Some(chunk) = payload.next().await {
            data.extend_from_slice(&chunk?);
        }
        if let Some(expected) = content_length {
            if expected != data.len() as u64 {
                return Err(StoreError::Payload(format!(
                    "`{key}` declared {expected} bytes but sent {}",
                    data.len()
                )));
            }
        }

        let stored = StoredObject {
            data: data.freeze(),
            tier,
            content_type,
            user_metadata,
            access,
        };

        let mut state = self.lock();
        state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?
            .insert(key.clone(), stored);
        *state.writes.entry(key.clone()).or_default() += 1;
        debug!(bucket, key = %key, "stored object in memory");
        Ok(())
    }
}
