//! The capability a migration needs from one endpoint.
//!
//! A connection lists, reads and writes objects. How it was built (endpoint,
//! credentials, addressing style) is not visible here.

use crate::{
    errors::StoreResult,
    models::{
        object::{AccessLevel, Tier},
        page::Page,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::{collections::HashMap, fmt, io, pin::Pin};

/// Streamed object body. Chunks are yielded as they arrive from the source.
pub type PayloadStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Object body plus the metadata returned alongside it.
pub struct FetchedObject {
    pub payload: PayloadStream,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub user_metadata: HashMap<String, String>,
}

impl fmt::Debug for FetchedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedObject")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .field("user_metadata", &self.user_metadata)
            .finish_non_exhaustive()
    }
}

/// A destination write. Overwrites whatever is stored under `key`.
pub struct PutObject {
    pub key: String,
    pub tier: Tier,
    pub content_type: Option<String>,
    pub user_metadata: HashMap<String, String>,
    pub access: AccessLevel,
    pub content_length: Option<u64>,
    pub payload: PayloadStream,
}

#[async_trait]
pub trait Connection: Send + Sync {
    /// Short human-readable identity, e.g. the endpoint URL.
    fn describe(&self) -> String;

    /// Recursive listing of up to `page_size` keys strictly after `marker`.
    async fn list_page(
        &self,
        bucket: &str,
        marker: Option<&str>,
        page_size: usize,
    ) -> StoreResult<Page>;

    async fn access_level(&self, bucket: &str, key: &str) -> StoreResult<AccessLevel>;

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<FetchedObject>;

    async fn put_object(&self, bucket: &str, object: PutObject) -> StoreResult<()>;
}
