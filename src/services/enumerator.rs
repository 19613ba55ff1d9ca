//! Marker-based walk over a bucket listing.

use crate::{
    errors::MigrationError,
    models::page::Page,
    services::connection::Connection,
};
use std::sync::Arc;
use tracing::debug;

/// Default number of keys requested per listing call.
pub const DEFAULT_PAGE_SIZE: usize = 32;

/// Yields the pages of one bucket in listing order.
///
/// The first request carries no marker; each later one resumes after the
/// marker of the page before it. The walk ends after the first page that
/// comes back without a marker. Objects written or deleted by someone else
/// while the walk is in progress may or may not be seen.
pub struct Enumerator {
    connection: Arc<dyn Connection>,
    bucket: String,
    page_size: usize,
    marker: Option<String>,
    finished: bool,
    pages: usize,
}

impl Enumerator {
    pub fn new(
        connection: Arc<dyn Connection>,
        bucket: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            connection,
            bucket: bucket.into(),
            page_size: page_size.max(1),
            marker: None,
            finished: false,
            pages: 0,
        }
    }

    /// Fetch the next page, or `None` once the last page has been returned.
    ///
    /// Listing failures are not retried here.
    pub async fn next_page(&mut self) -> Result<Option<Page>, MigrationError> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .connection
            .list_page(&self.bucket, self.marker.as_deref(), self.page_size)
            .await
            .map_err(|source| MigrationError::Listing {
                bucket: self.bucket.clone(),
                marker: self.marker.clone(),
                source,
            })?;

        self.pages += 1;
        debug!(
            bucket = %self.bucket,
            page = self.pages,
            objects = page.len(),
            next_marker = ?page.next_marker,
            "listed page"
        );

        match &page.next_marker {
            Some(next) => self.marker = Some(next.clone()),
            None => self.finished = true,
        }
        Ok(Some(page))
    }

    /// Number of pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::{MemoryStore, StoredObject};
    use std::collections::HashSet;

    fn bucket_of(n: usize) -> MemoryStore {
        let store = MemoryStore::new("src");
        store.create_bucket("b");
        for i in 0..n {
            store.insert("b", &format!("dir{}/obj-{i:04}", i % 3), StoredObject::new(vec![1u8]));
        }
        store
    }

    async fn drain(enumerator: &mut Enumerator) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(page) = enumerator.next_page().await.unwrap() {
            names.extend(page.objects.into_iter().map(|o| o.name));
        }
        names
    }

    #[tokio::test]
    async fn concatenated_pages_cover_every_object_once() {
        let store = bucket_of(100);
        let mut enumerator = Enumerator::new(Arc::new(store.clone()), "b", DEFAULT_PAGE_SIZE);

        let names = drain(&mut enumerator).await;
        let unique: HashSet<_> = names.iter().collect();

        assert_eq!(names.len(), 100);
        assert_eq!(unique.len(), 100);
        assert_eq!(names, store.keys("b"));
        assert_eq!(enumerator.pages(), 4);
        assert!(enumerator.is_finished());
    }

    #[tokio::test]
    async fn empty_bucket_yields_one_empty_page() {
        let store = bucket_of(0);
        let mut enumerator = Enumerator::new(Arc::new(store), "b", 10);

        let page = enumerator.next_page().await.unwrap().unwrap();
        assert!(page.is_empty());
        assert!(enumerator.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_failure_names_bucket_and_marker() {
        let store = bucket_of(5);
        let mut enumerator = Enumerator::new(Arc::new(store.clone()), "b", 2);
        enumerator.next_page().await.unwrap();

        store.fail_next_listings(1);
        let err = enumerator.next_page().await.unwrap_err();
        match err {
            MigrationError::Listing { bucket, marker, .. } => {
                assert_eq!(bucket, "b");
                assert_eq!(marker.as_deref(), Some("dir0/obj-0003"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
