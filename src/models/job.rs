//! A bucket-to-bucket migration job.

use crate::services::connection::Connection;
use std::{fmt, sync::Arc};

/// Source and destination of one migration.
///
/// Connections are opaque handles; the job never looks at credentials.
#[derive(Clone)]
pub struct MigrationJob {
    pub source: Arc<dyn Connection>,
    pub destination: Arc<dyn Connection>,
    pub source_bucket: String,
    pub destination_bucket: String,
}

impl MigrationJob {
    pub fn new(
        source: Arc<dyn Connection>,
        source_bucket: impl Into<String>,
        destination: Arc<dyn Connection>,
        destination_bucket: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            source_bucket: source_bucket.into(),
            destination_bucket: destination_bucket.into(),
        }
    }
}

impl fmt::Debug for MigrationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationJob")
            .field("source", &self.source.describe())
            .field("source_bucket", &self.source_bucket)
            .field("destination", &self.destination.describe())
            .field("destination_bucket", &self.destination_bucket)
            .finish()
    }
}
