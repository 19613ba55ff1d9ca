//! Copy one object from the source bucket to the destination bucket.

use crate::{
    errors::TransferError,
    models::{job::MigrationJob, object::ObjectRecord},
    services::connection::PutObject,
};
use tracing::debug;

/// Copy `record` end to end, overwriting any destination object at its key.
///
/// Steps: read the source access level, open the source object (payload is
/// streamed, never buffered whole), then write it under the same key with the
/// same tier, content type, user metadata and access level. At most one
/// destination write is issued. Nothing is retried here.
///
/// Content type and user metadata come from the fetched object when it
/// reports them and from the listing record otherwise. The tier always comes
/// from the listing, since reads omit it for the default class.
pub async fn copy_object(job: &MigrationJob, record: &ObjectRecord) -> Result<(), TransferError> {
    let key = record.name.as_str();

    let access = job
        .source
        .access_level(&job.source_bucket, key)
        .await
        .map_err(|source| TransferError::AccessLevel {
            key: key.to_string(),
            source,
        })?;

    let fetched = job
        .source
        .get_object(&job.source_bucket, key)
        .await
        .map_err(|source| TransferError::Fetch {
            key: key.to_string(),
            source,
        })?;

    let content_type = fetched.content_type.or_else(|| record.content_type.clone());
    let user_metadata = if fetched.user_metadata.is_empty() {
        record.user_metadata.clone()
    } else {
        fetched.user_metadata
    };

    let object = PutObject {
        key: key.to_string(),
        tier: record.tier.clone(),
        content_type,
        user_metadata,
        access,
        content_length: fetched.content_length,
        payload: fetched.payload,
    };

    job.destination
        .put_object(&job.destination_bucket, object)
        .await
        .map_err(|source| TransferError::Write {
            key: key.to_string(),
            source,
        })?;

    debug!(key, %access, tier = %record.tier, "copied object");
    Ok(())
}
