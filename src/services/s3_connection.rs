//! S3-compatible connection built on `aws-sdk-s3`.
//!
//! One `S3Connection` talks to one endpoint. Every endpoint other than AWS
//! itself is addressed path-style, which is what MinIO, Wasabi, Spaces and
//! friends expect.

use crate::{
    errors::{StoreError, StoreResult},
    models::{
        object::{AccessLevel, ObjectRecord, Tier},
        page::Page,
    },
    services::connection::{Connection, FetchedObject, PutObject},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig, retry::RetryConfig};
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    primitives::ByteStream,
    types::{Grant, ObjectCannedAcl, Permission, StorageClass},
};
use aws_smithy_types::checksum_config::{RequestChecksumCalculation, ResponseChecksumValidation};
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;
use std::{collections::HashMap, fmt};
use tokio_util::io::ReaderStream;
use tracing::debug;

const ALL_USERS_GROUP: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Everything needed to open a connection to one endpoint.
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub access_id: String,
    pub access_key: String,
}

impl S3Settings {
    /// AWS proper supports virtual-hosted addressing; everything else gets path-style.
    pub fn is_aws(&self) -> bool {
        self.endpoint.ends_with("amazonaws.com")
    }
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_id", &"<redacted>")
            .field("access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct S3Connection {
    client: Client,
    endpoint: String,
}

impl S3Connection {
    /// Build a client for `settings`. No request is made until first use.
    ///
    /// SDK-level retries are disabled; failed requests surface immediately
    /// and are retried by the migration's own backoff loop.
    pub async fn connect(settings: &S3Settings, name: &'static str) -> Self {
        let credentials = Credentials::new(
            settings.access_id.clone(),
            settings.access_key.clone(),
            None,
            None,
            name,
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        debug!(endpoint = %settings.endpoint, name, "built S3 client");
        Self {
            client: Client::from_conf(client_config(&shared, settings)),
            endpoint: settings.endpoint.clone(),
        }
    }
}

/// S3 client settings for one endpoint.
///
/// Checksums are only computed and validated when an operation requires
/// them. Streamed uploads are then sent as plain bodies instead of
/// `aws-chunked` with a trailing checksum, which many S3-compatible stores
/// reject.
fn client_config(shared: &SdkConfig, settings: &S3Settings) -> aws_sdk_s3::Config {
    aws_sdk_s3::config::Builder::from(shared)
        .endpoint_url(&settings.endpoint)
        .force_path_style(!settings.is_aws())
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
        .build()
}

#[async_trait]
impl Connection for S3Connection {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    async fn list_page(
        &self,
        bucket: &str,
        marker: Option<&str>,
        page_size: usize,
    ) -> StoreResult<Page> {
        let response = self
            .client
            .list_objects()
            .bucket(bucket)
            .max_keys(i32::try_from(page_size).unwrap_or(i32::MAX))
            .set_marker(marker.map(str::to_string))
            .send()
            .await?;

        let objects: Vec<ObjectRecord> = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let mut record = ObjectRecord::new(
                    obj.key()?,
                    obj.storage_class()
                        .map(|class| tier_from_wire(class.as_str()))
                        .unwrap_or_default(),
                );
                record.size_bytes = obj.size().unwrap_or(0).max(0) as u64;
                Some(record)
            })
            .collect();

        let next_marker = continuation(
            response.is_truncated().unwrap_or(false),
            response.next_marker(),
            objects.last().map(|last| last.name.as_str()),
        )?;

        Ok(Page {
            objects,
            next_marker,
        })
    }

    async fn access_level(&self, bucket: &str, key: &str) -> StoreResult<AccessLevel> {
        let response = self
            .client
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(access_from_grants(response.grants()))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<FetchedObject> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;

        let content_length = response.content_length().map(|len| len.max(0) as u64);
        let content_type = response.content_type().map(str::to_string);
        let user_metadata = response.metadata().cloned().unwrap_or_default();

        let reader = response.body.into_async_read();
        Ok(FetchedObject {
            payload: Box::pin(ReaderStream::new(reader)),
            content_length,
            content_type,
            user_metadata,
        })
    }

    async fn put_object(&self, bucket: &str, object: PutObject) -> StoreResult<()> {
        let body = StreamBody::new(object.payload.map_ok(Frame::data));
        let metadata: Option<HashMap<String, String>> =
            (!object.user_metadata.is_empty()).then_some(object.user_metadata);

        self.client
            .put_object()
            .bucket(bucket)
            .key(&object.key)
            .storage_class(StorageClass::from(object.tier.as_str()))
            .acl(ObjectCannedAcl::from(object.access.canned_acl()))
            .set_content_type(object.content_type)
            .set_content_length(object.content_length.map(|len| len as i64))
            .set_metadata(metadata)
            .body(ByteStream::from_body_1_x(body))
            .send()
            .await?;
        Ok(())
    }
}

/// Marker for the page after this one.
///
/// NextMarker is only returned when a delimiter was sent; without one the
/// last key of a truncated page is the marker. A truncated page offering
/// neither cannot be continued.
fn continuation(
    truncated: bool,
    next_marker: Option<&str>,
    last_key: Option<&str>,
) -> StoreResult<Option<String>> {
    if !truncated {
        return Ok(None);
    }
    next_marker
        .or(last_key)
        .map(|marker| Some(marker.to_string()))
        .ok_or_else(|| StoreError::Service {
            code: "TruncatedWithoutMarker".into(),
            message: "listing is truncated but returned no NextMarker and no keys".into(),
        })
}

fn tier_from_wire(class: &str) -> Tier {
    let Ok(tier) = class.parse::<Tier>();
    tier
}

/// Public-read if the AllUsers group may read the object, private otherwise.
fn access_from_grants(grants: &[Grant]) -> AccessLevel {
    let public = grants.iter().any(|grant| {
        let everyone = grant
            .grantee()
            .and_then(|grantee| grantee.uri())
            .is_some_and(|uri| uri == ALL_USERS_GROUP);
        let readable = matches!(
            grant.permission(),
            Some(Permission::Read) | Some(Permission::FullControl)
        );
        everyone && readable
    });

    if public {
        AccessLevel::PublicRead
    } else {
        AccessLevel::Private
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::{Grantee, Type};

    fn grant(uri: Option<&str>, permission: Permission) -> Grant {
        let grantee = match uri {
            Some(uri) => Grantee::builder().r#type(Type::Group).uri(uri).build(),
            None => Grantee::builder()
                .r#type(Type::CanonicalUser)
                .id("owner")
                .build(),
        }
        .unwrap();
        Grant::builder()
            .grantee(grantee)
            .permission(permission)
            .build()
    }

    #[test]
    fn all_users_read_grant_is_public() {
        let grants = [
            grant(None, Permission::FullControl),
            grant(Some(ALL_USERS_GROUP), Permission::Read),
        ];
        assert_eq!(access_from_grants(&grants), AccessLevel::PublicRead);
    }

    #[test]
    fn owner_only_or_write_only_grants_are_private() {
        assert_eq!(
            access_from_grants(&[grant(None, Permission::FullControl)]),
            AccessLevel::Private
        );
        assert_eq!(
            access_from_grants(&[grant(Some(ALL_USERS_GROUP), Permission::Write)]),
            AccessLevel::Private
        );
        assert_eq!(access_from_grants(&[]), AccessLevel::Private);
    }

    #[test]
    fn truncated_listing_continues_after_next_marker_or_last_key() {
        assert_eq!(continuation(false, None, Some("z")).unwrap(), None);
        assert_eq!(
            continuation(true, Some("photos/b"), Some("photos/c")).unwrap().as_deref(),
            Some("photos/b")
        );
        assert_eq!(
            continuation(true, None, Some("photos/c")).unwrap().as_deref(),
            Some("photos/c")
        );
    }

    #[test]
    fn truncated_listing_without_any_marker_is_an_error() {
        let err = continuation(true, None, None).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Service { ref code, .. } if code == "TruncatedWithoutMarker"
        ));
    }

    #[test]
    fn checksums_are_only_sent_when_required() {
        let shared = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        for endpoint in ["https://s3.amazonaws.com", "https://s3.wasabisys.com"] {
            let settings = S3Settings {
                endpoint: endpoint.into(),
                region: "us-east-1".into(),
                access_id: "id".into(),
                access_key: "key".into(),
            };
            let config = client_config(&shared, &settings);
            assert!(matches!(
                config.request_checksum_calculation(),
                Some(RequestChecksumCalculation::WhenRequired)
            ));
            assert!(matches!(
                config.response_checksum_validation(),
                Some(ResponseChecksumValidation::WhenRequired)
            ));
        }
    }

    #[test]
    fn listing_storage_classes_map_to_tiers() {
        assert_eq!(tier_from_wire("DEEP_ARCHIVE"), Tier::DeepArchive);
        assert_eq!(tier_from_wire("GLACIER"), Tier::Archive);
    }

    #[test]
    fn only_amazonaws_endpoints_use_virtual_hosting() {
        let mut settings = S3Settings {
            endpoint: "https://s3.amazonaws.com".into(),
            region: "us-east-1".into(),
            access_id: "id".into(),
            access_key: "s3cr3t".into(),
        };
        assert!(settings.is_aws());
        settings.endpoint = "https://s3.wasabisys.com".into();
        assert!(!settings.is_aws());
        assert!(!format!("{settings:?}").contains("s3cr3t"));
    }
}
