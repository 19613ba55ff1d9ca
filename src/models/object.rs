//! Represents an object (blob) as seen by a source bucket listing.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// Storage class of an object.
///
/// The tier is read from the source listing and requested again on the
/// destination write, so archived objects stay archived after a migration.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tier {
    #[default]
    Standard,
    ReducedRedundancy,
    InfrequentAccess,
    OneZoneInfrequentAccess,
    IntelligentTiering,
    GlacierInstantRetrieval,
    Archive,
    DeepArchive,
    /// A provider-specific class this crate does not model; kept verbatim.
    Other(String),
}

impl Tier {
    /// Wire name used by S3-compatible stores (`x-amz-storage-class`).
    pub fn as_str(&self) -> &str {
        match self {
            Tier::Standard => "STANDARD",
            Tier::ReducedRedundancy => "REDUCED_REDUNDANCY",
            Tier::InfrequentAccess => "STANDARD_IA",
            Tier::OneZoneInfrequentAccess => "ONEZONE_IA",
            Tier::IntelligentTiering => "INTELLIGENT_TIERING",
            Tier::GlacierInstantRetrieval => "GLACIER_IR",
            Tier::Archive => "GLACIER",
            Tier::DeepArchive => "DEEP_ARCHIVE",
            Tier::Other(name) => name,
        }
    }
}

impl FromStr for Tier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "" | "STANDARD" => Tier::Standard,
            "REDUCED_REDUNDANCY" => Tier::ReducedRedundancy,
            "STANDARD_IA" => Tier::InfrequentAccess,
            "ONEZONE_IA" => Tier::OneZoneInfrequentAccess,
            "INTELLIGENT_TIERING" => Tier::IntelligentTiering,
            "GLACIER_IR" => Tier::GlacierInstantRetrieval,
            "GLACIER" | "ARCHIVE" => Tier::Archive,
            "DEEP_ARCHIVE" => Tier::DeepArchive,
            _ => Tier::Other(s.to_string()),
        })
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object-level visibility.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    #[default]
    Private,
    PublicRead,
}

impl AccessLevel {
    /// Canned ACL name understood by S3-compatible stores.
    pub fn canned_acl(&self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::PublicRead => "public-read",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canned_acl())
    }
}

/// A single object within a bucket, as returned by a listing page.
///
/// Records are immutable once read. Listings from S3-compatible stores do not
/// carry the content type or user metadata, so those fields are usually empty
/// here and are filled in from the object itself when it is fetched.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Object key (path-like identifier, unique within the bucket).
    pub name: String,

    /// Storage class reported by the listing.
    pub tier: Tier,

    /// Content type (MIME type), when the listing reports one.
    pub content_type: Option<String>,

    /// User-defined metadata (`x-amz-meta-*` without the prefix).
    pub user_metadata: HashMap<String, String>,

    /// Size in bytes.
    pub size_bytes: u64,
}

impl ObjectRecord {
    /// Minimal record with only a key and tier, the shape most listings produce.
    pub fn new(name: impl Into<String>, tier: Tier) -> Self {
        Self {
            name: name.into(),
            tier,
            content_type: None,
            user_metadata: HashMap::new(),
            size_bytes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_wire_names_and_keeps_unknown_classes() {
        assert_eq!("GLACIER".parse::<Tier>().unwrap(), Tier::Archive);
        assert_eq!("standard_ia".parse::<Tier>().unwrap(), Tier::InfrequentAccess);
        assert_eq!("".parse::<Tier>().unwrap(), Tier::Standard);

        let custom: Tier = "COLDLINE".parse().unwrap();
        assert_eq!(custom, Tier::Other("COLDLINE".into()));
        assert_eq!(custom.as_str(), "COLDLINE");
    }

    #[test]
    fn access_level_maps_to_canned_acl() {
        assert_eq!(AccessLevel::Private.canned_acl(), "private");
        assert_eq!(AccessLevel::PublicRead.to_string(), "public-read");
    }
}
