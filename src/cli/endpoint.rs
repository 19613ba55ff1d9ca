//! Endpoint URL normalization and well-known shorthand names.

use thiserror::Error;

/// Shorthand service names accepted in place of a URL.
pub const SHORTHANDS: [(&str, &str); 9] = [
    ("aws", "https://s3.amazonaws.com"),
    ("do-sfo2", "https://sfo2.digitaloceanspaces.com"),
    ("do-nyc3", "https://nyc3.digitaloceanspaces.com"),
    ("do-sgp1", "https://sgp1.digitaloceanspaces.com"),
    ("do-fra1", "https://fra1.digitaloceanspaces.com"),
    ("do-ams3", "https://ams3.digitaloceanspaces.com"),
    ("wasabi-east", "https://s3.wasabisys.com"),
    ("wasabi-west", "https://s3.us-west-1.wasabisys.com"),
    ("jortage-pool", "https://pool-api.jortage.com"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("`{0}` doesn't look like an S3 endpoint URL; it has to start with http:// or https://")]
    NotAUrl(String),
}

/// Expand a shorthand (case-insensitive) or validate a URL, dropping any
/// trailing slashes.
pub fn resolve_endpoint(input: &str) -> Result<String, EndpointError> {
    let input = input.trim();
    let endpoint = SHORTHANDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(input))
        .map(|(_, url)| *url)
        .unwrap_or(input);

    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(EndpointError::NotAUrl(input.to_string()));
    }
    Ok(endpoint.trim_end_matches('/').to_string())
}

/// Comma-separated list of shorthand names, for prompts and help text.
pub fn shorthand_names() -> String {
    SHORTHANDS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
