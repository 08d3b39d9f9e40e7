//! URL normalization, job-id generation, and path-safe naming.
//!
//! Grounded on the teacher's `storage::vault::path` invariant style
//! (absolute-path / no-traversal checks) and its use of `uuid` v4 for
//! opaque identifiers throughout `transcribe-proxy`.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("url is empty")]
    EmptyUrl,
    #[error("url could not be parsed: {0}")]
    UnparsableUrl(String),
    #[error("url scheme must be http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("url has no host")]
    MissingHost,
    #[error("name contains a path traversal segment")]
    PathTraversal,
    #[error("name is empty after sanitization")]
    EmptyName,
}

/// Normalizes a video source URL: trims whitespace, lowercases the scheme
/// and host, strips a trailing slash from an otherwise-empty path, and
/// drops a fragment (fragments never affect what the downloader fetches).
/// Query strings are preserved since many hosts encode required routing
/// information there.
pub fn normalize_video_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let mut url =
        url::Url::parse(trimmed).map_err(|e| ValidationError::UnparsableUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(ValidationError::MissingHost);
    }

    url.set_fragment(None);

    if url.path().is_empty() {
        url.set_path("/");
    }

    Ok(url.to_string())
}

/// Opaque, URL-safe job identifier. Always at least 22 characters,
/// globally unique within a process (backed by a UUID v4), and safe to
/// use directly as a filesystem directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        let encoded = base64_url_no_pad(id.as_bytes());
        debug_assert!(encoded.len() >= 22);
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses an externally supplied job id, rejecting anything that
    /// isn't a plain URL-safe token (no `.` / `/` / control characters),
    /// since this value is used verbatim as a directory name.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let sanitized = sanitize_path_component(raw)?;
        Ok(Self(sanitized))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn base64_url_no_pad(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Validates that `name` is safe to use as a single path component: no
/// `.`/`..`, no path separators, not empty. This is the invariant the
/// Artifact Store (spec §4.10) relies on for "no path-traversal in
/// names"; mirrors the teacher's `validate_vault_path` family of checks.
pub fn sanitize_path_component(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if trimmed == "." || trimmed == ".." {
        return Err(ValidationError::PathTraversal);
    }

    if trimmed.contains('/') || trimmed.contains('\\') || trimmed.contains('\0') {
        return Err(ValidationError::PathTraversal);
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_fragment_and_path() {
        let url = normalize_video_url("HTTPS://Example.com#t=10").unwrap();
        assert_eq!(url, "https://example.com/");
    }

    #[test]
    fn preserves_query_string() {
        let url = normalize_video_url("https://example.com/watch?v=abc").unwrap();
        assert_eq!(url, "https://example.com/watch?v=abc");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(normalize_video_url(""), Err(ValidationError::EmptyUrl));
        assert_eq!(normalize_video_url("   "), Err(ValidationError::EmptyUrl));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = normalize_video_url("ftp://example.com/video").unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedScheme(_)));
    }

    #[test]
    fn job_id_is_url_safe_and_long_enough() {
        let id = JobId::new();
        assert!(id.as_str().len() >= 22);
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn job_id_generation_is_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn sanitize_rejects_traversal() {
        assert_eq!(
            sanitize_path_component(".."),
            Err(ValidationError::PathTraversal)
        );
        assert_eq!(
            sanitize_path_component("../etc/passwd"),
            Err(ValidationError::PathTraversal)
        );
        assert_eq!(
            sanitize_path_component("a/b"),
            Err(ValidationError::PathTraversal)
        );
    }

    #[test]
    fn sanitize_accepts_plain_name() {
        assert_eq!(
            sanitize_path_component("transcript.txt").unwrap(),
            "transcript.txt"
        );
    }

    #[quickcheck_macros::quickcheck]
    fn prop_job_id_always_valid_token(_seed: u8) -> bool {
        let id = JobId::new();
        JobId::parse(id.as_str()).is_ok()
    }
}
