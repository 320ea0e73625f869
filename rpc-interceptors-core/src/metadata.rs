//! Call metadata.
//!
//! [`Metadata`] is the key-value header collection attached to an outgoing
//! call, and the shape in which response headers and trailers come back.

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

use crate::{Code, Status};

/// Error raised when a metadata key or value is not a valid header.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// The key is not a valid header name.
    #[error("invalid metadata key: {0}")]
    InvalidKey(String),

    /// The value is not a valid header value.
    #[error("invalid metadata value for key {0}")]
    InvalidValue(String),
}

impl From<MetadataError> for Status {
    fn from(err: MetadataError) -> Self {
        Status::new(Code::InvalidArgument, err.to_string())
    }
}

/// Call metadata wrapper around HTTP headers.
///
/// Used for the headers a caller attaches to an outgoing call and for the
/// response headers and trailers a transport reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    headers: HeaderMap,
}

impl Metadata {
    /// Create new metadata from HTTP headers.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Create empty metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get a value by key.
    ///
    /// Returns `None` if the key is not present or the value is not visible ASCII.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// Get a value as bytes.
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.headers.get(key).map(|v| v.as_bytes())
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.headers.contains_key(key)
    }

    /// Get all values for a key (for keys that appear multiple times).
    pub fn get_all(&self, key: &str) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Insert a value, replacing any existing values for the key.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<(), MetadataError> {
        let (name, value) = parse_entry(key, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a value, keeping any existing values for the key.
    pub fn append(&mut self, key: &str, value: &str) -> Result<(), MetadataError> {
        let (name, value) = parse_entry(key, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Remove a key, returning its first value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        self.headers.remove(key)
    }

    /// Get the underlying HeaderMap.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a mutable reference to the underlying HeaderMap.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Consume self and return the underlying HeaderMap.
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    /// Get an iterator over all keys and values.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.headers.len()
    }
}

fn parse_entry(key: &str, value: &str) -> Result<(HeaderName, HeaderValue), MetadataError> {
    let name = HeaderName::try_from(key).map_err(|_| MetadataError::InvalidKey(key.to_string()))?;
    let value =
        HeaderValue::try_from(value).map_err(|_| MetadataError::InvalidValue(key.to_string()))?;
    Ok((name, value))
}

impl From<HeaderMap> for Metadata {
    fn from(headers: HeaderMap) -> Self {
        Self::new(headers)
    }
}

impl From<Metadata> for HeaderMap {
    fn from(metadata: Metadata) -> Self {
        metadata.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_get() {
        let mut headers = HeaderMap::new();
        headers.insert("x-custom", HeaderValue::from_static("value"));
        let metadata = Metadata::new(headers);

        assert_eq!(metadata.get("x-custom"), Some("value"));
        assert_eq!(metadata.get("missing"), None);
    }

    #[test]
    fn test_metadata_insert_replaces() {
        let mut metadata = Metadata::empty();
        metadata.insert("x-trace", "abc").unwrap();
        metadata.insert("x-trace", "def").unwrap();

        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get("x-trace"), Some("def"));
    }

    #[test]
    fn test_metadata_append_keeps_values() {
        let mut metadata = Metadata::empty();
        metadata.append("x-tag", "a").unwrap();
        metadata.append("x-tag", "b").unwrap();

        let values: Vec<_> = metadata.get_all("x-tag").collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_metadata_invalid_entries() {
        let mut metadata = Metadata::empty();
        assert_eq!(
            metadata.insert("bad key", "v"),
            Err(MetadataError::InvalidKey("bad key".into()))
        );
        assert_eq!(
            metadata.insert("x-key", "bad\nvalue"),
            Err(MetadataError::InvalidValue("x-key".into()))
        );
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_metadata_error_into_status() {
        let status: Status = MetadataError::InvalidKey("bad key".into()).into();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_metadata_remove() {
        let mut metadata = Metadata::empty();
        metadata.insert("x-present", "yes").unwrap();

        assert!(metadata.remove("x-present").is_some());
        assert!(!metadata.contains("x-present"));
        assert!(metadata.remove("x-present").is_none());
    }

    #[test]
    fn test_metadata_header_map_roundtrip() {
        let mut metadata = Metadata::empty();
        metadata.insert("x-test", "test-value").unwrap();

        let headers: HeaderMap = metadata.clone().into();
        assert_eq!(Metadata::from(headers), metadata);
    }
}
