//! Case-insensitive, multi-valued header map.

use http::header::{AsHeaderName, HeaderName, HeaderValue, IntoHeaderName};
use http::HeaderMap;

/// Header collection used by [`Request`](crate::Request) and
/// [`Response`](crate::Response).
///
/// A thin wrapper over [`http::HeaderMap`]. Names are stored lower-cased and
/// looked up case-insensitively, and a name may carry several values. The
/// string accessors skip values that are not visible ASCII.
///
/// # Examples
///
/// ```rust
/// use retryline::http::header::{ACCEPT, RETRY_AFTER};
/// use retryline::{HeaderValue, Headers};
///
/// let mut headers = Headers::new();
/// headers.append(ACCEPT, HeaderValue::from_static("application/json"));
/// headers.append(ACCEPT, HeaderValue::from_static("text/plain"));
/// headers.insert(RETRY_AFTER, 2u64);
///
/// assert_eq!(headers.get("Accept"), Some("application/json"));
/// assert_eq!(headers.get_all("accept").count(), 2);
/// assert_eq!(headers.get("retry-after"), Some("2"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HeaderMap);

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to a single value, replacing any existing values.
    ///
    /// # Panics
    ///
    /// Like [`HeaderMap::insert`], panics if `name` is a `&'static str` that
    /// is not a valid lower-case header name.
    pub fn insert<K: IntoHeaderName>(&mut self, name: K, value: impl Into<HeaderValue>) {
        self.0.insert(name, value.into());
    }

    /// Add a value to `name`, keeping existing values.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Headers::insert`].
    pub fn append<K: IntoHeaderName>(&mut self, name: K, value: impl Into<HeaderValue>) {
        self.0.append(name, value.into());
    }

    /// First value of `name` as a string.
    pub fn get<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.0.get(name)?.to_str().ok()
    }

    /// All values of `name`, in append order.
    pub fn get_all<K: AsHeaderName>(&self, name: K) -> impl Iterator<Item = &str> {
        self.0
            .get_all(name)
            .into_iter()
            .filter_map(|value| value.to_str().ok())
    }

    /// Returns true if `name` is present.
    pub fn contains<K: AsHeaderName>(&self, name: K) -> bool {
        self.0.contains_key(name)
    }

    /// Remove every value of `name`, returning the first.
    pub fn remove<K: AsHeaderName>(&mut self, name: K) -> Option<HeaderValue> {
        self.0.remove(name)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.0.keys_len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, value)` pairs; a multi-valued name yields one pair per value.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.0.iter()
    }

    /// Iterate distinct header names.
    pub fn names(&self) -> impl Iterator<Item = &HeaderName> {
        self.0.keys()
    }

    /// The underlying map.
    pub fn as_map(&self) -> &HeaderMap {
        &self.0
    }

    /// Mutable access to the underlying map.
    pub fn as_map_mut(&mut self) -> &mut HeaderMap {
        &mut self.0
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Self(map)
    }
}

impl From<Headers> for HeaderMap {
    fn from(headers: Headers) -> Self {
        headers.0
    }
}

impl FromIterator<(HeaderName, HeaderValue)> for Headers {
    fn from_iter<I: IntoIterator<Item = (HeaderName, HeaderValue)>>(iter: I) -> Self {
        Self(HeaderMap::from_iter(iter))
    }
}

impl Extend<(HeaderName, HeaderValue)> for Headers {
    fn extend<I: IntoIterator<Item = (HeaderName, HeaderValue)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.0.append(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &'static str, value: &'static str) -> (HeaderName, HeaderValue) {
        (HeaderName::from_static(name), HeaderValue::from_static(value))
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("x-ms-retry-after-ms", 250u64);
        assert_eq!(headers.get("X-Ms-Retry-After-Ms"), Some("250"));
        assert!(headers.contains("X-MS-RETRY-AFTER-MS"));
    }

    #[test]
    fn test_insert_replaces_and_keeps_position() {
        let mut headers: Headers = [pair("a", "1"), pair("b", "2"), pair("a", "3")]
            .into_iter()
            .collect();
        assert_eq!(headers.get_all("a").collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(headers.len(), 2);

        headers.insert("a", HeaderValue::from_static("9"));
        assert_eq!(
            headers.names().map(HeaderName::as_str).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(headers.get_all("A").collect::<Vec<_>>(), vec!["9"]);
    }

    #[test]
    fn test_iter_groups_values_by_name() {
        let mut headers = Headers::new();
        headers.extend([pair("accept", "a"), pair("host", "example.com"), pair("accept", "b")]);

        let pairs: Vec<_> = headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.to_str().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![("accept", "a"), ("accept", "b"), ("host", "example.com")]
        );
    }

    #[test]
    fn test_remove_and_missing_names() {
        let mut headers = Headers::new();
        headers.insert(http::header::RETRY_AFTER, 2u64);
        assert_eq!(
            headers.remove("Retry-After"),
            Some(HeaderValue::from_static("2"))
        );
        assert!(headers.is_empty());
        assert_eq!(headers.get("retry-after"), None);
        assert_eq!(headers.get_all("retry-after").count(), 0);
        assert_eq!(headers.remove("retry-after"), None);
    }

    #[test]
    fn test_opaque_values_are_skipped_by_string_accessors() {
        let mut headers = Headers::new();
        headers.append("x-name", HeaderValue::from_bytes(b"caf\xe9").unwrap());
        headers.append("x-name", HeaderValue::from_static("plain"));

        assert!(headers.contains("x-name"));
        assert_eq!(headers.get("x-name"), None);
        assert_eq!(headers.get_all("x-name").collect::<Vec<_>>(), vec!["plain"]);
    }

    #[test]
    fn test_converts_to_and_from_header_map() {
        let mut map = HeaderMap::new();
        map.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let headers = Headers::from(map.clone());
        assert_eq!(headers.as_map(), &map);
        assert_eq!(HeaderMap::from(headers), map);
    }
}
