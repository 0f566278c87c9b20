//! Case-insensitive header map.
//!
//! Names are stored lowercased. Inserting a name that is already present
//! replaces the old value (last write wins), so repeated request headers
//! collapse to the final occurrence.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header. Returns the previous value, if any.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(lowercase name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Collapse a hyper header map, keeping the last value of each name.
    /// Bytes that are not valid UTF-8 become U+FFFD.
    pub fn from_header_map(map: &hyper::HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map.iter() {
            headers.insert(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.contains("Content-type"));
    }

    #[test]
    fn last_write_wins() {
        let headers: Headers = [("X-Trace", "a"), ("x-trace", "b"), ("X-TRACE", "c")]
            .into_iter()
            .collect();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-trace"), Some("c"));
    }

    #[test]
    fn collapses_repeated_hyper_headers() {
        let mut map = hyper::HeaderMap::new();
        map.append("accept", "text/html".parse().unwrap());
        map.append("accept", "application/json".parse().unwrap());

        let headers = Headers::from_header_map(&map);
        assert_eq!(headers.get("Accept"), Some("application/json"));
    }

    #[test]
    fn non_ascii_values_are_kept() {
        let mut map = hyper::HeaderMap::new();
        map.insert(
            "x-city",
            hyper::header::HeaderValue::from_bytes("Zürich".as_bytes()).unwrap(),
        );
        map.insert(
            "x-raw",
            hyper::header::HeaderValue::from_bytes(b"caf\xe9").unwrap(),
        );

        let headers = Headers::from_header_map(&map);
        assert_eq!(headers.get("x-city"), Some("Zürich"));
        assert_eq!(headers.get("x-raw"), Some("caf\u{fffd}"));
        assert_eq!(headers.len(), 2);
    }
}
