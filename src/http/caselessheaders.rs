use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Ordered header map with case-insensitive keys.
///
/// Entries live in an insertion-ordered list holding the caller's casing;
/// a side index maps each lower-cased key to its slot in that list.
#[derive(Debug, Clone, Default)]
pub struct CaselessHeaderMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

fn fold(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl CaselessHeaderMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build from `(key, value)` pairs. A key repeated under any casing
    /// overwrites the earlier value in place.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.set(k, v);
        }
        map
    }

    /// Build from a flat `[k1, v1, k2, v2, ...]` list as delivered by a
    /// raw header/trailer block. A dangling key gets an empty value.
    pub fn from_flat<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut map = Self::new();
        for pair in raw.chunks(2) {
            let key = pair[0].as_ref();
            let value = pair.get(1).map(|v| v.as_ref()).unwrap_or("");
            map.set(key, value);
        }
        map
    }

    /// Insert or overwrite. An existing key keeps its position but takes
    /// the casing of the latest write.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let folded = fold(&key);

        match self.index.get(&folded) {
            Some(&pos) => self.entries[pos] = (key, value),
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Insert only when absent. Returns true if the value was stored.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.has(&key) {
            return false;
        }
        self.set(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(&fold(key))
            .map(|&pos| self.entries[pos].1.as_str())
    }

    /// Lookup falling back to `default` when the key is absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.index.contains_key(&fold(key))
    }

    /// Remove a key. Entries after it shift down one slot and are re-indexed.
    pub fn delete(&mut self, key: &str) -> bool {
        let Some(pos) = self.index.remove(&fold(key)) else {
            return false;
        };

        for (i, (k, _)) in self.entries.iter().enumerate().skip(pos + 1) {
            self.index.insert(fold(k), i - 1);
        }
        self.entries.remove(pos);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Slot of a key in iteration order.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(&fold(key)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    /// Ordered `(key, value)` pairs with original casing.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to a standard http::HeaderMap for the wire.
    pub fn to_header_map(&self) -> Result<HeaderMap, NetError> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let name = HeaderName::from_str(name).map_err(|_| NetError::InvalidHeader)?;
            let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
            map.append(name, value);
        }
        Ok(map)
    }
}

impl PartialEq for CaselessHeaderMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for CaselessHeaderMap {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CaselessHeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for CaselessHeaderMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl Serialize for CaselessHeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CaselessHeaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderVisitor;

        impl<'de> Visitor<'de> for HeaderVisitor {
            type Value = CaselessHeaderMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = CaselessHeaderMap::new();
                while let Some((k, v)) = access.next_entry::<String, serde_json::Value>()? {
                    let value = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    map.set(k, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(HeaderVisitor)
    }
}
