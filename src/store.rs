use crate::decode::{self, Entries, LexError};
use crate::encode::{self, EncodeOptions};
use crate::loader;
use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{fmt, path::Path, str::FromStr};

/// An ordered list of string properties.
///
/// Keys keep the position of their first insertion, whether it came from
/// parsing or from [`PropertyStore::set_property`]. Clones are independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStore {
    entries: Entries,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties text into a fresh store.
    pub fn parse(text: &str) -> Result<Self, LexError> {
        Ok(Self {
            entries: decode::decode(text)?,
        })
    }

    /// Read and parse a file (plain or gzip-compressed).
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = loader::read_text_file(path).with_context(|| format!("reading {path:?}"))?;
        let store = Self::parse(&text).with_context(|| format!("parsing {path:?}"))?;
        Ok(store)
    }

    /// Replace every entry with the result of decoding `text`.
    ///
    /// The text is decoded in full before anything is swapped in, so a
    /// [`LexError`] leaves the store exactly as it was.
    pub fn load(&mut self, text: &str) -> Result<(), LexError> {
        let entries = decode::decode(text)?;
        tracing::debug!(
            previous = self.entries.len(),
            entries = entries.len(),
            "replaced properties"
        );
        self.entries = entries;
        Ok(())
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value for `key`, or `default` when the key is absent. An empty default is returned as-is.
    pub fn get_property_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_property(key).unwrap_or(default)
    }

    /// Add or change a property. New keys go to the end; existing keys keep their position.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &str)> + ExactSizeIterator {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.entries
    }

    pub fn into_map(self) -> IndexMap<String, String> {
        self.entries
    }

    pub fn to_properties_string(&self, options: &EncodeOptions) -> String {
        encode::encode(self.iter(), options)
    }
}

impl FromStr for PropertyStore {
    type Err = LexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_properties_string(&EncodeOptions::default()))
    }
}

impl From<IndexMap<String, String>> for PropertyStore {
    fn from(entries: IndexMap<String, String>) -> Self {
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for PropertyStore {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.set_property(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a PropertyStore {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for PropertyStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StoreVisitor;

        impl<'de> de::Visitor<'de> for StoreVisitor {
            type Value = PropertyStore;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of string properties")
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut store = PropertyStore::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    store.set_property(key, value);
                }
                Ok(store)
            }
        }

        deserializer.deserialize_map(StoreVisitor)
    }
}
