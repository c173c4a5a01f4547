//! The keyed JSON document stored in the backing file.

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// A configuration document: a JSON object mapping config keys to values.
///
/// Each config type owns one top-level key, so independent components can
/// share one file without overwriting each other's sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: BTreeMap<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from the raw file contents.
    ///
    /// Empty or whitespace-only contents parse as an empty document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Format`](crate::error::ConfigError::Format) if the
    /// contents are not a JSON object.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let entries = serde_json::from_slice(bytes)?;
        Ok(Self { entries })
    }

    /// Serialize the document as pretty-printed JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.entries)?)
    }

    /// Deserialize the entry under `key`, if present.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T>> {
        self.entries
            .get(key)
            .map(|value| Ok(T::deserialize(value)?))
    }

    /// Serialize `value` and store it under `key`, replacing any previous entry.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(key.into(), value);
        Ok(())
    }

    /// Remove the entry under `key`.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Returns true if an entry exists under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over the keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the document has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
