//! Ordered property maps exchanged with resource providers.
//!
//! Inputs and outputs of a resource are maps from property keys to JSON
//! values, ordered by key so that serialized snapshots are stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single property value.
pub type PropertyValue = serde_json::Value;

/// An ordered mapping of property key to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(BTreeMap<String, PropertyValue>);

impl PropertyMap {
    /// Creates an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for a key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// Inserts a value, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.0.insert(key.into(), value)
    }

    /// Removes a key, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.0.remove(key)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    /// Iterates over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Looks up a value by dotted path, descending into nested objects.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&PropertyValue> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Sets a value by dotted path, creating intermediate objects as needed.
    ///
    /// Returns false if an intermediate segment exists but is not an object.
    pub fn set_path(&mut self, path: &str, value: PropertyValue) -> bool {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = match segments.pop() {
            Some(last) if !last.is_empty() => last,
            _ => return false,
        };
        if segments.is_empty() {
            self.0.insert(last.to_string(), value);
            return true;
        }
        let first = segments.remove(0);
        let mut current = self
            .0
            .entry(first.to_string())
            .or_insert_with(|| PropertyValue::Object(serde_json::Map::new()));
        for segment in segments {
            let Some(object) = current.as_object_mut() else {
                return false;
            };
            current = object
                .entry(segment.to_string())
                .or_insert_with(|| PropertyValue::Object(serde_json::Map::new()));
        }
        match current.as_object_mut() {
            Some(object) => {
                object.insert(last.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Removes a value by dotted path.
    ///
    /// Returns false if an intermediate segment exists but is not an object;
    /// removing an absent path is a no-op that returns true.
    pub fn remove_path(&mut self, path: &str) -> bool {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = match segments.pop() {
            Some(last) if !last.is_empty() => last,
            _ => return false,
        };
        if segments.is_empty() {
            self.0.remove(last);
            return true;
        }
        let first = segments.remove(0);
        let Some(mut current) = self.0.get_mut(first) else {
            return true;
        };
        for segment in segments {
            let Some(object) = current.as_object_mut() else {
                return false;
            };
            match object.get_mut(segment) {
                Some(next) => current = next,
                None => return true,
            }
        }
        match current.as_object_mut() {
            Some(object) => {
                object.remove(last);
                true
            }
            None => false,
        }
    }

    /// Returns the keys whose values differ between the two maps, in order.
    #[must_use]
    pub fn changed_keys(&self, other: &Self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.0.keys().chain(other.0.keys()) {
            if keys.last().map(String::as_str) == Some(key.as_str()) || keys.contains(key) {
                continue;
            }
            if self.0.get(key) != other.0.get(key) {
                keys.push(key.clone());
            }
        }
        keys.sort();
        keys
    }

    /// Returns true if the two maps hold different values for any key.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self != other
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
