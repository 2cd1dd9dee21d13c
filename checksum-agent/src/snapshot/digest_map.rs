//! Path to digest mapping that remembers insertion order.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relative path → hex digest, iterated in insertion (traversal) order.
///
/// Serialized as a list of `[path, digest]` pairs. Deserializing a list that
/// repeats a path fails instead of keeping either value.
#[derive(Debug, Clone, Default)]
pub struct DigestMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl DigestMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced path keeps its original position and the
    /// previous digest is returned.
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) -> Option<String> {
        let path = path.into();
        let digest = digest.into();

        if let Some(&slot) = self.index.get(&path) {
            return Some(std::mem::replace(&mut self.entries[slot].1, digest));
        }

        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, digest));
        None
    }

    /// Build from pairs, rejecting the first repeated path.
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = Self::new();
        for (path, digest) in pairs {
            if map.contains(&path) {
                return Err(format!("duplicate path {:?}", path));
            }
            map.insert(path, digest);
        }
        Ok(map)
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.index.get(path).map(|&slot| self.entries[slot].1.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(path, digest)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    /// A copy ordered by path, for reports and stable output.
    pub fn sorted(&self) -> DigestMap {
        let mut pairs = self.entries.clone();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let index = pairs
            .iter()
            .enumerate()
            .map(|(slot, (path, _))| (path.clone(), slot))
            .collect();

        DigestMap {
            entries: pairs,
            index,
        }
    }

    /// Pretty JSON pair listing, the same text the snapshot store writes.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for DigestMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (path, digest) in &self.entries {
            seq.serialize_element(&(path, digest))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for DigestMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = Vec::<(String, String)>::deserialize(deserializer)?;
        DigestMap::try_from_pairs(pairs).map_err(de::Error::custom)
    }
}

impl FromIterator<(String, String)> for DigestMap {
    /// Later duplicates overwrite earlier ones; use
    /// [`DigestMap::try_from_pairs`] when duplicates must be rejected.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = DigestMap::new();
        for (path, digest) in iter {
            map.insert(path, digest);
        }
        map
    }
}
