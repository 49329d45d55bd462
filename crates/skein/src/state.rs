// State Store — The flat mapping from path to value
//
// State is plain data: the caller owns it between calls, passes it into a
// pure function and receives the updated store back. Keys are the rendered
// paths of `path.rs`; values are arrays whose shape and dtype are fixed once
// the key exists.
//
// A BTreeMap keeps iteration order sorted, so two runs that create the same
// entries produce stores that compare and serialize identically.

use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::ops::Index;

use regex::Regex;
use serde::{Deserialize, Serialize};

use skein_core::{Array, Error, Result};

use crate::path::Path;

/// Mapping from path string to value, threaded through every pure call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(BTreeMap<String, Array>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Array> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace an entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Array) -> Option<Array> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Array> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Array> {
        self.0.iter()
    }

    pub fn key_set(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    /// All entries strictly below `prefix`.
    pub fn subtree(&self, prefix: &Path) -> State {
        let lead = format!("{prefix}/");
        self.0
            .iter()
            .filter(|(k, _)| k.starts_with(&lead))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy over the entries of `other` whose keys are not present yet.
    /// Returns the keys that were added.
    pub fn merge_missing(&mut self, other: State) -> Vec<String> {
        let mut added = Vec::new();
        for (key, value) in other.0 {
            if let btree_map::Entry::Vacant(slot) = self.0.entry(key) {
                added.push(slot.key().clone());
                slot.insert(value);
            }
        }
        added
    }

    /// Entries whose keys match the regular expression `pattern` from the
    /// start. An empty result is an error unless `allow_empty` is set.
    pub fn find(&self, pattern: &str, allow_empty: bool) -> Result<State> {
        let re = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| Error::config(format!("invalid pattern {pattern:?}: {e}")))?;
        let found: State = self
            .0
            .iter()
            .filter(|(k, _)| re.is_match(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if found.is_empty() && !allow_empty {
            let keys: Vec<&str> = self.keys().collect();
            return Err(Error::msg(format!(
                "pattern {pattern:?} matched none of the state keys: {}",
                keys.join(", ")
            )));
        }
        Ok(found)
    }
}

impl Index<&str> for State {
    type Output = Array;

    fn index(&self, key: &str) -> &Array {
        match self.0.get(key) {
            Some(value) => value,
            None => panic!("no state entry {key:?}"),
        }
    }
}

impl FromIterator<(String, Array)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Array)>>(iter: I) -> Self {
        State(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, Array)> for State {
    fn from_iter<I: IntoIterator<Item = (&'a str, Array)>>(iter: I) -> Self {
        State(iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

impl IntoIterator for State {
    type Item = (String, Array);
    type IntoIter = btree_map::IntoIter<String, Array>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a State {
    type Item = (&'a String, &'a Array);
    type IntoIter = btree_map::Iter<'a, String, Array>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
