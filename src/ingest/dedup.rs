// src/ingest/dedup.rs
use std::collections::{HashMap, HashSet};

use crate::incident::Incident;

/// Ids already emitted (or synced) for one source. Grows for the process
/// lifetime; nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    keys: HashSet<String>,
}

impl SeenSet {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// `true` if the key was not present before.
    pub fn insert(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keep the incidents whose key is new, in input order, recording each one.
    /// A key repeated inside `incidents` passes only the first time.
    pub fn filter_new(&mut self, incidents: Vec<Incident>, track_updates: bool) -> Vec<Incident> {
        incidents
            .into_iter()
            .filter(|inc| self.insert(inc.dedup_key(track_updates)))
            .collect()
    }
}

/// Seen-sets keyed by source name. Callers serialize access per source; the
/// scheduler does so by never running two cycles of one source at once.
#[derive(Debug, Default)]
pub struct DedupStore {
    per_source: HashMap<String, SeenSet>,
    track_updates: bool,
}

impl DedupStore {
    pub fn new(track_updates: bool) -> Self {
        Self {
            per_source: HashMap::new(),
            track_updates,
        }
    }

    pub fn filter_new(&mut self, source_name: &str, incidents: Vec<Incident>) -> Vec<Incident> {
        self.per_source
            .entry(source_name.to_string())
            .or_default()
            .filter_new(incidents, self.track_updates)
    }

    pub fn seen(&self, source_name: &str) -> Option<&SeenSet> {
        self.per_source.get(source_name)
    }
}
