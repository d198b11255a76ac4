// src/incident.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical record of one status-page entry.
///
/// Built only by the feed parser; never mutated afterwards. Dedup identity is
/// `(source_name, id)`, or `(source_name, id, updated_at)` with update tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub id: String,
    pub source_name: String,
    pub title: String,
    /// e.g. "Investigating", "Resolved"; empty when nothing recognizable was found.
    pub status: String,
    pub affected_products: Vec<String>,
    /// Plain text, line breaks kept at block boundaries.
    pub summary: String,
    pub published_at: DateTime<Utc>,
    /// Last revision time reported by the feed, when it carries one.
    pub updated_at: Option<DateTime<Utc>>,
    pub link: String,
}

impl Incident {
    /// Key stored in a source's seen-set.
    pub fn dedup_key(&self, track_updates: bool) -> String {
        match (track_updates, self.updated_at) {
            (true, Some(ts)) => format!("{}|{}", self.id, ts.to_rfc3339()),
            _ => self.id.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str) -> Incident {
    Incident {
        id: id.to_string(),
        source_name: "OpenAI".into(),
        title: format!("Incident {id}"),
        status: "Investigating".into(),
        affected_products: vec!["OpenAI API".into()],
        summary: String::new(),
        published_at: DateTime::<Utc>::UNIX_EPOCH,
        updated_at: None,
        link: format!("https://status.example.test/incidents/{id}"),
    }
}
