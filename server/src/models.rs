use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec;

/// One shortened URL inside the state document. Never changes once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntry {
    pub id: String,
    pub url: String,
}

/// The single shared record: how many URLs were ever inserted, and the
/// id → entry map. Stored as one JSON document under a fixed key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDocument {
    pub count: u64,
    #[serde(default)]
    pub urls: HashMap<String, UrlEntry>,
}

impl StateDocument {
    /// Entry that the next insertion on top of this document would create.
    pub fn next_entry(&self, url: &str) -> UrlEntry {
        UrlEntry {
            id: codec::encode(self.count + 1),
            url: url.to_owned(),
        }
    }
}

/// Compute the document that follows `state` once `insertion` is added.
///
/// `state` is left untouched: the update protocol still needs it to pick a
/// base after a conflict. Assigning `insertion.id` is the caller's job.
pub fn reduce(state: &StateDocument, insertion: UrlEntry) -> StateDocument {
    let mut urls = state.urls.clone();
    urls.insert(insertion.id.clone(), insertion);

    StateDocument {
        count: state.count + 1,
        urls,
    }
}
