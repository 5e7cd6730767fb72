use dashmap::DashMap;
use std::sync::Arc;

use crate::models::StateDocument;

/// Read-through cache of id -> url in front of the store.
///
/// Stored entries never change once written, so a hit can never be stale and
/// nothing is ever evicted. Warmed from the state document at startup, then
/// filled on every successful shrink and on every lookup miss.
#[derive(Clone, Debug)]
pub struct UrlCache {
    inner: Arc<DashMap<String, String>>,
}

impl UrlCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    pub fn set(&self, id: impl Into<String>, url: impl Into<String>) {
        self.inner.insert(id.into(), url.into());
    }

    /// Returns a clone of the url if `id` is cached.
    pub fn get(&self, id: &str) -> Option<String> {
        self.inner.get(id).map(|v| v.clone())
    }

    /// Load every entry of `document`.
    pub fn warm(&self, document: &StateDocument) {
        for entry in document.urls.values() {
            self.set(&entry.id, &entry.url);
        }
        tracing::info!("Cache warmed with {} url(s)", self.len());
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for UrlCache {
    fn default() -> Self {
        Self::new()
    }
}
