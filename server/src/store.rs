use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::StateDocument;

// ── Types ──────────────────────────────────────────────────────────────────

/// Opaque revision marker handed out by a store. A conditional write only
/// succeeds when it carries the revision the store currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version(i64);

impl Version {
    /// Revision assigned to a freshly created document.
    pub const INITIAL: Version = Version(1);

    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub document: StateDocument,
    pub version: Version,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored document could not be (de)serialized: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("document disappeared while holding a version for it")]
    Missing,

    #[error("store is offline")]
    Offline,
}

#[derive(Debug, thiserror::Error)]
pub enum SetError {
    /// The submitted version is stale. Carries what the store holds now.
    #[error("version conflict, store is at revision {}", .0.version.get())]
    Conflict(Versioned),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ── Contract ───────────────────────────────────────────────────────────────

/// Key-value store holding the state document, with compare-and-set writes.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Current document and its revision, or `None` if nothing was ever written.
    async fn get(&self) -> Result<Option<Versioned>, StoreError>;

    /// Write `document` if the store is still at `expected`.
    ///
    /// `expected == None` means "create, only if no document exists yet".
    /// Returns the revision the store is at after the write.
    async fn set(
        &self,
        document: &StateDocument,
        expected: Option<Version>,
    ) -> Result<Version, SetError>;
}

// ── In-memory store ────────────────────────────────────────────────────────

/// Process-local store with the same conditional-write semantics as the
/// SQLite backend. Used for `STORE_BACKEND=memory` and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Versioned>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document at [`Version::INITIAL`].
    #[allow(dead_code)]
    pub fn with_document(document: StateDocument) -> Self {
        Self {
            slot: Mutex::new(Some(Versioned {
                document,
                version: Version::INITIAL,
            })),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with [`StoreError::Offline`].
    #[allow(dead_code)]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Offline);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self) -> Result<Option<Versioned>, StoreError> {
        self.check_online()?;
        Ok(self.slot.lock().await.clone())
    }

    async fn set(
        &self,
        document: &StateDocument,
        expected: Option<Version>,
    ) -> Result<Version, SetError> {
        self.check_online()?;
        let mut slot = self.slot.lock().await;

        let version = match (slot.as_ref(), expected) {
            (None, None) => Version::INITIAL,
            (None, Some(_)) => return Err(StoreError::Missing.into()),
            (Some(current), Some(v)) if current.version == v => v.next(),
            (Some(current), _) => return Err(SetError::Conflict(current.clone())),
        };

        *slot = Some(Versioned {
            document: document.clone(),
            version,
        });
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reduce;

    fn one_url() -> StateDocument {
        let empty = StateDocument::default();
        reduce(&empty, empty.next_entry("http://example.com"))
    }

    #[tokio::test]
    async fn empty_store_reads_none_then_creates() {
        let store = MemoryStore::new();
        assert!(store.get().await.unwrap().is_none());

        let version = store.set(&one_url(), None).await.unwrap();
        assert_eq!(version, Version::INITIAL);

        let stored = store.get().await.unwrap().unwrap();
        assert_eq!(stored.document, one_url());
        assert_eq!(stored.version, Version::INITIAL);
    }

    #[tokio::test]
    async fn stale_version_conflicts_with_current_document() {
        let store = MemoryStore::with_document(one_url());
        let next = store.set(&StateDocument::default(), Some(Version::INITIAL)).await;
        assert_eq!(next.unwrap(), Version::new(2));

        match store.set(&one_url(), Some(Version::INITIAL)).await {
            Err(SetError::Conflict(current)) => {
                assert_eq!(current.version, Version::new(2));
                assert_eq!(current.document, StateDocument::default());
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_conflicts_once_a_document_exists() {
        let store = MemoryStore::with_document(one_url());
        assert!(matches!(
            store.set(&StateDocument::default(), None).await,
            Err(SetError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(store.get().await, Err(StoreError::Offline)));
        assert!(matches!(
            store.set(&one_url(), None).await,
            Err(SetError::Store(StoreError::Offline))
        ));

        store.set_offline(false);
        assert!(store.get().await.is_ok());
    }
}
