//! Optimistic read-modify-write of the shared state document.
//!
//! An insertion reads the document, derives the next one with
//! [`reduce`](crate::models::reduce) and writes it back conditionally on the
//! revision it read. When another writer got there first the store answers
//! with its current document; the insertion rebases on it and tries again,
//! at most `max_retries` more times. The store's conditional write is the
//! only serialization point, so nothing here takes a lock.

use crate::{
    codec,
    models::{reduce, StateDocument},
    store::{DocumentStore, SetError, StoreError, Version, Versioned},
};

/// Retries after the first attempt unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Outcome of a committed insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    pub id: String,
    pub count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("gave up after {attempts} conflicting writes")]
    Exhausted { attempts: u32 },

    #[error("no ids left below the {} character limit", codec::MAX_ID_LEN)]
    IdSpaceExhausted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Insert `url` into the document held by `store`.
///
/// `url` must already be validated.
pub async fn insert(
    store: &dyn DocumentStore,
    url: &str,
    max_retries: u32,
) -> Result<Inserted, InsertError> {
    let snapshot = store.get().await?;
    insert_from(store, snapshot, url, max_retries).await
}

/// Run the write loop starting from an already fetched snapshot.
pub(crate) async fn insert_from(
    store: &dyn DocumentStore,
    snapshot: Option<Versioned>,
    url: &str,
    max_retries: u32,
) -> Result<Inserted, InsertError> {
    let (initial, mut version) = match snapshot {
        Some(Versioned { document, version }) => (document, Some(version)),
        None => (StateDocument::default(), None),
    };
    let mut base = initial.clone();

    for attempt in 0..=max_retries {
        if base.count >= codec::MAX_ID {
            return Err(InsertError::IdSpaceExhausted);
        }

        let entry = base.next_entry(url);
        let next = reduce(&base, entry);

        match store.set(&next, version).await {
            Ok(_) => {
                let id = codec::encode(next.count);
                tracing::info!(%id, count = next.count, attempt, "url inserted");
                return Ok(Inserted {
                    id,
                    count: next.count,
                });
            }
            Err(SetError::Conflict(current)) => {
                tracing::debug!(
                    attempt,
                    local_count = base.count,
                    store_count = current.document.count,
                    "version conflict, rebasing"
                );
                let (rebased, current_version) = choose_base(&initial, current);
                base = rebased;
                version = Some(current_version);
            }
            Err(SetError::Store(e)) => {
                tracing::error!("store failed during insert: {e}");
                return Err(e.into());
            }
        }
    }

    let attempts = max_retries + 1;
    tracing::warn!(attempts, "insert abandoned under contention");
    Err(InsertError::Exhausted { attempts })
}

/// Pick the document to retry on after a conflict.
///
/// The base is whichever of the originally read document and the store's
/// reported one has the larger count (the store's on a tie). The retry is
/// always tagged with the store's revision, since that is what the next
/// conditional write is checked against.
pub fn choose_base(initial: &StateDocument, conflict: Versioned) -> (StateDocument, Version) {
    if initial.count > conflict.document.count {
        (initial.clone(), conflict.version)
    } else {
        (conflict.document, conflict.version)
    }
}
