use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::{
    codec,
    models::StateDocument,
    occ::{self, InsertError},
    store::{DocumentStore, StoreError},
};

// ── Errors ─────────────────────────────────────────────────────────────────

/// Everything a caller of [`Shortener`] can get back. Store-specific error
/// shapes stay behind [`ShortenerError::StoreUnavailable`].
#[derive(Debug, thiserror::Error)]
pub enum ShortenerError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("no url stored for id {0:?}")]
    NotFound(String),

    /// Conflict budget ran out; nothing was written, so resubmitting is safe.
    #[error("too many concurrent writers, gave up after {attempts} attempts")]
    TransientFailure { attempts: u32 },

    #[error("no short ids left")]
    IdSpaceExhausted,

    #[error("store unavailable")]
    StoreUnavailable(#[source] StoreError),
}

impl From<StoreError> for ShortenerError {
    fn from(e: StoreError) -> Self {
        Self::StoreUnavailable(e)
    }
}

impl From<InsertError> for ShortenerError {
    fn from(e: InsertError) -> Self {
        match e {
            InsertError::Exhausted { attempts } => Self::TransientFailure { attempts },
            InsertError::IdSpaceExhausted => Self::IdSpaceExhausted,
            InsertError::Store(e) => Self::StoreUnavailable(e),
        }
    }
}

// ── Results ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shrunk {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub count: u64,
}

// ── Service ────────────────────────────────────────────────────────────────

/// The three operations the HTTP layer is built on. Holds no state of its
/// own beyond the store handle, so it is cheap to clone and share.
#[derive(Clone)]
pub struct Shortener {
    store: Arc<dyn DocumentStore>,
    max_retries: u32,
}

impl Shortener {
    pub fn new(store: Arc<dyn DocumentStore>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// Validate `url` and give it the next short id.
    pub async fn shrink(&self, url: &str) -> Result<Shrunk, ShortenerError> {
        let url = validate_url(url)?;
        let inserted = occ::insert(self.store.as_ref(), &url, self.max_retries).await?;
        Ok(Shrunk {
            id: inserted.id,
            url,
        })
    }

    /// Resolve a short id back to its url.
    pub async fn explode(&self, id: &str) -> Result<String, ShortenerError> {
        codec::decode(id).map_err(|e| ShortenerError::InvalidInput(e.to_string()))?;

        let document = self.document().await?;
        lookup(id, &document)
            .map(str::to_owned)
            .ok_or_else(|| ShortenerError::NotFound(id.to_owned()))
    }

    /// Number of urls ever inserted.
    pub async fn stats(&self) -> Result<Stats, ShortenerError> {
        let count = self.document().await?.count;
        Ok(Stats { count })
    }

    /// Current document, or the empty one if nothing was stored yet.
    pub async fn document(&self) -> Result<StateDocument, ShortenerError> {
        let snapshot = self.store.get().await?;
        Ok(snapshot.map(|v| v.document).unwrap_or_default())
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Find the url stored under `id`. The key space is exactly the set of
/// encoded ids, so no decoding is needed here.
pub fn lookup<'a>(id: &str, state: &'a StateDocument) -> Option<&'a str> {
    state.urls.get(id).map(|entry| entry.url.as_str())
}

/// Accept absolute http(s) urls with a host. Returns the trimmed input
/// unchanged so the stored url is exactly what the client sent.
pub fn validate_url(raw: &str) -> Result<String, ShortenerError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ShortenerError::InvalidInput("url must not be empty".into()));
    }

    let parsed = Url::parse(url)
        .map_err(|e| ShortenerError::InvalidInput(format!("invalid url: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ShortenerError::InvalidInput(
            "url must start with http:// or https://".into(),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ShortenerError::InvalidInput("url must have a host".into()));
    }

    Ok(url.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::reduce,
        occ::DEFAULT_MAX_RETRIES,
        store::MemoryStore,
    };

    fn shortener(store: MemoryStore) -> (Shortener, Arc<MemoryStore>) {
        let store = Arc::new(store);
        (Shortener::new(store.clone(), DEFAULT_MAX_RETRIES), store)
    }

    #[tokio::test]
    async fn shrink_then_explode() {
        let (svc, _) = shortener(MemoryStore::new());

        let shrunk = svc.shrink("http://example.com").await.unwrap();
        assert_eq!(shrunk.id, "1");
        assert_eq!(svc.explode("1").await.unwrap(), "http://example.com");
        assert_eq!(svc.stats().await.unwrap(), Stats { count: 1 });
    }

    #[tokio::test]
    async fn explode_is_repeatable() {
        let (svc, _) = shortener(MemoryStore::new());
        svc.shrink("https://example.com/a?b=c").await.unwrap();

        let first = svc.explode("1").await.unwrap();
        let second = svc.explode("1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn thirty_sixth_url_gets_a_two_digit_id() {
        let doc = (0..35).fold(StateDocument::default(), |doc, i| {
            reduce(&doc, doc.next_entry(&format!("http://example.com/{i}")))
        });
        let (svc, _) = shortener(MemoryStore::with_document(doc));

        assert_eq!(svc.shrink("http://example.com").await.unwrap().id, "10");
    }

    #[tokio::test]
    async fn overlong_id_is_invalid_input() {
        let (svc, _) = shortener(MemoryStore::new());
        assert!(matches!(
            svc.explode("zzzzzzzz").await,
            Err(ShortenerError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.explode("").await,
            Err(ShortenerError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (svc, _) = shortener(MemoryStore::new());
        assert!(matches!(
            svc.explode("abc").await,
            Err(ShortenerError::NotFound(id)) if id == "abc"
        ));
    }

    #[tokio::test]
    async fn invalid_url_never_reaches_the_store() {
        let (svc, store) = shortener(MemoryStore::new());
        for bad in ["", "   ", "not a url", "ftp://example.com", "mailto:a@b.c"] {
            assert!(
                matches!(svc.shrink(bad).await, Err(ShortenerError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_outage_is_reported_as_unavailable() {
        let (svc, store) = shortener(MemoryStore::new());
        store.set_offline(true);

        assert!(matches!(
            svc.shrink("http://example.com").await,
            Err(ShortenerError::StoreUnavailable(_))
        ));
        assert!(matches!(
            svc.explode("1").await,
            Err(ShortenerError::StoreUnavailable(_))
        ));
        assert!(matches!(
            svc.stats().await,
            Err(ShortenerError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn stats_on_empty_store_is_zero() {
        let (svc, _) = shortener(MemoryStore::new());
        assert_eq!(svc.stats().await.unwrap().count, 0);
    }

    #[test]
    fn validate_url_trims_but_keeps_the_original_text() {
        assert_eq!(
            validate_url("  http://example.com  ").unwrap(),
            "http://example.com"
        );
        assert!(validate_url("https://sub.example.org/path?q=1#frag").is_ok());
        assert!(validate_url("http://").is_err());
    }

    #[test]
    fn lookup_misses_are_none() {
        let doc = StateDocument::default();
        let doc = reduce(&doc, doc.next_entry("http://example.com"));
        assert_eq!(lookup("1", &doc), Some("http://example.com"));
        assert_eq!(lookup("2", &doc), None);
    }
}
