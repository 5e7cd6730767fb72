use crate::{handlers::resolve, AppState};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

/// GET /:id
///
/// 1. Check the in-memory cache for the id (fast path, no store hit).
/// 2. On a cache miss, read the state document and backfill the cache.
/// 3. Redirect to the original URL.
pub async fn redirect(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match resolve(&state, &id).await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            tracing::debug!("Redirect for '{}' failed: {}", id, e);
            e.into_response()
        }
    }
}
