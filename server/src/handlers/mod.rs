use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{shortener::ShortenerError, AppState};

pub mod api;
pub mod redirect;

impl IntoResponse for ShortenerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShortenerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ShortenerError::NotFound(_) => StatusCode::NOT_FOUND,
            ShortenerError::TransientFailure { .. } | ShortenerError::IdSpaceExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ShortenerError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            ShortenerError::StoreUnavailable(source) => {
                tracing::error!("Store error: {source}");
                (status, "Internal error").into_response()
            }
            _ => (status, self.to_string()).into_response(),
        }
    }
}

/// Resolve `id` through the cache, falling back to the store and
/// backfilling the cache on a hit.
pub(crate) async fn resolve(state: &AppState, id: &str) -> Result<String, ShortenerError> {
    if let Some(url) = state.cache.get(id) {
        return Ok(url);
    }

    let url = state.shortener.explode(id).await?;
    state.cache.set(id, &url);
    Ok(url)
}
