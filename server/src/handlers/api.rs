use crate::{codec, handlers::resolve, shortener::ShortenerError, AppState};
use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "help.html")]
struct HelpTemplate {
    base_url: String,
    max_id_len: usize,
}

// ── Query types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ShrinkQuery {
    url: Option<String>,
}

#[derive(Deserialize)]
pub struct ExplodeQuery {
    id: Option<String>,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
/// Static help page listing the endpoints.
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    HelpTemplate {
        base_url: state.config.base_url.clone(),
        max_id_len: codec::MAX_ID_LEN,
    }
    .into_response()
}

/// POST /shrink?url=...
/// The request body is ignored.
pub async fn shrink(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShrinkQuery>,
) -> Response {
    let Some(url) = query.url else {
        return ShortenerError::InvalidInput("missing url query parameter".into()).into_response();
    };

    match state.shortener.shrink(&url).await {
        Ok(shrunk) => {
            state.cache.set(&shrunk.id, &shrunk.url);
            let short_url = format!("{}/{}", state.config.base_url, shrunk.id);
            Json(json!({ "id": shrunk.id, "short_url": short_url })).into_response()
        }
        Err(e) => {
            tracing::warn!("Shrink of {:?} failed: {}", url, e);
            e.into_response()
        }
    }
}

/// GET /explode?id=...
pub async fn explode(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExplodeQuery>,
) -> Response {
    let Some(id) = query.id else {
        return ShortenerError::InvalidInput("missing id query parameter".into()).into_response();
    };

    match resolve(&state, &id).await {
        Ok(url) => Json(json!({ "url": url })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Response {
    match state.shortener.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => e.into_response(),
    }
}
