//! HTTP surface: the aggregated bookmarks, their category tree, and the
//! webhook that evicts the cache when a source repository changes.

use crate::aggregator::Aggregator;
use crate::error::AggregationError;
use crate::models::Bookmark;
use crate::tree::TreeNode;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, webhook_secret: Option<String>) -> Self {
        Self {
            aggregator,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/bookmarks", get(bookmarks_handler))
        .route("/bookmarks/categories", get(categories_handler))
        .route("/webhook/:provider", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn aggregation_failed(e: AggregationError) -> ApiError {
    error!("Aggregation failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

async fn bookmarks_handler(State(state): State<AppState>) -> Result<Json<Vec<Bookmark>>, ApiError> {
    state
        .aggregator
        .bookmarks()
        .await
        .map(Json)
        .map_err(aggregation_failed)
}

async fn categories_handler(State(state): State<AppState>) -> Result<Json<TreeNode>, ApiError> {
    state
        .aggregator
        .category_tree()
        .await
        .map(Json)
        .map_err(aggregation_failed)
}

/// Header carrying the shared secret, e.g. `X-Gitlab-Token`.
fn token_header(provider: &str) -> String {
    format!("x-{}-token", provider.to_lowercase())
}

/// Event name from the provider's event header, or from the payload.
fn event_name(provider: &str, headers: &HeaderMap, body: &[u8]) -> Option<String> {
    let header = format!("x-{}-event", provider.to_lowercase());
    if let Some(event) = headers.get(header.as_str()).and_then(|v| v.to_str().ok()) {
        return Some(event.to_string());
    }

    let payload: Value = serde_json::from_slice(body).ok()?;
    ["event_name", "object_kind"]
        .iter()
        .find_map(|field| payload.get(*field).and_then(Value::as_str))
        .map(String::from)
}

async fn webhook_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    if let Some(ref secret) = state.webhook_secret {
        let header = token_header(&provider);
        let supplied = headers.get(header.as_str()).and_then(|v| v.to_str().ok());
        if supplied != Some(secret.as_str()) {
            warn!("Rejected {} webhook: bad or missing {}", provider, header);
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid webhook token" })),
            ));
        }
    }

    let event = event_name(&provider, &headers, &body);
    match event {
        Some(ref event) => info!("Received {} webhook: {}", provider, event),
        None => info!("Received {} webhook", provider),
    }

    state.aggregator.invalidate().await;

    Ok(Json(json!({
        "status": "ok",
        "provider": provider,
        "event": event,
    })))
}
