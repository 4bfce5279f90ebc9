//! HTTP request handlers for the web server.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::resolver::ResolveError;
use crate::scrapers::EngineStatus;

/// Query parameters for `/getlink`.
#[derive(Debug, Deserialize)]
pub struct GetLinkParams {
    pub url: Option<String>,
}

/// Resolve `?url=` into download links.
///
/// The resolution is cancelled if the client goes away (the handler future
/// is dropped) or the server starts shutting down.
pub async fn get_link(
    State(state): State<AppState>,
    Query(params): Query<GetLinkParams>,
) -> Response {
    let Some(url) = params.url.filter(|u| !u.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Missing ?url parameter",
                "kind": "invalid_input",
            })),
        )
            .into_response();
    };

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    match state.resolver.resolve(&url, &cancel).await {
        Ok(result) => {
            info!(
                "Resolved {} -> {} ({}/{} links, {})",
                url,
                result.file_id,
                result.found_count(),
                result.download_links.len(),
                result.strategy
            );
            Json(result).into_response()
        }
        Err(e) => {
            warn!("Failed to resolve {}: {}", url, e);
            (status_for(&e), Json(e.payload())).into_response()
        }
    }
}

/// HTTP status for a resolution failure.
pub fn status_for(err: &ResolveError) -> StatusCode {
    match err {
        ResolveError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ResolveError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ResolveError::Fetch { .. } | ResolveError::EmptyFileId { .. } => StatusCode::BAD_GATEWAY,
        ResolveError::RedirectNotFound { .. } => StatusCode::GATEWAY_TIMEOUT,
        // nginx's "client closed request"
        ResolveError::Cancelled => {
            StatusCode::from_u16(499).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub browser: EngineStatus,
    pub variants: Vec<String>,
}

/// Liveness plus browser engine state.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        browser: state.resolver.engine().status().await,
        variants: state
            .resolver
            .variants()
            .iter()
            .map(|v| v.key.clone())
            .collect(),
    })
}
