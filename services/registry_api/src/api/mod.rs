//! HTTP routes.

mod blockchain;
mod documents;
mod properties;
mod search;
mod users;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the complete router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let max_upload = state.config.max_file_size;

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/properties", properties::routes())
        .nest("/api/v1/search", search::routes())
        .nest("/api/v1/users", users::routes())
        .nest("/api/v1/documents", documents::routes(max_upload))
        .nest("/api/v1/blockchain", blockchain::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if parsed.is_empty() {
        warn!("no valid CORS origins configured, cross-origin requests will be refused");
    }
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "network": state.config.network.as_str(),
    }))
}
