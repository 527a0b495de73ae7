use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{validate_address, AuthUser};
use crate::error::ApiError;
use crate::mirror::EventEnvelope;
use crate::model::{PropertyView, Role};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/transaction/:tx_hash", get(transaction))
        .route("/properties/by-owner/:address", get(by_owner))
        .route("/events", post(ingest_event))
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let ledger = state.chain.latest_ledger().await.map_err(|e| {
        warn!(rpc = state.chain.url(), error = %e, "RPC status check failed");
        ApiError::from(e)
    })?;
    // Reachable but unhealthy still reports the ledger it last saw.
    let health = match state.chain.health().await {
        Ok(h) => h.status,
        Err(e) => {
            warn!(error = %e, "RPC health check failed");
            "unknown".to_string()
        }
    };
    Ok(Json(json!({
        "network": state.config.network.as_str(),
        "network_passphrase": state.config.network.passphrase(),
        "rpc_url": state.chain.url(),
        "connected": true,
        "rpc_health": health,
        "latest_ledger": ledger.sequence,
        "protocol_version": ledger.protocol_version,
        "contract_id": state.config.contract_id,
    })))
}

async fn transaction(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let tx_hash = tx_hash.to_lowercase();
    if tx_hash.len() != 64 || !tx_hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ApiError::Validation(
            "transaction hash must be 64 hex characters".into(),
        ));
    }
    let tx = state.chain.transaction(&tx_hash).await?;
    if tx.status == "NOT_FOUND" {
        return Err(ApiError::NotFound(format!("transaction {tx_hash} not found")));
    }
    Ok(Json(json!({
        "transaction_hash": tx_hash,
        "status": tx.status,
        "ledger": tx.ledger,
        "created_at": tx.created_at,
        "application_order": tx.application_order,
        "confirmations": tx.ledger.map(|l| tx.latest_ledger.saturating_sub(l)),
    })))
}

async fn by_owner(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Value>, ApiError> {
    validate_address(&address)?;
    let mut token_ids: Vec<u64> = state
        .store
        .list_properties()?
        .into_iter()
        .filter(|p| p.owner_address == address)
        .map(|p| p.token_id)
        .collect();
    token_ids.sort_unstable();
    Ok(Json(json!({
        "owner_address": address,
        "count": token_ids.len(),
        "token_ids": token_ids,
    })))
}

async fn ingest_event(
    user: AuthUser,
    State(state): State<AppState>,
    Json(envelope): Json<EventEnvelope>,
) -> Result<Json<PropertyView>, ApiError> {
    user.require(&[Role::Admin])?;
    let token_id = envelope.event.token_id();
    let record = state.mirror.apply(envelope.event, envelope.tx_hash)?;
    info!(token_id, ledger = ?envelope.ledger, "ledger event ingested");
    Ok(Json(record.into_view()))
}
