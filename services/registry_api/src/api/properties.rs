use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{validate_address, AuthUser};
use crate::error::ApiError;
use crate::geo::{BoundingBox, Coordinates, Geometry};
use crate::ipfs::sha256_hex;
use crate::mirror::{Amendment, LedgerEvent, MirrorError};
use crate::model::{
    Document, DocumentType, HistoryEntry, PropertyRecord, PropertyStatus, PropertyType,
    PropertyView, Role,
};
use crate::query::{self, Overview, Page, PropertyQuery};
use crate::state::AppState;

const MAX_MAP_FEATURES: usize = 1000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_properties).post(create_property))
        .route("/stats/overview", get(overview))
        .route("/map/bounds", get(map_bounds))
        .route("/:token_id", get(get_property).patch(update_property))
        .route("/:token_id/geojson", get(get_geojson))
        .route("/:token_id/history", get(get_history))
        .route("/:token_id/transfer", post(transfer_property))
        .route("/:token_id/verify", post(verify_property))
}

pub(crate) fn load(state: &AppState, token_id: u64) -> Result<PropertyRecord, ApiError> {
    state
        .store
        .get_property(token_id)?
        .ok_or_else(|| MirrorError::NotFound(token_id).into())
}

async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> Result<Json<Page>, ApiError> {
    Ok(Json(query.run(state.store.list_properties()?)?))
}

async fn get_property(
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
) -> Result<Json<PropertyView>, ApiError> {
    let record = load(&state, token_id)?;
    Ok(Json(record.into_view()))
}

async fn get_geojson(
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(load(&state, token_id)?.to_feature()))
}

async fn get_history(
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
) -> Result<Json<HistoryResponse>, ApiError> {
    load(&state, token_id)?;
    let history = state.store.history(token_id)?;
    Ok(Json(HistoryResponse { token_id, history }))
}

#[derive(Serialize)]
struct HistoryResponse {
    token_id: u64,
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct InlineDocument {
    filename: String,
    #[serde(default = "default_mime")]
    mime_type: String,
    content_base64: String,
}

fn default_mime() -> String {
    "application/octet-stream".into()
}

#[derive(Debug, Deserialize)]
struct CreateProperty {
    /// Id minted by `register_property` on chain.
    token_id: u64,
    owner_address: String,
    location: String,
    coordinates: Option<Geometry>,
    area: f64,
    #[serde(default)]
    value: i64,
    property_type: PropertyType,
    document: Option<InlineDocument>,
    tx_hash: Option<String>,
}

async fn create_property(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateProperty>,
) -> Result<(StatusCode, Json<PropertyView>), ApiError> {
    user.require(&[Role::Notary])?;
    validate_address(&req.owner_address)?;

    let location = req.location.trim().to_string();
    let len = location.chars().count();
    if !(5..=500).contains(&len) {
        return Err(ApiError::Validation("location must be 5 to 500 characters".into()));
    }
    if let Some(g) = &req.coordinates {
        g.validate().map_err(ApiError::Validation)?;
    }
    // Fail before pinning anything.
    if state.store.get_property(req.token_id)?.is_some() {
        return Err(MirrorError::TokenExists(req.token_id).into());
    }
    if state.store.location_owner(&location)?.is_some() {
        return Err(MirrorError::LocationTaken(location).into());
    }

    let mut deed = None;
    if let Some(doc) = req.document {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(doc.content_base64.as_bytes())
            .map_err(|e| ApiError::Validation(format!("document is not base64: {e}")))?;
        if bytes.len() > state.config.max_file_size {
            return Err(ApiError::PayloadTooLarge(format!(
                "document exceeds {} bytes",
                state.config.max_file_size
            )));
        }
        let sha256 = sha256_hex(&bytes);
        let size = bytes.len() as u64;
        let ipfs_hash = state.pinner.add(&doc.filename, bytes).await?;
        deed = Some(Document {
            id: Uuid::new_v4(),
            property_token_id: req.token_id,
            filename: doc.filename,
            mime_type: doc.mime_type,
            size,
            sha256,
            ipfs_hash,
            document_type: DocumentType::TitleDeed,
            uploaded_by: user.address().to_string(),
            uploaded_at: Utc::now(),
            verified: false,
        });
    }

    let record = state.mirror.apply(
        LedgerEvent::Registered {
            token_id: req.token_id,
            owner: req.owner_address,
            registrar: Some(user.address().to_string()),
            location,
            coordinates: req.coordinates.map(Coordinates::Geometry),
            area: req.area,
            value: req.value,
            property_type: req.property_type,
            document_hash: deed.as_ref().map(|d| d.ipfs_hash.clone()),
        },
        req.tx_hash,
    )?;
    if let Some(deed) = &deed {
        state.store.put_document(deed)?;
    }
    info!(token_id = record.token_id, registrar = user.address(), "property created");
    Ok((StatusCode::CREATED, Json(record.into_view())))
}

#[derive(Debug, Deserialize)]
struct UpdateProperty {
    coordinates: Option<Geometry>,
    value: Option<i64>,
    status: Option<PropertyStatus>,
    tx_hash: Option<String>,
}

async fn update_property(
    user: AuthUser,
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
    Json(req): Json<UpdateProperty>,
) -> Result<Json<PropertyView>, ApiError> {
    if req.coordinates.is_none() && req.value.is_none() && req.status.is_none() {
        return Err(ApiError::Validation("nothing to update".into()));
    }
    let current = load(&state, token_id)?;

    // Permissions for every field are checked before anything is written.
    if req.coordinates.is_some() && current.owner_address != user.address() {
        user.require(&[Role::Notary])?;
    }
    if req.value.is_some() {
        user.require(&[Role::TaxAuthority])?;
    }
    if req.status.is_some() {
        user.require(&[])?;
    }

    let record = state.mirror.amend(
        token_id,
        Amendment {
            coordinates: req.coordinates,
            value: req.value,
            status: req.status,
        },
        req.tx_hash,
    )?;
    Ok(Json(record.into_view()))
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    new_owner_address: String,
    transfer_value: Option<i64>,
    tx_hash: Option<String>,
}

async fn transfer_property(
    user: AuthUser,
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<PropertyView>, ApiError> {
    user.require(&[Role::Notary])?;
    validate_address(&req.new_owner_address)?;
    let record = state.mirror.apply(
        LedgerEvent::Transferred {
            token_id,
            from: None,
            to: req.new_owner_address,
            value: req.transfer_value,
        },
        req.tx_hash,
    )?;
    Ok(Json(record.into_view()))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    #[serde(default = "default_true")]
    verified: bool,
    notes: Option<String>,
    tx_hash: Option<String>,
}

async fn verify_property(
    user: AuthUser,
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<PropertyView>, ApiError> {
    user.require(&[Role::Surveyor])?;
    let record = state.mirror.apply(
        LedgerEvent::Verified {
            token_id,
            surveyor: user.address().to_string(),
            verified: req.verified,
        },
        req.tx_hash,
    )?;
    if let Some(notes) = req.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        info!(token_id, surveyor = user.address(), notes, "verification notes");
    }
    Ok(Json(record.into_view()))
}

async fn overview(State(state): State<AppState>) -> Result<Json<Overview>, ApiError> {
    let all = state.store.list_properties()?;
    Ok(Json(query::overview(&all)))
}

async fn map_bounds(
    State(state): State<AppState>,
    Query(bounds): Query<BoundingBox>,
) -> Result<Json<Value>, ApiError> {
    bounds.validate().map_err(ApiError::Validation)?;
    let features: Vec<Value> = state
        .store
        .list_properties()?
        .iter()
        .filter(|p| p.coordinates.as_ref().is_some_and(|g| bounds.intersects(g)))
        .take(MAX_MAP_FEATURES)
        .map(PropertyRecord::to_feature)
        .collect();
    Ok(Json(json!({
        "type": "FeatureCollection",
        "features": features,
    })))
}
