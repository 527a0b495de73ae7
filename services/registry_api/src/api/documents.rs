use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use serde::Deserialize;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::ipfs::sha256_hex;
use crate::model::{Document, DocumentType, Role};
use crate::state::AppState;

use super::properties::load;

// Room for the multipart framing and the small text fields.
const FORM_OVERHEAD: usize = 64 * 1024;
const MAX_BULK_VERIFY: usize = 100;

pub fn routes(max_file_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_file_size + FORM_OVERHEAD)),
        )
        .route("/types/available", get(types_available))
        .route("/bulk-verify", post(bulk_verify))
        .route("/property/:token_id", get(for_property))
        .route("/:id", get(get_document).delete(delete_document))
        .route("/:id/download", get(download))
        .route("/:id/verify", post(verify_integrity))
}

fn find(state: &AppState, id: Uuid) -> Result<Document, ApiError> {
    state
        .store
        .get_document(id)?
        .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))
}

fn document_json(state: &AppState, doc: &Document) -> Value {
    let mut v = json!(doc);
    if let Some(obj) = v.as_object_mut() {
        obj.insert("type_display".into(), doc.document_type.display().into());
        obj.insert("gateway_url".into(), json!(state.pinner.gateway_url(&doc.ipfs_hash)));
    }
    v
}

async fn upload(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut property_id: Option<u64> = None;
    let mut document_type: Option<DocumentType> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "property_id" => {
                let text = field.text().await?;
                property_id = Some(text.trim().parse().map_err(|_| {
                    ApiError::Validation(format!("property_id {text:?} is not a token id"))
                })?);
            }
            "document_type" => {
                let text = field.text().await?;
                document_type = Some(
                    serde_json::from_value(Value::String(text.trim().to_uppercase()))
                        .map_err(|_| ApiError::Validation(format!("unknown document type {text:?}")))?,
                );
            }
            "file" => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, mime, bytes.to_vec()));
            }
            other => warn!(field = other, "ignoring unknown upload field"),
        }
    }

    let token_id =
        property_id.ok_or_else(|| ApiError::Validation("property_id is required".into()))?;
    let document_type = document_type.unwrap_or(DocumentType::Other);
    let (filename, mime_type, bytes) =
        file.ok_or_else(|| ApiError::Validation("file is required".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::Validation("file is empty".into()));
    }
    if bytes.len() > state.config.max_file_size {
        return Err(ApiError::PayloadTooLarge(format!(
            "file exceeds {} bytes",
            state.config.max_file_size
        )));
    }

    let property = load(&state, token_id)?;
    if property.owner_address != user.address() {
        user.require(&[Role::Notary, Role::Surveyor])?;
    }

    let sha256 = sha256_hex(&bytes);
    let size = bytes.len() as u64;
    let ipfs_hash = state.pinner.add(&filename, bytes).await?;
    let doc = Document {
        id: Uuid::new_v4(),
        property_token_id: token_id,
        filename,
        mime_type,
        size,
        sha256,
        ipfs_hash,
        document_type,
        uploaded_by: user.address().to_string(),
        uploaded_at: Utc::now(),
        verified: false,
    };
    state.store.put_document(&doc)?;
    info!(token_id, id = %doc.id, hash = %doc.ipfs_hash, backend = state.pinner.backend(), "document stored");
    Ok((StatusCode::CREATED, Json(document_json(&state, &doc))))
}

async fn for_property(
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    load(&state, token_id)?;
    let docs: Vec<Value> = state
        .store
        .documents_for(token_id)?
        .iter()
        .map(|d| document_json(&state, d))
        .collect();
    Ok(Json(json!({ "token_id": token_id, "documents": docs })))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let doc = find(&state, id)?;
    Ok(Json(document_json(&state, &doc)))
}

async fn download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let doc = find(&state, id)?;
    let bytes = state.pinner.fetch(&doc.ipfs_hash).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        doc.filename.replace(['"', '\\', '\r', '\n'], "_")
    );
    Response::builder()
        .header(header::CONTENT_TYPE, doc.mime_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// Re-fetch the content, compare digests and store the outcome.
async fn check_integrity(state: &AppState, id: Uuid) -> Result<Value, ApiError> {
    let mut doc = find(state, id)?;
    let bytes = state.pinner.fetch(&doc.ipfs_hash).await?;
    let actual = sha256_hex(&bytes);
    let intact = actual == doc.sha256;
    if intact != doc.verified {
        doc.verified = intact;
        state.store.put_document(&doc)?;
    }
    if !intact {
        warn!(id = %doc.id, expected = %doc.sha256, %actual, "document digest mismatch");
    }
    Ok(json!({
        "document_id": doc.id,
        "verified": intact,
        "expected_sha256": doc.sha256,
        "actual_sha256": actual,
    }))
}

async fn verify_integrity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(check_integrity(&state, id).await?))
}

#[derive(Debug, Deserialize)]
struct BulkVerify {
    document_ids: Vec<Uuid>,
}

async fn bulk_verify(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<BulkVerify>,
) -> Result<Json<Value>, ApiError> {
    user.require(&[Role::Notary, Role::Surveyor])?;
    if req.document_ids.is_empty() || req.document_ids.len() > MAX_BULK_VERIFY {
        return Err(ApiError::Validation(format!(
            "document_ids must hold 1 to {MAX_BULK_VERIFY} ids"
        )));
    }

    // One failure does not stop the batch.
    let mut results = Vec::with_capacity(req.document_ids.len());
    for id in req.document_ids {
        results.push(match check_integrity(&state, id).await {
            Ok(report) => json!({ "document_id": id, "status": "success", "verification": report }),
            Err(e) => json!({ "document_id": id, "status": "error", "error": e.to_string() }),
        });
    }
    info!(count = results.len(), by = user.address(), "bulk document verification");
    Ok(Json(json!({ "results": results })))
}

async fn delete_document(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let doc = find(&state, id)?;
    if doc.uploaded_by != user.address() {
        user.require(&[])?;
    }
    state.store.delete_document(id)?;
    info!(%id, token_id = doc.property_token_id, by = user.address(), "document deleted");
    Ok(Json(json!({ "deleted": id })))
}

async fn types_available() -> Json<Value> {
    let types: Vec<Value> = DocumentType::ALL
        .iter()
        .map(|t| json!({ "value": t, "label": t.display() }))
        .collect();
    Json(json!({ "document_types": types }))
}
