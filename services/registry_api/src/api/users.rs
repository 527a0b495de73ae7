use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{self, AuthUser, NONCE_TTL_MINUTES};
use crate::error::ApiError;
use crate::model::{Challenge, Role, User};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/nonce", post(request_nonce))
        .route("/auth/verify", post(verify_login))
        .route("/me", get(me).patch(update_me))
        .route("/wallet/:address", get(by_wallet))
        .route("/:address/role", put(set_role))
}

#[derive(Debug, Deserialize)]
struct NonceRequest {
    wallet_address: String,
}

async fn request_nonce(
    State(state): State<AppState>,
    Json(req): Json<NonceRequest>,
) -> Result<Json<Value>, ApiError> {
    auth::validate_address(&req.wallet_address)?;
    let nonce = Uuid::new_v4().simple().to_string();
    let message = auth::login_message(&req.wallet_address, &nonce);
    state.store.put_challenge(
        &req.wallet_address,
        &Challenge { nonce: nonce.clone(), message: message.clone(), issued_at: Utc::now() },
    )?;
    Ok(Json(json!({ "nonce": nonce, "message": message })))
}

#[derive(Debug, Deserialize)]
struct VerifyLogin {
    wallet_address: String,
    nonce: String,
    signature: String,
}

async fn verify_login(
    State(state): State<AppState>,
    Json(req): Json<VerifyLogin>,
) -> Result<Json<Value>, ApiError> {
    let challenge = state
        .store
        .take_challenge(&req.wallet_address)?
        .ok_or_else(|| ApiError::Unauthorized("no pending sign-in for this wallet".into()))?;
    if challenge.nonce != req.nonce {
        return Err(ApiError::Unauthorized("nonce mismatch".into()));
    }
    if Utc::now() - challenge.issued_at > Duration::minutes(NONCE_TTL_MINUTES) {
        return Err(ApiError::Unauthorized("nonce expired".into()));
    }
    if let Err(e) = auth::verify_signature(&req.wallet_address, &challenge.message, &req.signature) {
        warn!(wallet = %req.wallet_address, "sign-in signature rejected");
        return Err(e);
    }

    let mut user = match state.store.get_user(&req.wallet_address)? {
        Some(user) if !user.is_active => {
            return Err(ApiError::Unauthorized("account disabled".into()));
        }
        Some(user) => user,
        None => {
            info!(wallet = %req.wallet_address, "new citizen account");
            User::citizen(req.wallet_address.clone())
        }
    };
    user.last_login = Some(Utc::now());
    state.store.put_user(&user)?;

    let token = state.tokens.issue(&user)?;
    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
        "user": user.to_json(),
    })))
}

async fn me(user: AuthUser) -> Json<Value> {
    Json(user.0.to_json())
}

#[derive(Debug, Deserialize)]
struct UpdateProfile {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

fn non_empty(field: Option<String>) -> Option<Option<String>> {
    field.map(|v| {
        let v = v.trim().to_string();
        (!v.is_empty()).then_some(v)
    })
}

async fn update_me(
    AuthUser(mut user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfile>,
) -> Result<Json<Value>, ApiError> {
    if let Some(email) = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(ApiError::Validation(format!("invalid email {email:?}")));
        }
    }
    if let Some(v) = non_empty(req.first_name) {
        user.first_name = v;
    }
    if let Some(v) = non_empty(req.last_name) {
        user.last_name = v;
    }
    if let Some(v) = non_empty(req.email) {
        user.email = v;
    }
    if let Some(v) = non_empty(req.phone) {
        user.phone = v;
    }
    user.updated_at = Some(Utc::now());
    state.store.put_user(&user)?;
    Ok(Json(user.to_json()))
}

async fn by_wallet(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .store
        .get_user(&address)?
        .ok_or_else(|| ApiError::NotFound(format!("user {address} not found")))?;
    Ok(Json(user.to_json()))
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role: Role,
}

async fn set_role(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<Value>, ApiError> {
    admin.require(&[Role::Admin])?;
    let mut user = state
        .store
        .get_user(&address)?
        .ok_or_else(|| ApiError::NotFound(format!("user {address} not found")))?;
    let old = user.role;
    user.role = req.role;
    user.updated_at = Some(Utc::now());
    state.store.put_user(&user)?;
    info!(wallet = %address, ?old, new = ?req.role, by = admin.address(), "role changed");
    Ok(Json(user.to_json()))
}
