//! Wallet sign-in and bearer tokens.
//!
//! A client asks for a nonce, signs the returned message with the ed25519
//! key behind its Stellar `G…` address, and trades the signature for a JWT.
//! Handlers take [`AuthUser`] to require a valid token; the role is read
//! from the store on every request so role changes apply immediately.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::model::{Role, User};
use crate::state::AppState;

/// How long a sign-in nonce stays valid.
pub const NONCE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Wallet address.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.wallet_address.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))
    }
}

/// The text a wallet signs to log in.
pub fn login_message(address: &str, nonce: &str) -> String {
    format!("Sign in to the land registry\n\nWallet: {address}\nNonce: {nonce}")
}

/// Reject anything that is not a well-formed Stellar account id.
pub fn validate_address(address: &str) -> Result<(), ApiError> {
    stellar_strkey::ed25519::PublicKey::from_string(address)
        .map(|_| ())
        .map_err(|_| ApiError::Validation(format!("invalid wallet address {address:?}")))
}

/// Check a hex-encoded ed25519 signature of `message` against the key
/// encoded in `address`.
pub fn verify_signature(address: &str, message: &str, signature_hex: &str) -> Result<(), ApiError> {
    let unauthorized = |what: &str| ApiError::Unauthorized(format!("signature rejected: {what}"));

    let public = stellar_strkey::ed25519::PublicKey::from_string(address)
        .map_err(|_| unauthorized("bad address"))?;
    let key = VerifyingKey::from_bytes(&public.0).map_err(|_| unauthorized("bad key"))?;
    let bytes = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|_| unauthorized("signature is not hex"))?;
    let signature = Signature::from_slice(&bytes).map_err(|_| unauthorized("bad length"))?;
    key.verify_strict(message.as_bytes(), &signature)
        .map_err(|_| unauthorized("mismatch"))
}

/// An authenticated, active user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn address(&self) -> &str {
        &self.0.wallet_address
    }

    /// Admins pass every role check.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if self.0.role == Role::Admin || roles.contains(&self.0.role) {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied(format!(
                "{:?} role may not perform this action",
                self.0.role
            )))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

        let claims = state.tokens.verify(token)?;
        match state.store.get_user(&claims.sub)? {
            Some(user) if user.is_active => Ok(AuthUser(user)),
            Some(_) => Err(ApiError::Unauthorized("account disabled".into())),
            None => Err(ApiError::Unauthorized("unknown account".into())),
        }
    }
}
