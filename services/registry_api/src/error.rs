use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::chain::ChainError;
use crate::ipfs::PinError;
use crate::mirror::MirrorError;
use crate::store::StoreError;

/// Stable, machine-readable identifiers. Clients match on these, never on
/// the message text.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const UPSTREAM: &str = "UPSTREAM_ERROR";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Error returned by every handler. Renders as
/// `{"code": "NOT_FOUND", "message": "property 7 not found"}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// HTTP 401. Clients drop their stored token on this.
    #[error("{0}")]
    Unauthorized(String),

    /// HTTP 403.
    #[error("{0}")]
    PermissionDenied(String),

    /// HTTP 413.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// IPFS or RPC answered with an error. HTTP 502.
    #[error("{0}")]
    Upstream(String),

    /// IPFS or RPC could not be reached. HTTP 503.
    #[error("{0}")]
    Unavailable(String),

    /// HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => error_code::NOT_FOUND,
            ApiError::Conflict(_) => error_code::ALREADY_EXISTS,
            ApiError::Validation(_) => error_code::VALIDATION_FAILED,
            ApiError::Unauthorized(_) => error_code::UNAUTHENTICATED,
            ApiError::PermissionDenied(_) => error_code::PERMISSION_DENIED,
            ApiError::PayloadTooLarge(_) => error_code::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) => error_code::UPSTREAM,
            ApiError::Unavailable(_) => error_code::UNAVAILABLE,
            ApiError::Internal(_) => error_code::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<MirrorError> for ApiError {
    fn from(e: MirrorError) -> Self {
        match e {
            MirrorError::NotFound(_) => ApiError::NotFound(e.to_string()),
            MirrorError::TokenExists(_) | MirrorError::LocationTaken(_) => {
                ApiError::Conflict(e.to_string())
            }
            MirrorError::SelfTransfer
            | MirrorError::NotActive(_)
            | MirrorError::InvalidStatus
            | MirrorError::Invalid(_) => ApiError::Validation(e.to_string()),
            MirrorError::Store(inner) => inner.into(),
        }
    }
}

impl From<PinError> for ApiError {
    fn from(e: PinError) -> Self {
        match e {
            PinError::NotFound(_) => ApiError::NotFound(e.to_string()),
            PinError::Http(_) => ApiError::Unavailable(e.to_string()),
            PinError::Upstream(_) => ApiError::Upstream(e.to_string()),
            PinError::Store(inner) => inner.into(),
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Http(_) => ApiError::Unavailable(e.to_string()),
            ChainError::Rpc { .. } | ChainError::Malformed(_) => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(e.body_text())
        } else {
            ApiError::Validation(format!("invalid multipart body: {}", e.body_text()))
        }
    }
}
