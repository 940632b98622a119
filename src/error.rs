use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::redeem::RedeemError;
use crate::store::StoreError;

/// Errors of the plain JSON endpoints. LNURL endpoints answer with a status envelope instead.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Gone(String),
    Internal(String),
    Store(StoreError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "{msg}"),
            Self::Gone(msg) => write!(f, "{msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Gone(_) => (StatusCode::GONE, self.to_string()),
            Self::Internal(_) | Self::Store(_) => {
                tracing::error!("{self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), "{message}");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RedeemError> for AppError {
    fn from(e: RedeemError) -> Self {
        match e {
            RedeemError::InvalidInvite => Self::NotFound(e.to_string()),
            RedeemError::AlreadyUsed => Self::Gone(e.to_string()),
            RedeemError::Store(e) => Self::Store(e),
            other => Self::Internal(other.to_string()),
        }
    }
}
