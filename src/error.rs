use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the task/points core. Every variant is recoverable at
/// the caller; none aborts the process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("illegal state transition: {0}")]
    InvalidTransition(&'static str),

    #[error("this task requires evidence before it can be completed")]
    EvidenceRequired,

    #[error("not authorized to act on this user's data")]
    Unauthorized,

    #[error("insufficient balance: have {balance}, requested {requested}")]
    InsufficientBalance { balance: i64, requested: i64 },

    #[error("{scope} limit exceeded")]
    LimitExceeded { scope: &'static str },

    #[error("no points rule matches {category}/{activity} and no template fallback is available")]
    RuleNotFound { category: String, activity: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidTransition(_) | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::EvidenceRequired
            | ApiError::InsufficientBalance { .. }
            | ApiError::LimitExceeded { .. }
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::RuleNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidTransition(_) => "invalid_transition",
            ApiError::EvidenceRequired => "evidence_required",
            ApiError::Unauthorized => "unauthorized",
            ApiError::InsufficientBalance { .. } => "insufficient_balance",
            ApiError::LimitExceeded { .. } => "limit_exceeded",
            ApiError::RuleNotFound { .. } => "rule_not_found",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Database(_) | ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "success": false,
            "code": self.code(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_taxonomy() {
        assert_eq!(
            ApiError::InvalidTransition("decide from skipped").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::EvidenceRequired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::InsufficientBalance { balance: 40, requested: 100 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::RuleNotFound {
                category: "reading".into(),
                activity: "diary".into()
            }
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::NotFound("task instance").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn insufficient_balance_message_carries_amounts() {
        let err = ApiError::InsufficientBalance { balance: 40, requested: 100 };
        let msg = err.to_string();
        assert!(msg.contains("40"));
        assert!(msg.contains("100"));
        assert_eq!(err.code(), "insufficient_balance");
    }
}
