use actix_web::{HttpResponse, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the approval/ledger engine.
///
/// Every public operation returns one of these; nothing is swallowed.
/// The HTTP mapping lives in the `ResponseError` impl below so handlers
/// can simply `?` engine calls.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Concurrent transition collision on the same document or ledger key.
    /// Callers should re-fetch and retry once.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying store unavailable or failed mid-operation. Retryable.
    #[error("storage failure: {0}")]
    Storage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        EngineError::Forbidden(msg.into())
    }

    /// Maps a sqlx driver error onto the taxonomy. MySQL lock-wait timeouts
    /// (1205) and deadlocks (1213) are transition collisions, not outages.
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if matches!(db_err.code().as_deref(), Some("1205") | Some("1213")) {
                return EngineError::Conflict(format!("lock contention: {}", db_err));
            }
        }
        EngineError::Storage(e.to_string())
    }
}

impl actix_web::ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_)
            | EngineError::InvalidTransition(_)
            | EngineError::InsufficientBalance(_) => StatusCode::BAD_REQUEST,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn invalid_transition_maps_to_bad_request() {
        let e = EngineError::InvalidTransition("already approved".into());
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert!(e.to_string().contains("already approved"));
    }

    #[test]
    fn conflict_maps_to_409() {
        let e = EngineError::Conflict("document 7 is being decided".into());
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_is_surfaced_as_transient() {
        let e = EngineError::Storage("pool timed out".into());
        assert_eq!(e.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
