/// Error types for community-service
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::domain::RejectedVote;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Video forum ({0}) closed")]
    Closed(uuid::Uuid),

    #[error("Invalid vote: {0}")]
    InvalidVoteTransition(#[from] RejectedVote),

    #[error("Storage failure: {0}")]
    TransientStorage(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Storage faults abort the transaction and may be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::TransientStorage(_))
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::Closed(_) => "FORUM_CLOSED",
            ServiceError::InvalidVoteTransition(_) => "INVALID_VOTE_TRANSITION",
            ServiceError::TransientStorage(_) => "TRANSIENT_STORAGE_FAILURE",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Closed(_) => StatusCode::CONFLICT,
            ServiceError::InvalidVoteTransition(_) | ServiceError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::TransientStorage(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Storage details stay in the logs
        let message = match self {
            ServiceError::TransientStorage(_) => "Temporary storage failure, retry later".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(serde_json::json!({
            "status": false,
            "code": self.code(),
            "error": message,
            "retryable": self.is_retryable(),
        }))
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
