use crate::envelope::Envelope;
use crate::ledger::LedgerError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

const GENERIC_FAILURE: &str = "operation failed";
const SERVER_FAILURE: &str = "internal server error";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Shortener error: {0}")]
    Shortener(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Constraint violations are integrity failures; everything else is
/// infrastructure.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if matches!(code.as_ref(), "23505" | "23503" | "23514") {
                    return ApiError::Integrity(db_err.message().to_string());
                }
            }
        }
        ApiError::Database(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Integrity(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .min_by_key(|(field, _)| **field)
            .map(|(field, errs)| {
                let detail = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "invalid value".to_string());
                format!("{}: {}", field, detail)
            })
            .unwrap_or_else(|| "invalid request".to_string());
        ApiError::Validation(message)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Integrity(detail) => {
                tracing::warn!(error_type = self.error_type(), detail = %detail, "integrity violation");
                GENERIC_FAILURE.to_string()
            }
            ApiError::Database(_) | ApiError::Redis(_) | ApiError::Shortener(_) | ApiError::Internal(_) => {
                error!(error_type = self.error_type(), error = %self, "request failed");
                SERVER_FAILURE.to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(Envelope::fail(message))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::OK,
            ApiError::Integrity(_) => StatusCode::OK,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Redis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Shortener(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn error_type(&self) -> &str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Integrity(_) => "integrity_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::RateLimited => "rate_limit",
            ApiError::Database(_) => "database_error",
            ApiError::Redis(_) => "cache_error",
            ApiError::Shortener(_) => "shortener_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}
