use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("billing policy skipped this period: {0}")]
    PolicySkip(String),
    #[error("account is on credit hold")]
    CreditHold,
    #[error("no active contracts found for billing period")]
    NoContracts,
    #[error("no billable items found for billing period")]
    NoBillableItems,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Stable machine-readable kind, carried in the JSON error body and in
    /// failed job rows so callers can branch without parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Db(_) => "database_error",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::PolicySkip(_) => "policy_skip",
            AppError::CreditHold => "credit_hold",
            AppError::NoContracts => "no_contracts",
            AppError::NoBillableItems => "no_billable_items",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // Unique-constraint violations (duplicate invoice number, duplicate
        // share) are retryable conflicts, not opaque database failures.
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Conflict(db_err.message().to_string());
            }
        }
        AppError::Db(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_)
            | AppError::PolicySkip(_)
            | AppError::NoContracts
            | AppError::NoBillableItems => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::CreditHold => StatusCode::PAYMENT_REQUIRED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(?self);
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
