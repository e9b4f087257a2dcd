use actix_web::{HttpResponse, error::ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::error::Error as SqlxError;
use std::error::Error as StdError;
use std::fmt;

/// Flat error taxonomy for the payment and consumption core. Kinds map
/// directly onto spec section 7; there is no nested cause chain beyond the
/// `String` detail, matching how the store/gateway layers report failures.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    UnknownReference(String),
    UnknownUser(String),
    InsufficientTokens { required: i64, current: i64 },
    GatewayUnavailable(String),
    ConflictingState(String),
    Storage(String),
    AlreadyExists(String),
    Configuration(String),
    Internal(String),
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

#[derive(Serialize, Deserialize)]
struct InsufficientTokensResponse {
    error: &'static str,
    required_tokens: i64,
    current_balance: i64,
    message: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "Validation error: {}", e),
            AppError::UnknownReference(e) => write!(f, "Unknown reference: {}", e),
            AppError::UnknownUser(e) => write!(f, "Unknown user: {}", e),
            AppError::InsufficientTokens { required, current } => write!(
                f,
                "Insufficient tokens: required {}, current balance {}",
                required, current
            ),
            AppError::GatewayUnavailable(e) => write!(f, "Gateway unavailable: {}", e),
            AppError::ConflictingState(e) => write!(f, "Conflicting state: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::AlreadyExists(e) => write!(f, "Already exists: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl StdError for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownReference(_) | AppError::UnknownUser(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientTokens { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::ConflictingState(_) => StatusCode::CONFLICT,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::InsufficientTokens { required, current } = self {
            return HttpResponse::build(self.status_code()).json(InsufficientTokensResponse {
                error: "InsufficientTokens",
                required_tokens: *required,
                current_balance: *current,
                message: self.to_string(),
            });
        }

        let kind = match self {
            AppError::Validation(_) => "ValidationError",
            AppError::UnknownReference(_) => "UnknownReference",
            AppError::UnknownUser(_) => "UnknownUser",
            AppError::InsufficientTokens { .. } => unreachable!(),
            AppError::GatewayUnavailable(_) => "GatewayUnavailable",
            AppError::ConflictingState(_) => "ConflictingStateError",
            AppError::Storage(_) => "StorageError",
            AppError::AlreadyExists(_) => "AlreadyExists",
            AppError::Configuration(_) => "ConfigurationError",
            AppError::Internal(_) => "InternalError",
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: kind.to_string(),
            detail: self.to_string(),
        })
    }
}

impl AppError {
    /// ConflictingStateError should be impossible under the orchestrator's
    /// own logic; surface that distinction for logging call sites.
    pub fn is_defect(&self) -> bool {
        matches!(self, AppError::ConflictingState(_))
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::UnknownReference("record not found".to_string()),
            _ => AppError::Storage(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::GatewayUnavailable(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization error: {}", error))
    }
}

impl From<bigdecimal::ParseBigDecimalError> for AppError {
    fn from(error: bigdecimal::ParseBigDecimalError) -> Self {
        AppError::Validation(format!("invalid decimal value: {}", error))
    }
}

pub type AppResult<T> = Result<T, AppError>;
