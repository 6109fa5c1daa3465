//! # API Error Type
//!
//! Every handler returns `Result<_, ApiError>`. Library errors convert with
//! `?` and leave the server as a JSON body with a matching status.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError ─┐                                                     │
//! │  CoreError ───────┤                                                     │
//! │  DbError ─────────┼──► ApiError { code, message } ──► (status, JSON)    │
//! │  ZohoError ───────┘                                                     │
//! │                                                                         │
//! │  { "code": "NOT_FOUND", "message": "Product not found: 7f3c..." }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;
use tradeflow_core::{CoreError, ValidationError};
use tradeflow_db::DbError;
use tradeflow_zoho::ZohoError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 404
    NotFound,

    /// 400
    ValidationError,

    /// 401
    Unauthorized,

    /// 403
    Forbidden,

    /// 409
    Conflict,

    /// 422
    BusinessLogic,

    /// 422
    InsufficientStock,

    /// 502
    ZohoError,

    /// 500
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::BusinessLogic | ErrorCode::InsufficientStock => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::ZohoError => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if status.is_server_error() {
            error!(code = ?self.code, message = %self.message, "Request failed");
        }
        (status, Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ProductNotFound(_) => ErrorCode::NotFound,
            CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::BelowMinimumQuantity { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::ProductUnavailable { .. }
            | CoreError::EmptyCart
            | CoreError::BranchRequired
            | CoreError::InvalidStatusTransition { .. }
            | CoreError::QuotationExpired(_) => ErrorCode::BusinessLogic,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
            DbError::UniqueViolation { .. } | DbError::Conflict { .. } => {
                ApiError::new(ErrorCode::Conflict, err.to_string())
            }
            DbError::ForeignKeyViolation { .. } => ApiError::validation(err.to_string()),
            DbError::Rule(core) => ApiError::from(core),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<ZohoError> for ApiError {
    fn from(err: ZohoError) -> Self {
        match err {
            ZohoError::Db(db) => ApiError::from(db),
            ZohoError::Core(core) => ApiError::from(core),
            ZohoError::NotConnected(_) | ZohoError::MissingField("zoho_organization_id") => {
                ApiError::new(ErrorCode::BusinessLogic, err.to_string())
            }
            other => ApiError::new(ErrorCode::ZohoError, other.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ApiError::unauthorized(format!("Invalid token: {}", err))
    }
}
