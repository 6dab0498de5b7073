use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;

/// Why a license was refused. The codes are part of the public API: clients branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    LicenseNotFound,
    LicenseInactive,
    LicenseExpired,
    UsageLimitReached,
    DeviceMismatch,
    InsufficientCredits,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        (*self).into()
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::LicenseNotFound => "License not found",
            DenialReason::LicenseInactive => "License has been deactivated",
            DenialReason::LicenseExpired => "License has expired",
            DenialReason::UsageLimitReached => "License usage limit reached",
            DenialReason::DeviceMismatch => "License is bound to a different device",
            DenialReason::InsufficientCredits => "Insufficient credits",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            DenialReason::LicenseNotFound => StatusCode::NOT_FOUND,
            DenialReason::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Broad category of an [`AppError`], used by callers to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected business outcome or bad input. Never retried.
    Validation,
    /// Store unavailable, lock contention, deadline exceeded. Safe to retry after a Verify.
    Infrastructure,
    /// The store reached a state the concurrency control should have made impossible.
    Invariant,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Denied(DenialReason),

    #[error("Invalid license type: {0}")]
    InvalidLicenseType(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Deadline exceeded before commit")]
    Timeout,

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Denied(_)
            | AppError::InvalidLicenseType(_)
            | AppError::InvalidAmount(_)
            | AppError::BadRequest(_)
            | AppError::Unauthorized => ErrorKind::Validation,
            AppError::InvariantViolation(_) => ErrorKind::Invariant,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Conflict(_)
            | AppError::Timeout
            | AppError::TaskJoin(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// The denial reason, if this error is a business refusal.
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            AppError::Denied(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Denied(reason) => reason.code(),
            AppError::InvalidLicenseType(_) => "INVALID_TYPE",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvariantViolation(_) => "INTERNAL",
            _ => "INFRASTRUCTURE",
        }
    }
}

impl From<DenialReason> for AppError {
    fn from(reason: DenialReason) -> Self {
        AppError::Denied(reason)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Denied(reason) => (reason.status(), reason.message().to_string()),
            AppError::InvalidLicenseType(_)
            | AppError::InvalidAmount(_)
            | AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::InvariantViolation(msg) => {
                tracing::error!("Invariant violation surfaced to caller: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            _ => {
                tracing::warn!("Infrastructure error: {}", self);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable, please try again".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}
