//! API error handling
//!
//! Every failure leaves as `{code, class, message}` JSON with the status of
//! its error class.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use botbrawl_types::{BrawlError, ErrorClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Any engine error
    #[error(transparent)]
    Brawl(#[from] BrawlError),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("Missing or malformed Authorization header")]
    MissingToken,

    #[error("Admin token required")]
    AdminRequired,
}

impl ApiError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Brawl(err) => err.class(),
            Self::InvalidParameter { .. } | Self::InvalidRequestBody(_) => ErrorClass::Validation,
            Self::MissingToken | Self::AdminRequired => ErrorClass::Auth,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Brawl(err) => err.status_code(),
            Self::InvalidParameter { .. } | Self::InvalidRequestBody(_) => 400,
            Self::MissingToken => 401,
            Self::AdminRequired => 403,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Brawl(err) => err.error_code(),
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::InvalidRequestBody(_) => "INVALID_REQUEST_BODY",
            Self::MissingToken => "UNAUTHENTICATED",
            Self::AdminRequired => "FORBIDDEN",
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub class: ErrorClass,
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        // Internal details stay in the logs
        let message = match err {
            ApiError::Brawl(BrawlError::Internal { .. }) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self {
            code: err.error_code().to_string(),
            class: err.class(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();
        if let ApiError::Brawl(BrawlError::RateLimitExceeded { retry_after_secs }) = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
