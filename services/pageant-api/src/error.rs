use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pageant_core::{AccountError, StoreError};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::media::MediaError;

/// Every failure a handler can return. The only place the error body is built.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_authorized() -> Self {
        ApiError::Unauthorized("Not authorized to access this route".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "success": false,
                "message": message,
                "statusCode": status.as_u16(),
            })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ContestantNotFound => ApiError::NotFound(error.to_string()),
            StoreError::AccountNotFound(_) => ApiError::NotFound("User not found".to_string()),
            StoreError::DuplicateVote => ApiError::Validation(error.to_string()),
            StoreError::DuplicateEmail(_) => {
                ApiError::Conflict("Email already registered".to_string())
            }
            StoreError::DuplicatePaymentId(_) => {
                ApiError::Conflict("Payment id already in use".to_string())
            }
            StoreError::Account(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(error: AccountError) -> Self {
        match error {
            AccountError::PhotoNotFound(_) => ApiError::NotFound("Photo not found".to_string()),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::NotAnImage | MediaError::TooLarge { .. } => {
                ApiError::Validation(error.to_string())
            }
            MediaError::Storage(_) => ApiError::Internal(error.to_string()),
        }
    }
}

/// Success envelope: `{success: true, data, message?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
