//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "code": self.status.as_u16()
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<cantus_core::Error> for ApiError {
    fn from(err: cantus_core::Error) -> Self {
        use cantus_core::Error;

        warn!("Request failed: {}", err);
        match &err {
            Error::InvalidInput(_) => ApiError::bad_request(err.to_string()),
            Error::CapabilityUnavailable(_) => ApiError::unavailable(err.to_string()),
            Error::EncodingError(_) => {
                ApiError::unprocessable(format!("Bad model output: {}", err))
            }
            Error::FilesystemError(_) => {
                ApiError::internal(format!("Could not write audio file: {}", err))
            }
            _ => ApiError::internal(err.to_string()),
        }
    }
}
