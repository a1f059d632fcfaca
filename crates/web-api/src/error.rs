use application::LimiterError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn not_implemented() -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED", "not implemented")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<LimiterError> for ApiError {
    fn from(error: LimiterError) -> Self {
        match error {
            LimiterError::Transport(message) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "LIMITER_UNAVAILABLE", message)
            }
            LimiterError::InvalidResponse(message) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "LIMITER_ERROR", message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
