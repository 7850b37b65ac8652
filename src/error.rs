//! HTTP error responses
//!
//! Every user-facing failure is rendered as `{"error": "<message>"}` with a
//! matching status code. Internal details stay in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::resolver::ResolverError;

/// An error response returned by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl ApiError {
    pub const CITY_REQUIRED: ApiError = ApiError {
        status: StatusCode::BAD_REQUEST,
        message: "City parameter is required",
    };

    pub const FETCH_FAILED: ApiError = ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Failed to fetch weather data",
    };

    pub const RATE_LIMITED: ApiError = ApiError {
        status: StatusCode::TOO_MANY_REQUESTS,
        message: "Rate limit exceeded",
    };
}

impl From<ResolverError> for ApiError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::InvalidInput => ApiError::CITY_REQUIRED,
            ResolverError::Origin(_) => ApiError::FETCH_FAILED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
