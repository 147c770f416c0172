//! The one place store errors become HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gantry_core::GantryError;
use tracing::error;

pub struct ApiError(pub GantryError);

impl From<GantryError> for ApiError {
    fn from(e: GantryError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "request failed");
        }
        (status, Json(self.0.to_body())).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
