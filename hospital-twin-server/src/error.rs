//! Maps `hospital_twin_core::error::SimError` onto HTTP responses, mirroring
//! `sem_os_server::error::AppError` in the teacher: a thin newtype wrapper
//! with a single `IntoResponse` impl.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use hospital_twin_core::error::SimError;
use serde_json::json;

pub struct AppError(pub SimError);

impl From<SimError> for AppError {
    fn from(e: SimError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self(SimError::Internal(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "detail": self.0.to_string(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
