//! `POST /demo/load`, `GET /demo/status`, `DELETE /demo/clear` (spec.md §1,
//! §6). Demo/synthetic data seeding is explicitly out of scope for this
//! service — an external collaborator owns it — so these three routes exist
//! only to give that collaborator a stable, self-describing 501 rather than
//! a 404 it has to special-case.

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

const NOT_IMPLEMENTED_BODY: &str =
    "demo data seeding is owned by an external collaborator, not this service";

pub async fn load() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({ "detail": NOT_IMPLEMENTED_BODY })),
    )
}

pub async fn status() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({ "detail": NOT_IMPLEMENTED_BODY })),
    )
}

pub async fn clear() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({ "detail": NOT_IMPLEMENTED_BODY })),
    )
}
