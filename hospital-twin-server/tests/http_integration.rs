//! HTTP-level integration tests for the hospital twin server, built against
//! the in-memory store so they run without a database. Modeled on the
//! `tower::ServiceExt::oneshot` pattern the sem_os_server HTTP integration
//! tests use.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hospital_twin_core::config::Config;
use hospital_twin_core::store::SimulationStore;
use hospital_twin_core::store_memory::MemoryStore;
use hospital_twin_core::types::{Acuity, NurseShiftCounts, ScenarioParameters};
use hospital_twin_server::router::build_router;
use hospital_twin_server::state::AppState;
use hyper::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

fn build_test_app() -> axum::Router {
    let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(store, Config::default());
    build_router(state)
}

fn baseline_parameters() -> ScenarioParameters {
    let mut acuity_mix = BTreeMap::new();
    acuity_mix.insert(Acuity::Low, 0.4);
    acuity_mix.insert(Acuity::Medium, 0.35);
    acuity_mix.insert(Acuity::High, 0.2);
    acuity_mix.insert(Acuity::Critical, 0.05);

    ScenarioParameters {
        arrival_multiplier: 1.0,
        acuity_mix,
        beds_available: 20,
        nurse_count: NurseShiftCounts {
            day: 5,
            evening: 4,
            night: 3,
        },
        imaging_capacity: 1.0,
        transport_capacity: 1.0,
        seed: Some(7),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn scenario_lifecycle_create_get_delete() {
    let app = build_test_app();

    let create_body = json!({
        "name": "baseline",
        "parameters": baseline_parameters(),
        "is_baseline": false,
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/scenarios")
                .header("content-type", "application/json")
                .body(Body::from(create_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let scenario_id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/scenarios/{scenario_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["name"], "baseline");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/scenarios/{scenario_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/scenarios/{scenario_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn baseline_scenario_cannot_be_deleted_over_http() {
    let app = build_test_app();

    let create_body = json!({
        "name": "baseline",
        "parameters": baseline_parameters(),
        "is_baseline": true,
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/scenarios")
                .header("content-type", "application/json")
                .body(Body::from(create_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(response).await;
    let scenario_id = created["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/scenarios/{scenario_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn simulation_run_reaches_a_terminal_status() {
    let app = build_test_app();

    let create_body = json!({
        "name": "baseline",
        "parameters": baseline_parameters(),
        "is_baseline": false,
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/scenarios")
                .header("content-type", "application/json")
                .body(Body::from(create_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(response).await;
    let scenario_id = created["id"].as_str().unwrap().to_string();
    let unit_id = uuid::Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/simulation/run?scenario_id={scenario_id}&unit_id={unit_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let started = body_json(response).await;
    let run_id = started["run_id"].as_str().unwrap().to_string();

    let mut status = String::new();
    for _ in 0..50 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/simulation/{run_id}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        status = body["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(status, "completed");
}
