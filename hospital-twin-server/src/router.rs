//! Router construction — the same public/protected-merge shape
//! `sem_os_server::router::build_router` uses, minus the JWT layer (no
//! authentication surface in this service).

use axum::routing::{delete, get, post, put};
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api = Router::new()
        .route("/units", get(handlers::units::list_units))
        .route("/units/:id", get(handlers::units::get_unit))
        .route("/units/:id/beds", get(handlers::units::get_unit_beds))
        .route("/nurses", get(handlers::nurses::list_nurses))
        .route("/patients", get(handlers::patients::list_patients))
        .route("/patients/:id", get(handlers::patients::get_patient))
        .route("/patients/:id/trace", get(handlers::patients::get_patient_trace))
        .route("/events", get(handlers::events::list_events))
        .route("/metrics/kpi", get(handlers::metrics::kpi))
        .route(
            "/scenarios",
            get(handlers::scenarios::list_scenarios).post(handlers::scenarios::create_scenario),
        )
        .route(
            "/scenarios/:id",
            get(handlers::scenarios::get_scenario)
                .put(handlers::scenarios::update_scenario)
                .delete(handlers::scenarios::delete_scenario),
        )
        .route("/scenarios/:id/runs", get(handlers::scenarios::list_scenario_runs))
        .route("/scenarios/:id/results", get(handlers::scenarios::scenario_results))
        .route("/simulation/run", post(handlers::simulation::start_run))
        .route("/simulation/:job_id/status", get(handlers::simulation::run_status))
        .route("/simulation/:job_id", delete(handlers::simulation::cancel_run))
        .route("/demo/load", post(handlers::demo::load))
        .route("/demo/status", get(handlers::demo::status))
        .route("/demo/clear", delete(handlers::demo::clear))
        .route("/ws/replay", get(ws::replay::replay_ws))
        .route("/simulation/ws/:job_id", get(ws::simulation::simulation_status_ws));

    let public = Router::new().route("/health", get(handlers::health::health));

    Router::new()
        .nest("/api", api)
        .merge(public)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
