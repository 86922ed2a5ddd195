use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::registry::DependencySnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub service: String,
    pub dependency: String,
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let policy = state.policy.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        service: state.service.name.clone(),
        dependency: state.dependency.name.clone(),
        max_attempts: policy.retry.max_attempts,
        attempt_timeout_ms: policy.attempt_timeout.as_millis() as u64,
    })
}

pub async fn get_dependencies(State(state): State<AppState>) -> Json<Vec<DependencySnapshot>> {
    Json(state.registry.snapshots())
}

pub async fn reset_dependency(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> StatusCode {
    if state.registry.reset(&name) {
        tracing::info!(dependency = %name, "Circuit breaker reset via admin API");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
