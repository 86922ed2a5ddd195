//! Administrative endpoints for inspecting and resetting resilience state.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/dependencies", get(get_dependencies))
        .route("/admin/dependencies/{name}/reset", post(reset_dependency))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
