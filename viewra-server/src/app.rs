//! Router assembly: `register_all_routes` + `apply_global_layers`, mirroring
//! the teacher's `create_router_from_config` composition.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{health, routes};

pub fn build(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let router = register_all_routes();
    apply_global_layers(router, state, cors_allowed_origins)
}

fn register_all_routes() -> Router<AppState> {
    Router::new().merge(routes::router()).merge(health::router())
}

fn apply_global_layers(router: Router<AppState>, state: AppState, cors_allowed_origins: &[String]) -> Router {
    let cors = build_cors_layer(cors_allowed_origins);

    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &axum::http::Request<_>| viewra_core::telemetry::context::extract_from_http(req.headers()));

    router
        .layer(cors)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(trace)
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        tracing::warn!("CORS: no allowed origins configured; cross-origin requests will be denied");
        return CorsLayer::new();
    }

    let origins: Vec<_> = allowed_origins.iter().filter_map(|origin| origin.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
