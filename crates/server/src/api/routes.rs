use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, events, handlers, jobs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Event webhooks and queries sit behind the configured authenticator
    let protected = Router::new()
        // Events
        .route("/events/storage", post(events::storage_event))
        .route("/events/build", post(events::build_completed))
        .route("/events/training", post(events::training_status))
        // Job records
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{job_name}", get(jobs::get_job))
        // Audit
        .route("/audit", get(audit::query_audit))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
