use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn therapist_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_therapist))
        .route("/", get(handlers::list_therapists))
        .route("/active", get(handlers::list_active_therapists))
        .route("/{therapist_id}", get(handlers::get_therapist))
        .route("/{therapist_id}", put(handlers::update_therapist))
        .route("/{therapist_id}", delete(handlers::delete_therapist))
        .route("/{therapist_id}/holidays", put(handlers::set_holidays))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
