use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn lead_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_lead))
        .route("/", get(handlers::list_leads))
        .route("/{lead_id}", get(handlers::get_lead))
        .route("/{lead_id}", put(handlers::update_lead))
        .route("/{lead_id}", delete(handlers::delete_lead))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
