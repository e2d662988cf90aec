use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn catalog_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/therapies", post(handlers::create_therapy))
        .route("/therapies", get(handlers::list_therapies))
        .route("/therapies/{therapy_id}", put(handlers::update_therapy))
        .route("/therapies/{therapy_id}", delete(handlers::delete_therapy))
        .route("/packages", post(handlers::create_package))
        .route("/packages", get(handlers::list_packages))
        .route("/packages/{package_id}", get(handlers::get_package))
        .route("/packages/{package_id}", put(handlers::update_package))
        .route("/packages/{package_id}", delete(handlers::delete_package))
        .route("/coupons", post(handlers::create_coupon))
        .route("/coupons", get(handlers::list_coupons))
        .route("/coupons/{coupon_id}", put(handlers::update_coupon))
        .route("/coupons/{coupon_id}", delete(handlers::delete_coupon))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
