use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Daily capacity grid, nested under /availability-slots. Static
/// segments are registered before the `{date}` parameter so the range
/// and settings paths never shadow a date.
pub fn capacity_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/range/{from}/{to}", get(handlers::get_availability_range))
        .route("/default-capacity", get(handlers::get_default_capacity))
        .route("/default-capacity", put(handlers::rollout_default_capacity))
        .route("/{date}", get(handlers::get_day_availability))
        .route("/{date}", put(handlers::update_day_counts))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Live availability report, nested under /availability.
pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/report", get(handlers::availability_report))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Booking lifecycle, nested under /bookings.
pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_booking))
        .route("/", get(handlers::list_bookings))
        .route("/conflicts/check", post(handlers::check_conflicts))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}", put(handlers::update_booking))
        .route("/{booking_id}", delete(handlers::delete_booking))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Booking request intake and review, nested under /booking-requests.
pub fn booking_request_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::submit_booking_request))
        .route("/", get(handlers::list_booking_requests))
        .route("/{request_id}", get(handlers::get_booking_request))
        .route("/{request_id}/approve", post(handlers::approve_booking_request))
        .route("/{request_id}/reject", post(handlers::reject_booking_request))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
