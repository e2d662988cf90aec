use std::sync::Arc;

use axum::{routing::get, Router};

use catalog_cell::router::catalog_routes;
use leads_cell::router::lead_routes;
use patient_cell::router::patient_routes;
use payment_cell::router::payment_routes;
use scheduling_cell::router::{
    availability_routes, booking_request_routes, booking_routes, capacity_routes,
};
use shared_config::AppConfig;
use therapist_cell::router::therapist_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic Ops API is running!" }))
        .nest("/availability-slots", capacity_routes(state.clone()))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/bookings", booking_routes(state.clone()))
        .nest("/booking-requests", booking_request_routes(state.clone()))
        .nest("/therapists", therapist_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/catalog", catalog_routes(state.clone()))
        .nest("/leads", lead_routes(state.clone()))
        .nest("/payments", payment_routes(state))
}
