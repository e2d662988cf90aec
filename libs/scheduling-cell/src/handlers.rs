use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    ApproveRequestBody, AvailabilityQuery, BookingListQuery, BookingPayload,
    ConflictCheckRequest, DefaultCapacityRequest, RequestListQuery, SchedulingError,
    SetDayCountsRequest, SubmitBookingRequestBody,
};
use crate::services::{
    AvailabilityService, BookingRequestService, BookingService, CapacityService,
};

fn map_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::MissingFields(_) | SchedulingError::InvalidDate(_) => {
            AppError::ValidationError(e.to_string())
        }
        SchedulingError::InvalidPackage | SchedulingError::InvalidTherapist => {
            AppError::BadRequest(e.to_string())
        }
        SchedulingError::SlotConflict(conflicts) => AppError::SlotConflict(conflicts),
        SchedulingError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
        SchedulingError::AlreadyApproved | SchedulingError::AlreadyRejected => {
            AppError::Conflict(e.to_string())
        }
        SchedulingError::InvalidOperation(_) => AppError::BadRequest(e.to_string()),
        SchedulingError::DependencyFailure(_) => AppError::ExternalService(e.to_string()),
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// DAILY CAPACITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_day_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Path(date): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = CapacityService::new(&config);
    let day = service.get_day(&date).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "day": day
    })))
}

#[axum::debug_handler]
pub async fn update_day_counts(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(date): Path<String>,
    Json(request): Json<SetDayCountsRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can update slot capacity".to_string(),
        ));
    }

    let service = CapacityService::new(&config);
    let day = service
        .set_day_counts(&date, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Daily slot counts updated",
        "day": day
    })))
}

#[axum::debug_handler]
pub async fn get_availability_range(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let service = CapacityService::new(&config);
    let days = service.get_range(&from, &to).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "days": days,
        "total": days.len()
    })))
}

#[axum::debug_handler]
pub async fn get_default_capacity(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can view capacity settings".to_string(),
        ));
    }

    let service = CapacityService::new(&config);
    let default_capacity = service.get_default_capacity().await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "defaultCapacity": default_capacity
    })))
}

#[axum::debug_handler]
pub async fn rollout_default_capacity(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<DefaultCapacityRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can set default capacity".to_string(),
        ));
    }

    let service = CapacityService::new(&config);
    let summary = service
        .rollout_default_capacity(request.default_capacity)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Default capacity applied to the next 14 days (Sundays unchanged)",
        "defaultCapacity": summary.default_capacity,
        "daysWritten": summary.days_written
    })))
}

// ==============================================================================
// AVAILABILITY REPORT HANDLER
// ==============================================================================

#[axum::debug_handler]
pub async fn availability_report(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let (Some(from), Some(to)) = (query.from.as_deref(), query.to.as_deref()) else {
        return Err(AppError::ValidationError(
            "from and to query parameters are required".to_string(),
        ));
    };

    let service = AvailabilityService::new(&config);
    let report = service
        .report(from, to, query.therapist_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(payload): Json<BookingPayload>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can create bookings".to_string(),
        ));
    }

    let service = BookingService::new(&config);
    let booking = service.create_booking(payload).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}

#[axum::debug_handler]
pub async fn list_bookings(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);
    let bookings = service.list_bookings(query).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);
    let booking = service.get_booking(booking_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}

#[axum::debug_handler]
pub async fn update_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<BookingPayload>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can update bookings".to_string(),
        ));
    }

    let service = BookingService::new(&config);
    let booking = service
        .update_booking(booking_id, payload)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}

#[axum::debug_handler]
pub async fn delete_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can delete bookings".to_string(),
        ));
    }

    let service = BookingService::new(&config);
    service.delete_booking(booking_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking deleted"
    })))
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Json(request): Json<ConflictCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);
    let conflicts = service.check_conflicts(request).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "clear": conflicts.is_empty(),
        "conflicts": conflicts
    })))
}

// ==============================================================================
// BOOKING REQUEST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_booking_request(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Json(body): Json<SubmitBookingRequestBody>,
) -> Result<Json<Value>, AppError> {
    let service = BookingRequestService::new(&config);
    let request = service.submit(body).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "request": request
    })))
}

#[axum::debug_handler]
pub async fn list_booking_requests(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can view booking requests".to_string(),
        ));
    }

    let service = BookingRequestService::new(&config);
    let requests = service.list_requests(query.status).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "requests": requests,
        "total": requests.len()
    })))
}

#[axum::debug_handler]
pub async fn get_booking_request(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingRequestService::new(&config);
    let request = service.get_request(request_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "request": request
    })))
}

#[axum::debug_handler]
pub async fn approve_booking_request(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<ApproveRequestBody>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can review booking requests".to_string(),
        ));
    }

    let service = BookingRequestService::new(&config);
    let request = service
        .approve(request_id, body)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking request approved",
        "request": request
    })))
}

#[axum::debug_handler]
pub async fn reject_booking_request(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can review booking requests".to_string(),
        ));
    }

    let service = BookingRequestService::new(&config);
    let request = service.reject(request_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking request rejected",
        "request": request
    })))
}
