use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AccountStatus, CreateTherapistRequest, SetHolidaysRequest, TherapistError,
    UpdateTherapistRequest,
};
use crate::services::TherapistService;

#[derive(Debug, Deserialize)]
pub struct TherapistListQuery {
    pub status: Option<AccountStatus>,
}

fn map_error(e: TherapistError) -> AppError {
    match e {
        TherapistError::NotFound => AppError::NotFound("Therapist not found".to_string()),
        TherapistError::EmailExists(email) => {
            AppError::Conflict(format!("Therapist with email {} already exists", email))
        }
        TherapistError::ValidationError(msg) => AppError::ValidationError(msg),
        TherapistError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_therapist(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTherapistRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can create therapists".to_string(),
        ));
    }

    let service = TherapistService::new(&state);
    let therapist = service
        .create_therapist(request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist": therapist
    })))
}

#[axum::debug_handler]
pub async fn list_therapists(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<TherapistListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = TherapistService::new(&state);
    let therapists = service
        .list_therapists(query.status)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapists": therapists,
        "total": therapists.len()
    })))
}

#[axum::debug_handler]
pub async fn list_active_therapists(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = TherapistService::new(&state);
    let directory = service
        .list_active_directory()
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapists": directory,
        "total": directory.len()
    })))
}

#[axum::debug_handler]
pub async fn get_therapist(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = TherapistService::new(&state);
    let therapist = service.get_therapist(therapist_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist": therapist
    })))
}

#[axum::debug_handler]
pub async fn update_therapist(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(therapist_id): Path<Uuid>,
    Json(request): Json<UpdateTherapistRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can update therapists".to_string(),
        ));
    }

    let service = TherapistService::new(&state);
    let therapist = service
        .update_therapist(therapist_id, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist": therapist
    })))
}

#[axum::debug_handler]
pub async fn set_holidays(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(therapist_id): Path<Uuid>,
    Json(request): Json<SetHolidaysRequest>,
) -> Result<Json<Value>, AppError> {
    // Therapists can manage their own holidays; admins can manage anyone's.
    let is_self = user.id == therapist_id.to_string();
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to set holidays for this therapist".to_string(),
        ));
    }

    let service = TherapistService::new(&state);
    let therapist = service
        .set_holidays(therapist_id, request.holidays)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist": therapist
    })))
}

#[axum::debug_handler]
pub async fn delete_therapist(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(therapist_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can delete therapists".to_string(),
        ));
    }

    let service = TherapistService::new(&state);
    service.delete_therapist(therapist_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Therapist deleted"
    })))
}
