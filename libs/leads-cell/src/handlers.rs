use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateLeadRequest, LeadError, UpdateLeadRequest};
use crate::services::LeadService;

fn map_error(e: LeadError) -> AppError {
    match e {
        LeadError::NotFound => AppError::NotFound("Lead not found".to_string()),
        LeadError::ValidationError(msg) => AppError::ValidationError(msg),
        LeadError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_lead(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateLeadRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can manage leads".to_string()));
    }

    let service = LeadService::new(&config);
    let lead = service.create_lead(request).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "lead": lead
    })))
}

#[axum::debug_handler]
pub async fn list_leads(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can manage leads".to_string()));
    }

    let service = LeadService::new(&config);
    let leads = service.list_leads().await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "leads": leads,
        "total": leads.len()
    })))
}

#[axum::debug_handler]
pub async fn get_lead(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can manage leads".to_string()));
    }

    let service = LeadService::new(&config);
    let lead = service.get_lead(lead_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "lead": lead
    })))
}

#[axum::debug_handler]
pub async fn update_lead(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(lead_id): Path<Uuid>,
    Json(request): Json<UpdateLeadRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can manage leads".to_string()));
    }

    let service = LeadService::new(&config);
    let lead = service
        .update_lead(lead_id, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "lead": lead
    })))
}

#[axum::debug_handler]
pub async fn delete_lead(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can manage leads".to_string()));
    }

    let service = LeadService::new(&config);
    service.delete_lead(lead_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Lead deleted"
    })))
}
