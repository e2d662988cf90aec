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

use crate::models::{MarkPaidRequest, PaymentError, PaymentListQuery};
use crate::services::PaymentService;

fn map_error(e: PaymentError) -> AppError {
    match e {
        PaymentError::NotFound => AppError::NotFound("Payment not found".to_string()),
        PaymentError::InvalidTransition(_) => AppError::Conflict(e.to_string()),
        PaymentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_payments(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can view payments".to_string()));
    }

    let service = PaymentService::new(&config);
    let payments = service.list_payments(query.status).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "payments": payments,
        "total": payments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_payment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can view payments".to_string()));
    }

    let service = PaymentService::new(&config);
    let payment = service.get_payment(payment_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": payment
    })))
}

#[axum::debug_handler]
pub async fn mark_paid(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<MarkPaidRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can settle payments".to_string()));
    }

    let service = PaymentService::new(&config);
    let payment = service
        .mark_paid(payment_id, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": payment
    })))
}
