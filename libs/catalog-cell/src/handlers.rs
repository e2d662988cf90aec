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
    CatalogError, CreateCouponRequest, CreatePackageRequest, CreateTherapyRequest,
    UpdateCouponRequest, UpdatePackageRequest, UpdateTherapyRequest,
};
use crate::services::{CouponService, PackageService, TherapyService};

fn map_error(e: CatalogError) -> AppError {
    match e {
        CatalogError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
        CatalogError::TherapyExists(name) => {
            AppError::Conflict(format!("Therapy type {} already exists", name))
        }
        CatalogError::CouponExists(code) => {
            AppError::Conflict(format!("Coupon code {} already exists", code))
        }
        CatalogError::ValidationError(msg) => AppError::ValidationError(msg),
        CatalogError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[derive(Debug, Deserialize)]
pub struct TherapyListQuery {
    pub active: Option<bool>,
}

// ==============================================================================
// THERAPY TYPES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_therapy(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTherapyRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage therapy types".to_string(),
        ));
    }

    let service = TherapyService::new(&config);
    let therapy = service.create_therapy(request).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapy": therapy
    })))
}

#[axum::debug_handler]
pub async fn list_therapies(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<TherapyListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = TherapyService::new(&config);
    let therapies = service
        .list_therapies(query.active.unwrap_or(false))
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapies": therapies,
        "total": therapies.len()
    })))
}

#[axum::debug_handler]
pub async fn update_therapy(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(therapy_id): Path<Uuid>,
    Json(request): Json<UpdateTherapyRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage therapy types".to_string(),
        ));
    }

    let service = TherapyService::new(&config);
    let therapy = service
        .update_therapy(therapy_id, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapy": therapy
    })))
}

#[axum::debug_handler]
pub async fn delete_therapy(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(therapy_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage therapy types".to_string(),
        ));
    }

    let service = TherapyService::new(&config);
    service.delete_therapy(therapy_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Therapy type deleted"
    })))
}

// ==============================================================================
// PACKAGES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_package(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePackageRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage packages".to_string(),
        ));
    }

    let service = PackageService::new(&config);
    let package = service.create_package(request).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "package": package
    })))
}

#[axum::debug_handler]
pub async fn list_packages(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = PackageService::new(&config);
    let packages = service.list_packages().await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "packages": packages,
        "total": packages.len()
    })))
}

#[axum::debug_handler]
pub async fn get_package(
    State(config): State<Arc<AppConfig>>,
    Path(package_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PackageService::new(&config);
    let package = service.get_package(package_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "package": package
    })))
}

#[axum::debug_handler]
pub async fn update_package(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(package_id): Path<Uuid>,
    Json(request): Json<UpdatePackageRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage packages".to_string(),
        ));
    }

    let service = PackageService::new(&config);
    let package = service
        .update_package(package_id, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "package": package
    })))
}

#[axum::debug_handler]
pub async fn delete_package(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(package_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage packages".to_string(),
        ));
    }

    let service = PackageService::new(&config);
    service.delete_package(package_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Package deleted"
    })))
}

// ==============================================================================
// DISCOUNT COUPONS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_coupon(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateCouponRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage coupons".to_string(),
        ));
    }

    let service = CouponService::new(&config);
    let coupon = service.create_coupon(request).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "coupon": coupon
    })))
}

#[axum::debug_handler]
pub async fn list_coupons(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can view coupons".to_string(),
        ));
    }

    let service = CouponService::new(&config);
    let coupons = service.list_coupons().await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "coupons": coupons,
        "total": coupons.len()
    })))
}

#[axum::debug_handler]
pub async fn update_coupon(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(coupon_id): Path<Uuid>,
    Json(request): Json<UpdateCouponRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage coupons".to_string(),
        ));
    }

    let service = CouponService::new(&config);
    let coupon = service
        .update_coupon(coupon_id, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "coupon": coupon
    })))
}

#[axum::debug_handler]
pub async fn delete_coupon(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(coupon_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only admins can manage coupons".to_string(),
        ));
    }

    let service = CouponService::new(&config);
    service.delete_coupon(coupon_id).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Coupon deleted"
    })))
}
