use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient};

use crate::models::{CatalogError, Coupon, CreateCouponRequest, UpdateCouponRequest};
use crate::services::therapies::parse_row;

pub struct CouponService {
    db: Arc<PostgrestClient>,
}

impl CouponService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub async fn create_coupon(
        &self,
        request: CreateCouponRequest,
    ) -> Result<Coupon, CatalogError> {
        if request.coupon_code.trim().is_empty() {
            return Err(CatalogError::ValidationError(
                "couponCode is required".to_string(),
            ));
        }
        if !(0..=100).contains(&request.discount) {
            return Err(CatalogError::ValidationError(
                "discount must be between 0 and 100".to_string(),
            ));
        }
        if request.validity_days < 0 {
            return Err(CatalogError::ValidationError(
                "validityDays must not be negative".to_string(),
            ));
        }

        let existing: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/coupons?couponCode=eq.{}&select=id",
                    request.coupon_code
                ),
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(CatalogError::CouponExists(request.coupon_code));
        }

        let data = json!({
            "couponCode": request.coupon_code,
            "discount": request.discount,
            "validityDays": request.validity_days,
            "discountEnabled": request.discount_enabled.unwrap_or(true),
            "isActive": true,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/coupons",
                None,
                Some(data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        let coupon: Coupon = parse_row(result, "coupon insert")?;
        info!("Created coupon {}", coupon.coupon_code);
        Ok(coupon)
    }

    pub async fn list_coupons(&self) -> Result<Vec<Coupon>, CatalogError> {
        let result: Vec<Coupon> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/coupons?order=createdAt.desc",
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;
        Ok(result)
    }

    /// Best-effort lookup by code. A missing coupon is not an error; the
    /// booking pipeline stores the discount figures it was given either way.
    pub async fn resolve_coupon(&self, code: &str) -> Result<Option<Coupon>, CatalogError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/coupons?couponCode=eq.{}", code),
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        match rows.first() {
            Some(row) => {
                let coupon: Coupon = serde_json::from_value(row.clone())
                    .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;
                debug!("Resolved coupon {}", code);
                Ok(Some(coupon))
            }
            None => {
                debug!("Coupon {} not found, continuing without it", code);
                Ok(None)
            }
        }
    }

    pub async fn update_coupon(
        &self,
        id: Uuid,
        request: UpdateCouponRequest,
    ) -> Result<Coupon, CatalogError> {
        let mut update = serde_json::Map::new();
        if let Some(discount) = request.discount {
            if !(0..=100).contains(&discount) {
                return Err(CatalogError::ValidationError(
                    "discount must be between 0 and 100".to_string(),
                ));
            }
            update.insert("discount".to_string(), json!(discount));
        }
        if let Some(days) = request.validity_days {
            update.insert("validityDays".to_string(), json!(days));
        }
        if let Some(enabled) = request.discount_enabled {
            update.insert("discountEnabled".to_string(), json!(enabled));
        }
        if let Some(is_active) = request.is_active {
            update.insert("isActive".to_string(), json!(is_active));
        }

        if update.is_empty() {
            return Err(CatalogError::ValidationError(
                "no fields to update".to_string(),
            ));
        }

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/coupons?id=eq.{}", id),
                None,
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(CatalogError::NotFound("Coupon"));
        }
        parse_row(result, "coupon update")
    }

    pub async fn delete_coupon(&self, id: Uuid) -> Result<(), CatalogError> {
        let _: Vec<Value> = self
            .db
            .request(
                Method::DELETE,
                &format!("/rest/v1/coupons?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
