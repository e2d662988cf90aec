use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient};

use crate::models::{CatalogError, CreatePackageRequest, Package, UpdatePackageRequest};
use crate::services::therapies::parse_row;

pub struct PackageService {
    db: Arc<PostgrestClient>,
}

impl PackageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub async fn create_package(
        &self,
        request: CreatePackageRequest,
    ) -> Result<Package, CatalogError> {
        if request.name.trim().is_empty() {
            return Err(CatalogError::ValidationError(
                "name is required".to_string(),
            ));
        }
        if request.session_count <= 0 {
            return Err(CatalogError::ValidationError(
                "sessionCount must be positive".to_string(),
            ));
        }
        if request.cost_per_session < 0 || request.total_cost < 0 {
            return Err(CatalogError::ValidationError(
                "costs must not be negative".to_string(),
            ));
        }

        let data = json!({
            "name": request.name,
            "sessionCount": request.session_count,
            "costPerSession": request.cost_per_session,
            "totalCost": request.total_cost,
            "isActive": true,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/packages",
                None,
                Some(data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        let package: Package = parse_row(result, "package insert")?;
        info!(
            "Created package {} ({} sessions)",
            package.name, package.session_count
        );
        Ok(package)
    }

    /// Lookup used by the booking pipeline to price a new booking.
    pub async fn get_package(&self, id: Uuid) -> Result<Package, CatalogError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/packages?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            return Err(CatalogError::NotFound("Package"));
        }
        parse_row(rows, "package fetch")
    }

    pub async fn list_packages(&self) -> Result<Vec<Package>, CatalogError> {
        let result: Vec<Package> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/packages?order=sessionCount.asc",
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        debug!("Listed {} packages", result.len());
        Ok(result)
    }

    pub async fn update_package(
        &self,
        id: Uuid,
        request: UpdatePackageRequest,
    ) -> Result<Package, CatalogError> {
        let mut update = serde_json::Map::new();
        if let Some(name) = request.name {
            update.insert("name".to_string(), json!(name));
        }
        if let Some(session_count) = request.session_count {
            if session_count <= 0 {
                return Err(CatalogError::ValidationError(
                    "sessionCount must be positive".to_string(),
                ));
            }
            update.insert("sessionCount".to_string(), json!(session_count));
        }
        if let Some(cost) = request.cost_per_session {
            update.insert("costPerSession".to_string(), json!(cost));
        }
        if let Some(total) = request.total_cost {
            update.insert("totalCost".to_string(), json!(total));
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
                &format!("/rest/v1/packages?id=eq.{}", id),
                None,
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(CatalogError::NotFound("Package"));
        }
        parse_row(result, "package update")
    }

    pub async fn delete_package(&self, id: Uuid) -> Result<(), CatalogError> {
        let _: Vec<Value> = self
            .db
            .request(
                Method::DELETE,
                &format!("/rest/v1/packages?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
