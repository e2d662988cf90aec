use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient};

use crate::models::{CatalogError, CreateTherapyRequest, TherapyType, UpdateTherapyRequest};

pub struct TherapyService {
    db: Arc<PostgrestClient>,
}

impl TherapyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub async fn create_therapy(
        &self,
        request: CreateTherapyRequest,
    ) -> Result<TherapyType, CatalogError> {
        if request.name.trim().is_empty() {
            return Err(CatalogError::ValidationError(
                "name is required".to_string(),
            ));
        }

        let existing: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/therapies?name=eq.{}&select=id", request.name),
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(CatalogError::TherapyExists(request.name));
        }

        let data = json!({
            "name": request.name,
            "description": request.description,
            "isActive": true,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/therapies",
                None,
                Some(data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        let therapy: TherapyType = parse_row(result, "therapy insert")?;
        info!("Created therapy type {}", therapy.name);
        Ok(therapy)
    }

    pub async fn list_therapies(
        &self,
        active_only: bool,
    ) -> Result<Vec<TherapyType>, CatalogError> {
        let mut path = "/rest/v1/therapies?order=name.asc".to_string();
        if active_only {
            path.push_str("&isActive=eq.true");
        }

        let result: Vec<TherapyType> = self
            .db
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        debug!("Listed {} therapy types", result.len());
        Ok(result)
    }

    pub async fn update_therapy(
        &self,
        id: Uuid,
        request: UpdateTherapyRequest,
    ) -> Result<TherapyType, CatalogError> {
        let mut update = serde_json::Map::new();
        if let Some(name) = request.name {
            update.insert("name".to_string(), json!(name));
        }
        if let Some(description) = request.description {
            update.insert("description".to_string(), json!(description));
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
                &format!("/rest/v1/therapies?id=eq.{}", id),
                None,
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(CatalogError::NotFound("Therapy type"));
        }
        parse_row(result, "therapy update")
    }

    pub async fn delete_therapy(&self, id: Uuid) -> Result<(), CatalogError> {
        let _: Vec<Value> = self
            .db
            .request(
                Method::DELETE,
                &format!("/rest/v1/therapies?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

pub(crate) fn parse_row<T: serde::de::DeserializeOwned>(
    rows: Vec<Value>,
    context: &str,
) -> Result<T, CatalogError> {
    rows.first()
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| CatalogError::DatabaseError(format!("{}: {}", context, e)))?
        .ok_or_else(|| CatalogError::DatabaseError(format!("{} returned no row", context)))
}
