use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient, SequenceAllocator, SequenceKind};

use crate::models::{
    CreatePatientRequest, Patient, PatientAccount, PatientError, PatientProfile, PatientSearchQuery,
    PatientSummary, UpdatePatientRequest,
};

pub struct PatientService {
    db: Arc<PostgrestClient>,
    sequences: SequenceAllocator,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        let sequences = SequenceAllocator::new(db.clone());
        Self { db, sequences }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
    ) -> Result<Patient, PatientError> {
        debug!("Creating patient profile for: {}", request.email);

        if request.child_name.trim().is_empty() || request.parent_name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "childName and parentName are required".to_string(),
            ));
        }

        let existing: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/users?email=eq.{}&select=id", request.email),
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(PatientError::EmailAlreadyExists {
                email: request.email,
            });
        }

        let patient_code = self
            .sequences
            .next_code(SequenceKind::Patient)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let account_data = json!({
            "name": request.parent_name,
            "email": request.email,
            "phone": request.phone,
            "role": "patient",
            "status": "active",
            "createdAt": Utc::now().to_rfc3339(),
        });

        let created: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/users",
                None,
                Some(account_data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let account: PatientAccount = created
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                PatientError::DatabaseError("account insert returned no row".to_string())
            })?;

        let profile_data = json!({
            "userId": account.id,
            "patientCode": patient_code,
            "childName": request.child_name,
            "childDob": request.child_dob,
            "parentName": request.parent_name,
            "phone": request.phone,
            "email": request.email,
            "address": request.address,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let inserted: Vec<Value> = match self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/patient_profiles",
                None,
                Some(profile_data),
                Some(return_representation()),
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Profile insert failed for {}, removing account", account.id);
                let _: Result<Vec<Value>, _> = self
                    .db
                    .request(
                        Method::DELETE,
                        &format!("/rest/v1/users?id=eq.{}", account.id),
                        None,
                        None,
                    )
                    .await;
                return Err(PatientError::DatabaseError(e.to_string()));
            }
        };

        let profile: PatientProfile = inserted
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                PatientError::DatabaseError("profile insert returned no row".to_string())
            })?;

        info!(
            "Patient profile created with code {}",
            profile.patient_code
        );

        Ok(merge(profile, account.status))
    }

    pub async fn get_patient(&self, id: Uuid) -> Result<Patient, PatientError> {
        let profile = self.fetch_profile(id).await?;
        let status = self.fetch_account_status(profile.user_id).await?;
        Ok(merge(profile, status))
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
    ) -> Result<Vec<Patient>, PatientError> {
        let mut query_parts = vec![];

        if let Some(name) = query.name {
            query_parts.push(format!(
                "or=(childName.ilike.%{}%,parentName.ilike.%{}%)",
                name, name
            ));
        }
        if let Some(phone) = query.phone {
            query_parts.push(format!("phone=ilike.%{}%", phone));
        }

        let limit = query.limit.unwrap_or(50);
        let offset = query.offset.unwrap_or(0);
        query_parts.push(format!("limit={}&offset={}", limit, offset));
        query_parts.push("order=createdAt.desc".to_string());

        let path = format!("/rest/v1/patient_profiles?{}", query_parts.join("&"));

        let profiles: Vec<PatientProfile> = self
            .db
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if profiles.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<String> = profiles.iter().map(|p| p.user_id.to_string()).collect();
        let accounts: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/users?id=in.({})&select=id,status",
                    user_ids.join(",")
                ),
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(profiles
            .into_iter()
            .map(|profile| {
                let status = accounts
                    .iter()
                    .find(|a| a["id"].as_str() == Some(profile.user_id.to_string().as_str()))
                    .and_then(|a| a["status"].as_str())
                    .unwrap_or("active")
                    .to_string();
                merge(profile, status)
            })
            .collect())
    }

    /// Everything a booking form needs in one shot: patients, active
    /// therapy types and packages.
    pub async fn booking_directory(&self) -> Result<Value, PatientError> {
        let profiles: Vec<PatientProfile> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/patient_profiles?order=createdAt.desc",
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let patients: Vec<PatientSummary> = profiles
            .into_iter()
            .map(|p| PatientSummary {
                id: p.id,
                patient_code: p.patient_code,
                child_name: p.child_name,
                parent_name: p.parent_name,
                phone: p.phone,
            })
            .collect();

        let therapies: Vec<Value> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/therapies?isActive=eq.true&order=name.asc",
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let packages: Vec<Value> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/packages?order=sessionCount.asc",
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(json!({
            "patients": patients,
            "therapies": therapies,
            "packages": packages,
        }))
    }

    pub async fn update_patient(
        &self,
        id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        let mut update_data = serde_json::Map::new();

        if let Some(child_name) = request.child_name {
            update_data.insert("childName".to_string(), json!(child_name));
        }
        if let Some(child_dob) = request.child_dob {
            update_data.insert("childDob".to_string(), json!(child_dob));
        }
        if let Some(parent_name) = request.parent_name {
            update_data.insert("parentName".to_string(), json!(parent_name));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }

        if update_data.is_empty() {
            return self.get_patient(id).await;
        }

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/patient_profiles?id=eq.{}", id),
                None,
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let profile: PatientProfile = result
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or(PatientError::NotFound)?;

        let status = self.fetch_account_status(profile.user_id).await?;
        Ok(merge(profile, status))
    }

    /// Profile row goes, account is soft-deleted so payment and booking
    /// history keeps resolving.
    pub async fn delete_patient(&self, id: Uuid) -> Result<(), PatientError> {
        let profile = self.fetch_profile(id).await?;

        let _: Vec<Value> = self
            .db
            .request(
                Method::DELETE,
                &format!("/rest/v1/patient_profiles?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let _: Vec<Value> = self
            .db
            .request(
                Method::PATCH,
                &format!("/rest/v1/users?id=eq.{}", profile.user_id),
                None,
                Some(json!({ "status": "deleted" })),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Deleted patient {}", id);
        Ok(())
    }

    async fn fetch_profile(&self, id: Uuid) -> Result<PatientProfile, PatientError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/patient_profiles?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        rows.first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or(PatientError::NotFound)
    }

    async fn fetch_account_status(&self, user_id: Uuid) -> Result<String, PatientError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/users?id=eq.{}&select=status", user_id),
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(rows
            .first()
            .and_then(|r| r["status"].as_str())
            .unwrap_or("active")
            .to_string())
    }
}

fn merge(profile: PatientProfile, status: String) -> Patient {
    Patient {
        id: profile.id,
        user_id: profile.user_id,
        patient_code: profile.patient_code,
        child_name: profile.child_name,
        child_dob: profile.child_dob,
        parent_name: profile.parent_name,
        phone: profile.phone,
        email: profile.email,
        address: profile.address,
        status,
    }
}
