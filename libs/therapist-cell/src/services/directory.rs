use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient, SequenceAllocator, SequenceKind};

use crate::models::{
    AccountStatus, CreateTherapistRequest, Therapist, TherapistAccount, TherapistDirectoryEntry,
    TherapistError, TherapistProfile, UpdateTherapistRequest,
};

pub struct TherapistService {
    db: Arc<PostgrestClient>,
    sequences: SequenceAllocator,
}

impl TherapistService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        let sequences = SequenceAllocator::new(db.clone());
        Self { db, sequences }
    }

    /// Create therapist account + profile. The profile gets the next NPL
    /// short code; the account row is what booking records reference by id.
    pub async fn create_therapist(
        &self,
        request: CreateTherapistRequest,
    ) -> Result<Therapist, TherapistError> {
        if request.name.trim().is_empty() || request.email.trim().is_empty() {
            return Err(TherapistError::ValidationError(
                "name and email are required".to_string(),
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
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(TherapistError::EmailExists(request.email));
        }

        let short_code = self
            .sequences
            .next_code(SequenceKind::Therapist)
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let account_data = json!({
            "name": request.name,
            "email": request.email,
            "phone": request.phone,
            "role": "therapist",
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
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let account: TherapistAccount = created
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                TherapistError::DatabaseError("account insert returned no row".to_string())
            })?;

        let profile_data = json!({
            "userId": account.id,
            "shortCode": short_code,
            "specialization": request.specialization,
            "experienceYears": request.experience_years,
            "qualifications": request.qualifications,
            "bankAccount": request.bank_account,
            "ifscCode": request.ifsc_code,
            "instagram": request.instagram,
            "holidays": [],
            "createdAt": Utc::now().to_rfc3339(),
        });

        let profile_result: Result<Vec<Value>, _> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/therapist_profiles",
                None,
                Some(profile_data),
                Some(return_representation()),
            )
            .await;

        let inserted = match profile_result {
            Ok(rows) => rows,
            Err(e) => {
                // Roll the orphaned account back so the email stays reusable.
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
                return Err(TherapistError::DatabaseError(e.to_string()));
            }
        };

        let profile: TherapistProfile = inserted
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                TherapistError::DatabaseError("profile insert returned no row".to_string())
            })?;

        info!(
            "Created therapist {} with short code {}",
            account.id, profile.short_code
        );

        Ok(merge(account, profile))
    }

    pub async fn get_therapist(&self, id: Uuid) -> Result<Therapist, TherapistError> {
        let account = self.fetch_account(id).await?;
        let profile = self.fetch_profile(id).await?;
        Ok(merge(account, profile))
    }

    pub async fn list_therapists(
        &self,
        status: Option<AccountStatus>,
    ) -> Result<Vec<Therapist>, TherapistError> {
        let mut path = "/rest/v1/users?role=eq.therapist&order=createdAt.asc".to_string();
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let accounts: Vec<TherapistAccount> = self
            .db
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = accounts.iter().map(|a| a.id.to_string()).collect();
        let profiles: Vec<TherapistProfile> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/therapist_profiles?userId=in.({})",
                    ids.join(",")
                ),
                None,
                None,
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let mut result = Vec::with_capacity(accounts.len());
        for account in accounts {
            if let Some(profile) = profiles.iter().find(|p| p.user_id == account.id) {
                result.push(merge(account, profile.clone()));
            }
        }
        Ok(result)
    }

    /// Directory used by availability and booking: every therapist whose
    /// account is active, with short code and holiday list.
    pub async fn list_active_directory(
        &self,
    ) -> Result<Vec<TherapistDirectoryEntry>, TherapistError> {
        let accounts: Vec<Value> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/users?role=eq.therapist&status=eq.active&select=id,name",
                None,
                None,
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = accounts
            .iter()
            .filter_map(|a| a["id"].as_str().map(str::to_string))
            .collect();

        let profiles: Vec<TherapistProfile> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/therapist_profiles?userId=in.({})",
                    ids.join(",")
                ),
                None,
                None,
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let mut entries = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let name = accounts
                .iter()
                .find(|a| a["id"].as_str() == Some(profile.user_id.to_string().as_str()))
                .and_then(|a| a["name"].as_str())
                .unwrap_or_default()
                .to_string();
            entries.push(TherapistDirectoryEntry {
                id: profile.user_id,
                short_code: profile.short_code,
                name,
                holidays: profile.holidays,
            });
        }

        debug!("Active therapist directory has {} entries", entries.len());
        Ok(entries)
    }

    /// Resolve one active therapist to its directory entry. This is the
    /// single source for short codes during booking writes.
    pub async fn resolve_active(
        &self,
        id: Uuid,
    ) -> Result<TherapistDirectoryEntry, TherapistError> {
        let directory = self.list_active_directory().await?;
        directory
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or(TherapistError::NotFound)
    }

    pub async fn set_holidays(
        &self,
        id: Uuid,
        holidays: Vec<String>,
    ) -> Result<Therapist, TherapistError> {
        for date in &holidays {
            if !is_iso_date(date) {
                return Err(TherapistError::ValidationError(format!(
                    "invalid holiday date: {}",
                    date
                )));
            }
        }

        let updated: Vec<Value> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/therapist_profiles?userId=eq.{}", id),
                None,
                Some(json!({ "holidays": holidays })),
                Some(return_representation()),
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            return Err(TherapistError::NotFound);
        }

        self.get_therapist(id).await
    }

    pub async fn update_therapist(
        &self,
        id: Uuid,
        request: UpdateTherapistRequest,
    ) -> Result<Therapist, TherapistError> {
        let mut account_update = serde_json::Map::new();
        if let Some(name) = &request.name {
            account_update.insert("name".to_string(), json!(name));
        }
        if let Some(phone) = &request.phone {
            account_update.insert("phone".to_string(), json!(phone));
        }
        if let Some(status) = &request.status {
            account_update.insert("status".to_string(), json!(status));
        }

        if !account_update.is_empty() {
            let rows: Vec<Value> = self
                .db
                .request_with_headers(
                    Method::PATCH,
                    &format!("/rest/v1/users?id=eq.{}&role=eq.therapist", id),
                    None,
                    Some(Value::Object(account_update)),
                    Some(return_representation()),
                )
                .await
                .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;
            if rows.is_empty() {
                return Err(TherapistError::NotFound);
            }
        }

        let mut profile_update = serde_json::Map::new();
        if let Some(specialization) = &request.specialization {
            profile_update.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(years) = &request.experience_years {
            profile_update.insert("experienceYears".to_string(), json!(years));
        }
        if let Some(qualifications) = &request.qualifications {
            profile_update.insert("qualifications".to_string(), json!(qualifications));
        }
        if let Some(bank) = &request.bank_account {
            profile_update.insert("bankAccount".to_string(), json!(bank));
        }
        if let Some(ifsc) = &request.ifsc_code {
            profile_update.insert("ifscCode".to_string(), json!(ifsc));
        }
        if let Some(instagram) = &request.instagram {
            profile_update.insert("instagram".to_string(), json!(instagram));
        }

        if !profile_update.is_empty() {
            let rows: Vec<Value> = self
                .db
                .request_with_headers(
                    Method::PATCH,
                    &format!("/rest/v1/therapist_profiles?userId=eq.{}", id),
                    None,
                    Some(Value::Object(profile_update)),
                    Some(return_representation()),
                )
                .await
                .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;
            if rows.is_empty() {
                return Err(TherapistError::NotFound);
            }
        }

        self.get_therapist(id).await
    }

    /// Soft delete: the profile row goes away, the account is marked
    /// deleted so historical bookings keep a valid reference.
    pub async fn delete_therapist(&self, id: Uuid) -> Result<(), TherapistError> {
        let account = self.fetch_account(id).await?;

        let _: Vec<Value> = self
            .db
            .request(
                Method::DELETE,
                &format!("/rest/v1/therapist_profiles?userId=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let _: Vec<Value> = self
            .db
            .request(
                Method::PATCH,
                &format!("/rest/v1/users?id=eq.{}", account.id),
                None,
                Some(json!({ "status": "deleted" })),
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        info!("Deleted therapist {}", id);
        Ok(())
    }

    async fn fetch_account(&self, id: Uuid) -> Result<TherapistAccount, TherapistError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/users?id=eq.{}&role=eq.therapist", id),
                None,
                None,
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        rows.first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?
            .ok_or(TherapistError::NotFound)
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<TherapistProfile, TherapistError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/therapist_profiles?userId=eq.{}", user_id),
                None,
                None,
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        rows.first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?
            .ok_or(TherapistError::NotFound)
    }
}

fn merge(account: TherapistAccount, profile: TherapistProfile) -> Therapist {
    Therapist {
        id: account.id,
        short_code: profile.short_code,
        name: account.name,
        email: account.email,
        phone: account.phone,
        status: account.status,
        specialization: profile.specialization,
        experience_years: profile.experience_years,
        qualifications: profile.qualifications,
        bank_account: profile.bank_account,
        ifsc_code: profile.ifsc_code,
        instagram: profile.instagram,
        holidays: profile.holidays,
    }
}

pub fn is_iso_date(value: &str) -> bool {
    let pattern = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    pattern.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}
