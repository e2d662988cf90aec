use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient, SequenceAllocator, SequenceKind};

use crate::models::{CreateLeadRequest, Lead, LeadError, UpdateLeadRequest};

pub struct LeadService {
    db: Arc<PostgrestClient>,
    sequences: SequenceAllocator,
}

impl LeadService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        let sequences = SequenceAllocator::new(db.clone());
        Self { db, sequences }
    }

    pub async fn create_lead(&self, request: CreateLeadRequest) -> Result<Lead, LeadError> {
        if request.parent_name.trim().is_empty()
            || request.parent_mobile.trim().is_empty()
            || request.child_name.trim().is_empty()
        {
            return Err(LeadError::ValidationError(
                "parentName, parentMobile, and childName are required".to_string(),
            ));
        }

        let lead_code = self
            .sequences
            .next_code(SequenceKind::Lead)
            .await
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?;

        let data = json!({
            "leadId": lead_code,
            "callDate": request.call_date,
            "staff": request.staff,
            "staffOther": request.staff_other,
            "referralSource": request.referral_source,
            "parentName": request.parent_name,
            "parentRelationship": request.parent_relationship,
            "parentMobile": request.parent_mobile,
            "parentEmail": request.parent_email,
            "parentArea": request.parent_area,
            "childName": request.child_name,
            "childDob": request.child_dob,
            "childGender": request.child_gender,
            "therapistAlready": request.therapist_already,
            "diagnosis": request.diagnosis,
            "visitFinalized": request.visit_finalized,
            "appointmentDate": request.appointment_date,
            "appointmentTime": request.appointment_time,
            "status": request.status.unwrap_or_else(|| "pending".to_string()),
            "remarks": request.remarks,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/leads",
                None,
                Some(data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?;

        let lead: Lead = result
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?
            .ok_or_else(|| LeadError::DatabaseError("lead insert returned no row".to_string()))?;

        info!("Captured lead {}", lead.lead_id);
        Ok(lead)
    }

    pub async fn list_leads(&self) -> Result<Vec<Lead>, LeadError> {
        let leads: Vec<Lead> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/leads?order=createdAt.desc",
                None,
                None,
            )
            .await
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?;

        debug!("Listed {} leads", leads.len());
        Ok(leads)
    }

    pub async fn get_lead(&self, id: Uuid) -> Result<Lead, LeadError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/leads?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?;

        rows.first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?
            .ok_or(LeadError::NotFound)
    }

    pub async fn update_lead(
        &self,
        id: Uuid,
        request: UpdateLeadRequest,
    ) -> Result<Lead, LeadError> {
        // Required contact fields may change but never go blank.
        for (field, value) in [
            ("parentName", &request.parent_name),
            ("parentMobile", &request.parent_mobile),
            ("childName", &request.child_name),
        ] {
            if let Some(v) = value {
                if v.trim().is_empty() {
                    return Err(LeadError::ValidationError(format!(
                        "{} cannot be empty",
                        field
                    )));
                }
            }
        }

        let mut update = serde_json::Map::new();
        let fields: [(&str, Option<String>); 19] = [
            ("callDate", request.call_date),
            ("staff", request.staff),
            ("staffOther", request.staff_other),
            ("referralSource", request.referral_source),
            ("parentName", request.parent_name),
            ("parentRelationship", request.parent_relationship),
            ("parentMobile", request.parent_mobile),
            ("parentEmail", request.parent_email),
            ("parentArea", request.parent_area),
            ("childName", request.child_name),
            ("childDob", request.child_dob),
            ("childGender", request.child_gender),
            ("therapistAlready", request.therapist_already),
            ("diagnosis", request.diagnosis),
            ("visitFinalized", request.visit_finalized),
            ("appointmentDate", request.appointment_date),
            ("appointmentTime", request.appointment_time),
            ("status", request.status),
            ("remarks", request.remarks),
        ];
        for (key, value) in fields {
            if let Some(v) = value {
                update.insert(key.to_string(), json!(v));
            }
        }

        if update.is_empty() {
            return self.get_lead(id).await;
        }
        update.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/leads?id=eq.{}", id),
                None,
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?;

        result
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?
            .ok_or(LeadError::NotFound)
    }

    pub async fn delete_lead(&self, id: Uuid) -> Result<(), LeadError> {
        // Leads have no downstream references; a hard delete is fine.
        self.get_lead(id).await?;

        let _: Vec<Value> = self
            .db
            .request(
                Method::DELETE,
                &format!("/rest/v1/leads?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| LeadError::DatabaseError(e.to_string()))?;

        info!("Deleted lead {}", id);
        Ok(())
    }
}
