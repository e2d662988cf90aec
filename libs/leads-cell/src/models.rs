use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enquiry captured by front-desk staff before a child becomes a patient.
/// `lead_id` is the human-facing code (L00001); `id` is the row key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub lead_id: String,
    pub call_date: Option<String>,
    pub staff: Option<String>,
    pub staff_other: Option<String>,
    pub referral_source: Option<String>,
    pub parent_name: String,
    pub parent_relationship: Option<String>,
    pub parent_mobile: String,
    pub parent_email: Option<String>,
    pub parent_area: Option<String>,
    pub child_name: String,
    pub child_dob: Option<String>,
    pub child_gender: Option<String>,
    pub therapist_already: Option<String>,
    pub diagnosis: Option<String>,
    pub visit_finalized: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub status: String,
    pub remarks: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub call_date: Option<String>,
    pub staff: Option<String>,
    pub staff_other: Option<String>,
    pub referral_source: Option<String>,
    pub parent_name: String,
    pub parent_relationship: Option<String>,
    pub parent_mobile: String,
    pub parent_email: Option<String>,
    pub parent_area: Option<String>,
    pub child_name: String,
    pub child_dob: Option<String>,
    pub child_gender: Option<String>,
    pub therapist_already: Option<String>,
    pub diagnosis: Option<String>,
    pub visit_finalized: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub call_date: Option<String>,
    pub staff: Option<String>,
    pub staff_other: Option<String>,
    pub referral_source: Option<String>,
    pub parent_name: Option<String>,
    pub parent_relationship: Option<String>,
    pub parent_mobile: Option<String>,
    pub parent_email: Option<String>,
    pub parent_area: Option<String>,
    pub child_name: Option<String>,
    pub child_dob: Option<String>,
    pub child_gender: Option<String>,
    pub therapist_already: Option<String>,
    pub diagnosis: Option<String>,
    pub visit_finalized: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("Lead not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
