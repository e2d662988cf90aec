use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE THERAPIST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapistAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: AccountStatus,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapistProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub short_code: String,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub qualifications: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc_code: Option<String>,
    pub instagram: Option<String>,
    /// ISO dates the therapist is away. Availability reporting excludes
    /// the therapist on these days.
    #[serde(default)]
    pub holidays: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Account + profile joined view returned by the cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Therapist {
    pub id: Uuid,
    pub short_code: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: AccountStatus,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub qualifications: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc_code: Option<String>,
    pub instagram: Option<String>,
    #[serde(default)]
    pub holidays: Vec<String>,
}

/// Minimal projection the booking side works with. One entry per active
/// therapist; `id` is the account id, `short_code` keys the per-day
/// booked-slots maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapistDirectoryEntry {
    pub id: Uuid,
    pub short_code: String,
    pub name: String,
    #[serde(default)]
    pub holidays: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Suspended => write!(f, "suspended"),
            AccountStatus::Deleted => write!(f, "deleted"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTherapistRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub qualifications: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc_code: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTherapistRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<AccountStatus>,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub qualifications: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc_code: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetHolidaysRequest {
    pub holidays: Vec<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TherapistError {
    #[error("Therapist not found")]
    NotFound,

    #[error("Therapist with email {0} already exists")]
    EmailExists(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
