use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use shared_models::error::ConflictingSlot;

// ==============================================================================
// DAILY CAPACITY MODELS
// ==============================================================================

/// Capacity numbers for one slot inside a day row. `count` is what an
/// admin configured, `booked` is the legacy tally kept for planning
/// dashboards. Live availability is derived from booking session rows,
/// not from these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCapacity {
    pub slot_id: String,
    pub label: String,
    pub limited: bool,
    pub count: i32,
    #[serde(default)]
    pub booked: i32,
}

/// One row per ISO date in `daily_capacity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCapacity {
    pub id: Uuid,
    pub date: String,
    pub sessions: Vec<SlotCapacity>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCountUpdate {
    pub slot_id: String,
    pub count: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetDayCountsRequest {
    pub sessions: Vec<SlotCountUpdate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultCapacityRequest {
    pub default_capacity: i32,
}

/// Outcome of a 14-day capacity rollout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutSummary {
    pub default_capacity: i32,
    pub days_written: usize,
    pub sundays_skipped: usize,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub therapist_id: Option<Uuid>,
}

/// Availability numbers for one calendar day. Totals are the staffing
/// ceiling (active, non-holiday therapists times the slot counts of the
/// catalog); booked figures come from scanning booking session rows.
/// `BookedSlots` keeps its historical capitalized key, the dashboard
/// reads it that way.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub total_available_slots: i64,
    pub total_limited_available_slots: i64,
    pub booked_slots: i64,
    pub limited_booked_slots: i64,
    #[serde(rename = "BookedSlots")]
    pub booked_by_therapist: BTreeMap<String, BTreeSet<String>>,
}

/// Report keyed by display date `DD-MM-YYYY`.
pub type AvailabilityReport = BTreeMap<String, DayAvailability>;

// ==============================================================================
// BOOKING MODELS
// ==============================================================================

/// Session as the client requests it. The therapist stamp is applied by
/// the service after directory resolution, never taken from the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedSession {
    pub date: String,
    pub slot_id: String,
    pub time: Option<String>,
}

/// Session as stored on a booking, denormalized with the resolved
/// therapist id and short code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub date: String,
    pub slot_id: String,
    pub time: Option<String>,
    pub therapist_id: Uuid,
    pub therapist_code: String,
}

/// Flat per-session row in `booking_sessions`, the table the aggregator
/// scans. A unique index over (therapistId, date, slotId) here is the
/// final guard against two concurrent creates taking the same slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSessionRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub appointment_id: String,
    pub therapist_id: Uuid,
    pub therapist_code: String,
    pub date: String,
    pub slot_id: String,
}

/// Discount details frozen onto a booking at create/update time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDiscountInfo {
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub discount: i32,
    pub discount_enabled: bool,
    pub validity_days: Option<i32>,
    pub date_from: Option<DateTime<Utc>>,
    /// Resolved coupon row, when the code matched one.
    pub coupon: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub appointment_id: String,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub therapist_code: String,
    pub therapy_id: Uuid,
    pub package_id: Uuid,
    pub sessions: Vec<SessionEntry>,
    pub discount_info: Option<BookingDiscountInfo>,
    /// Invoice code of the pending payment stub written at commit.
    pub payment_id: Option<String>,
    #[serde(default = "default_booking_status")]
    pub status: String,
    pub notes: Option<String>,
    pub channel: Option<String>,
    pub referral: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_booking_status() -> String {
    "confirmed".to_string()
}

/// Create/update body. References stay `Option` so a missing field is
/// reported as a field-level validation failure instead of a request
/// decode error; the optional bookkeeping tail is enumerated here rather
/// than accepted as an open record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub package: Option<Uuid>,
    pub patient: Option<Uuid>,
    pub therapy: Option<Uuid>,
    pub therapist: Option<Uuid>,
    #[serde(default)]
    pub sessions: Vec<RequestedSession>,
    pub coupon_code: Option<String>,
    pub discount: Option<i32>,
    pub discount_enabled: Option<bool>,
    pub validity_days: Option<i32>,
    pub notes: Option<String>,
    pub channel: Option<String>,
    pub referral: Option<String>,
    /// Set by the approval flow so the commit flips the request row in
    /// the same transaction. Ignored on update.
    pub fulfills_request: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingListQuery {
    pub patient: Option<Uuid>,
    pub therapist: Option<Uuid>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheckRequest {
    pub therapist: Uuid,
    #[serde(default)]
    pub sessions: Vec<RequestedSession>,
    /// Sessions already owned by this booking are exempt from the check.
    pub exclude_booking: Option<Uuid>,
}

// ==============================================================================
// BOOKING REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Patient-submitted appointment request awaiting an admin decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub id: Uuid,
    pub request_id: String,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub therapy_id: Uuid,
    pub package_id: Uuid,
    pub sessions: Vec<RequestedSession>,
    pub status: RequestStatus,
    /// Back-reference to the booking created on approval.
    pub booking_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBookingRequestBody {
    pub package: Option<Uuid>,
    pub patient: Option<Uuid>,
    pub therapy: Option<Uuid>,
    pub therapist: Option<Uuid>,
    #[serde(default)]
    pub sessions: Vec<RequestedSession>,
    pub notes: Option<String>,
}

/// Adjustments an admin may apply while approving. Anything left out is
/// taken from the stored request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequestBody {
    pub sessions: Option<Vec<RequestedSession>>,
    pub coupon_code: Option<String>,
    pub discount: Option<i32>,
    pub discount_enabled: Option<bool>,
    pub validity_days: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestListQuery {
    pub status: Option<RequestStatus>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Invalid date: {0}. Use format YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid package reference")]
    InvalidPackage,

    #[error("Invalid therapist reference")]
    InvalidTherapist,

    #[error("{} slot(s) already booked", .0.len())]
    SlotConflict(Vec<ConflictingSlot>),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Booking request is already approved")]
    AlreadyApproved,

    #[error("Booking request is already rejected")]
    AlreadyRejected,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Dependency failure: {0}")]
    DependencyFailure(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
