use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient, SequenceAllocator, SequenceKind};

use crate::dates::parse_iso_date;
use crate::models::{
    ApproveRequestBody, BookingPayload, BookingRequest, RequestStatus, SchedulingError,
    SubmitBookingRequestBody,
};
use crate::services::{parse_row, BookingService};
use crate::slots;

/// Patient-submitted appointment requests and the admin decision flow.
/// Approval runs the full booking pipeline; the commit rpc flips the
/// request row in the same transaction as the booking insert.
pub struct BookingRequestService {
    db: Arc<PostgrestClient>,
    sequences: SequenceAllocator,
    bookings: BookingService,
}

impl BookingRequestService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        let sequences = SequenceAllocator::new(db.clone());
        Self {
            db,
            sequences,
            bookings: BookingService::new(config),
        }
    }

    pub async fn submit(
        &self,
        body: SubmitBookingRequestBody,
    ) -> Result<BookingRequest, SchedulingError> {
        let mut missing = Vec::new();
        if body.package.is_none() {
            missing.push("package");
        }
        if body.patient.is_none() {
            missing.push("patient");
        }
        if body.therapy.is_none() {
            missing.push("therapy");
        }
        if body.therapist.is_none() {
            missing.push("therapist");
        }
        if body.sessions.is_empty() {
            missing.push("sessions");
        }
        if !missing.is_empty() {
            return Err(SchedulingError::MissingFields(missing.join(", ")));
        }
        for session in &body.sessions {
            parse_iso_date(&session.date)?;
            if slots::find_slot(&session.slot_id).is_none() {
                return Err(SchedulingError::InvalidOperation(format!(
                    "unknown slot id: {}",
                    session.slot_id
                )));
            }
        }

        let request_code = self
            .sequences
            .next_code(SequenceKind::Request)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = json!({
            "requestId": request_code,
            "packageId": body.package,
            "patientId": body.patient,
            "therapyId": body.therapy,
            "therapistId": body.therapist,
            "sessions": body.sessions,
            "status": RequestStatus::Pending,
            "notes": body.notes,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/booking_requests",
                None,
                Some(row),
                Some(return_representation()),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let request: BookingRequest = parse_row(rows, "booking request")?;
        info!("Submitted booking request {}", request.request_id);
        Ok(request)
    }

    pub async fn get_request(&self, id: Uuid) -> Result<BookingRequest, SchedulingError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/booking_requests?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        rows.first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?
            .ok_or(SchedulingError::NotFound("Booking request"))
    }

    pub async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<BookingRequest>, SchedulingError> {
        let mut path = "/rest/v1/booking_requests?order=createdAt.desc".to_string();
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        self.db
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))
    }

    /// Turn a pending request into a booking. The admin may adjust the
    /// sessions and discount; everything else comes from the stored
    /// request. The booking commit links the request and flips it to
    /// approved atomically, so a conflict or any other failure leaves
    /// the request pending and untouched.
    pub async fn approve(
        &self,
        id: Uuid,
        body: ApproveRequestBody,
    ) -> Result<BookingRequest, SchedulingError> {
        let request = self.get_request(id).await?;
        match request.status {
            RequestStatus::Approved => return Err(SchedulingError::AlreadyApproved),
            RequestStatus::Rejected => return Err(SchedulingError::AlreadyRejected),
            RequestStatus::Pending => {}
        }

        let sessions = body.sessions.unwrap_or_else(|| request.sessions.clone());

        let payload = BookingPayload {
            package: Some(request.package_id),
            patient: Some(request.patient_id),
            therapy: Some(request.therapy_id),
            therapist: Some(request.therapist_id),
            sessions,
            coupon_code: body.coupon_code,
            discount: body.discount,
            discount_enabled: Some(body.discount_enabled.unwrap_or(false)),
            validity_days: body.validity_days,
            notes: body.notes.or_else(|| request.notes.clone()),
            channel: None,
            referral: None,
            fulfills_request: Some(request.id),
        };

        let booking = self.bookings.create_booking(payload).await?;
        info!(
            "Approved booking request {} as booking {}",
            request.request_id, booking.appointment_id
        );

        // The commit flipped the row; re-read it for the response.
        self.get_request(id).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<BookingRequest, SchedulingError> {
        let request = self.get_request(id).await?;
        match request.status {
            RequestStatus::Approved => return Err(SchedulingError::AlreadyApproved),
            RequestStatus::Rejected => return Err(SchedulingError::AlreadyRejected),
            RequestStatus::Pending => {}
        }

        let rows: Vec<Value> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/booking_requests?id=eq.{}", id),
                None,
                Some(json!({
                    "status": RequestStatus::Rejected,
                    "updatedAt": Utc::now().to_rfc3339(),
                })),
                Some(return_representation()),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let updated: BookingRequest = parse_row(rows, "booking request")?;
        info!("Rejected booking request {}", updated.request_id);
        Ok(updated)
    }
}
