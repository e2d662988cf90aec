use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use catalog_cell::{CatalogError, Coupon, CouponService, PackageService};
use payment_cell::{DiscountInfo as PaymentDiscount, Payment};
use shared_config::AppConfig;
use shared_database::{
    return_representation, ApiFailure, PostgrestClient, SequenceAllocator, SequenceKind,
};
use shared_models::error::ConflictingSlot;
use therapist_cell::{TherapistDirectoryEntry, TherapistError, TherapistService};

use crate::dates::parse_iso_date;
use crate::models::{
    Booking, BookingDiscountInfo, BookingListQuery, BookingPayload, BookingSessionRow,
    ConflictCheckRequest, RequestedSession, SchedulingError, SessionEntry,
};
use crate::services::{parse_row, ConflictService};
use crate::slots;

/// Booking lifecycle: create, update, delete, read. Creates and updates
/// are all-or-nothing; the multi-row write (booking, session rows,
/// payment stub, optional request link) goes through a single rpc so a
/// failure anywhere leaves no partial state.
pub struct BookingService {
    db: Arc<PostgrestClient>,
    sequences: SequenceAllocator,
    directory: TherapistService,
    packages: PackageService,
    coupons: CouponService,
    conflicts: ConflictService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        let sequences = SequenceAllocator::new(db.clone());
        Self {
            db,
            sequences,
            directory: TherapistService::new(config),
            packages: PackageService::new(config),
            coupons: CouponService::new(config),
            conflicts: ConflictService::new(config),
        }
    }

    pub async fn create_booking(
        &self,
        payload: BookingPayload,
    ) -> Result<Booking, SchedulingError> {
        let (package_id, patient_id, therapy_id, therapist_id) = validate_payload(&payload)?;
        validate_sessions(&payload.sessions)?;
        validate_discount(&payload)?;

        let therapist = self.resolve_therapist(therapist_id).await?;

        self.conflicts
            .check(therapist.id, &therapist.short_code, &payload.sessions)
            .await?;

        let appointment_code = self
            .sequences
            .next_code(SequenceKind::Appointment)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let package = self
            .packages
            .get_package(package_id)
            .await
            .map_err(|e| match e {
                CatalogError::NotFound(_) => SchedulingError::InvalidPackage,
                other => SchedulingError::DependencyFailure(other.to_string()),
            })?;

        // Coupon linkage is best effort: an unknown code keeps the typed
        // discount figures the client sent, just without the reference.
        let coupon = match &payload.coupon_code {
            Some(code) if payload.discount_enabled == Some(true) => self
                .coupons
                .resolve_coupon(code)
                .await
                .map_err(|e| SchedulingError::DependencyFailure(e.to_string()))?,
            _ => None,
        };

        let discount_info = build_discount_info(&payload, coupon.as_ref());
        let off_amount = if discount_info.discount_enabled {
            discount_amount(package.total_cost, discount_info.discount)
        } else {
            0
        };

        let payment_code = self
            .sequences
            .next_code(SequenceKind::Payment)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let payment_discount = if discount_info.discount_enabled {
            Some(PaymentDiscount {
                code: discount_info.coupon_code.clone(),
                percent: discount_info.discount,
                amount: off_amount,
            })
        } else {
            None
        };
        let payment_stub = Payment::stub_row(
            &payment_code,
            &appointment_code,
            patient_id,
            package.total_cost,
            payment_discount.as_ref(),
        );

        let sessions = stamp_sessions(&payload.sessions, &therapist);

        let booking_row = json!({
            "appointmentId": appointment_code,
            "patientId": patient_id,
            "therapistId": therapist.id,
            "therapistCode": therapist.short_code,
            "therapyId": therapy_id,
            "packageId": package_id,
            "sessions": sessions,
            "discountInfo": discount_info,
            "paymentId": payment_code,
            "status": "confirmed",
            "notes": payload.notes,
            "channel": payload.channel,
            "referral": payload.referral,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let args = json!({
            "booking": booking_row,
            "bookingSessions": session_rows(&appointment_code, &sessions),
            "payment": payment_stub,
            "approveRequest": payload.fulfills_request,
        });

        let committed: Result<Vec<Value>, _> = self.db.rpc("commit_booking", args).await;

        match committed {
            Ok(rows) => {
                let booking: Booking = parse_row(rows, "booking")?;
                info!(
                    "Created booking {} for therapist {} with {} sessions",
                    booking.appointment_id,
                    booking.therapist_code,
                    booking.sessions.len()
                );
                Ok(booking)
            }
            Err(e) => {
                self.commit_failure(e, &therapist, &payload.sessions).await
            }
        }
    }

    pub async fn update_booking(
        &self,
        id: Uuid,
        payload: BookingPayload,
    ) -> Result<Booking, SchedulingError> {
        let (package_id, patient_id, therapy_id, therapist_id) = validate_payload(&payload)?;
        validate_sessions(&payload.sessions)?;
        validate_discount(&payload)?;

        let existing = self.get_booking(id).await?;
        let therapist = self.resolve_therapist(therapist_id).await?;

        // A booking never conflicts with itself: only triples the stored
        // booking does not already own get checked.
        let added = newly_added_sessions(&payload.sessions, &existing, therapist.id);
        self.conflicts
            .check(therapist.id, &therapist.short_code, &added)
            .await?;

        let coupon = match &payload.coupon_code {
            Some(code) if payload.discount_enabled == Some(true) => self
                .coupons
                .resolve_coupon(code)
                .await
                .map_err(|e| SchedulingError::DependencyFailure(e.to_string()))?,
            _ => None,
        };
        let discount_info = build_discount_info(&payload, coupon.as_ref());

        let sessions = stamp_sessions(&payload.sessions, &therapist);

        let booking_row = json!({
            "patientId": patient_id,
            "therapistId": therapist.id,
            "therapistCode": therapist.short_code,
            "therapyId": therapy_id,
            "packageId": package_id,
            "sessions": sessions,
            "discountInfo": discount_info,
            "notes": payload.notes,
            "channel": payload.channel,
            "referral": payload.referral,
            "updatedAt": Utc::now().to_rfc3339(),
        });

        let args = json!({
            "bookingId": id,
            "booking": booking_row,
            "bookingSessions": session_rows(&existing.appointment_id, &sessions),
        });

        let committed: Result<Vec<Value>, _> = self.db.rpc("commit_booking_update", args).await;

        match committed {
            Ok(rows) => {
                let booking: Booking = parse_row(rows, "booking")?;
                info!("Updated booking {}", booking.appointment_id);
                Ok(booking)
            }
            Err(e) => self.commit_failure(e, &therapist, &added).await,
        }
    }

    /// Session rows go with the booking via the foreign-key cascade, so
    /// the slots free up in the same statement.
    pub async fn delete_booking(&self, id: Uuid) -> Result<(), SchedulingError> {
        let deleted: Vec<Value> = self
            .db
            .request_with_headers(
                Method::DELETE,
                &format!("/rest/v1/bookings?id=eq.{}", id),
                None,
                None,
                Some(return_representation()),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if deleted.is_empty() {
            return Err(SchedulingError::NotFound("Booking"));
        }

        info!("Deleted booking {}", id);
        Ok(())
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking, SchedulingError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/bookings?id=eq.{}", id),
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
            .ok_or(SchedulingError::NotFound("Booking"))
    }

    pub async fn list_bookings(
        &self,
        query: BookingListQuery,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let mut path = "/rest/v1/bookings?order=createdAt.desc".to_string();
        if let Some(patient) = query.patient {
            path.push_str(&format!("&patientId=eq.{}", patient));
        }
        if let Some(therapist) = query.therapist {
            path.push_str(&format!("&therapistId=eq.{}", therapist));
        }

        if let Some(date) = &query.date {
            parse_iso_date(date)?;
            // The date filter goes through the flat session rows, then
            // narrows the booking fetch to their owners.
            let rows: Vec<BookingSessionRow> = self
                .db
                .request(
                    Method::GET,
                    &format!("/rest/v1/booking_sessions?date=eq.{}", date),
                    None,
                    None,
                )
                .await
                .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

            let mut ids: Vec<String> = rows.iter().map(|r| r.booking_id.to_string()).collect();
            ids.sort();
            ids.dedup();
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            path.push_str(&format!("&id=in.({})", ids.join(",")));
        }

        self.db
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))
    }

    /// Dry-run conflict inspection for the booking UI. Returns the
    /// offending pairs instead of failing so the calendar can re-render.
    pub async fn check_conflicts(
        &self,
        request: ConflictCheckRequest,
    ) -> Result<Vec<ConflictingSlot>, SchedulingError> {
        validate_sessions(&request.sessions)?;

        let therapist = self.resolve_therapist(request.therapist).await?;

        let sessions = match request.exclude_booking {
            Some(id) => {
                let existing = self.get_booking(id).await?;
                newly_added_sessions(&request.sessions, &existing, therapist.id)
            }
            None => request.sessions.clone(),
        };

        self.conflicts
            .find_conflicts(therapist.id, &therapist.short_code, &sessions)
            .await
    }

    async fn resolve_therapist(
        &self,
        id: Uuid,
    ) -> Result<TherapistDirectoryEntry, SchedulingError> {
        self.directory.resolve_active(id).await.map_err(|e| match e {
            TherapistError::NotFound => SchedulingError::InvalidTherapist,
            other => SchedulingError::DependencyFailure(other.to_string()),
        })
    }

    /// A unique violation on the session index means another writer took
    /// one of the slots between our check and the commit. Re-derive the
    /// offending pairs so the caller sees the same shape as a pre-commit
    /// conflict.
    async fn commit_failure(
        &self,
        e: anyhow::Error,
        therapist: &TherapistDirectoryEntry,
        requested: &[RequestedSession],
    ) -> Result<Booking, SchedulingError> {
        let unique_violation = e
            .downcast_ref::<ApiFailure>()
            .map(|f| f.is_unique_violation())
            .unwrap_or(false);

        if !unique_violation {
            return Err(SchedulingError::DatabaseError(e.to_string()));
        }

        warn!(
            "Booking commit for {} hit the session unique index, re-deriving conflicts",
            therapist.short_code
        );
        let conflicts = self
            .conflicts
            .find_conflicts(therapist.id, &therapist.short_code, requested)
            .await?;
        if conflicts.is_empty() {
            // The competing row is already gone again; report everything
            // requested rather than claiming a clean failure.
            let all = requested
                .iter()
                .map(|s| ConflictingSlot {
                    date: s.date.clone(),
                    slot_id: s.slot_id.clone(),
                })
                .collect();
            return Err(SchedulingError::SlotConflict(all));
        }
        Err(SchedulingError::SlotConflict(conflicts))
    }
}

fn validate_payload(
    payload: &BookingPayload,
) -> Result<(Uuid, Uuid, Uuid, Uuid), SchedulingError> {
    let mut missing = Vec::new();
    if payload.package.is_none() {
        missing.push("package");
    }
    if payload.patient.is_none() {
        missing.push("patient");
    }
    if payload.therapy.is_none() {
        missing.push("therapy");
    }
    if payload.therapist.is_none() {
        missing.push("therapist");
    }
    if payload.sessions.is_empty() {
        missing.push("sessions");
    }
    if payload.discount_enabled.is_none() {
        missing.push("discountEnabled");
    }
    if payload.discount_enabled == Some(true) && payload.discount.is_none() {
        missing.push("discount");
    }
    if !missing.is_empty() {
        return Err(SchedulingError::MissingFields(missing.join(", ")));
    }

    match (
        payload.package,
        payload.patient,
        payload.therapy,
        payload.therapist,
    ) {
        (Some(package), Some(patient), Some(therapy), Some(therapist)) => {
            Ok((package, patient, therapy, therapist))
        }
        _ => Err(SchedulingError::MissingFields(
            "package, patient, therapy, therapist".to_string(),
        )),
    }
}

fn validate_sessions(sessions: &[RequestedSession]) -> Result<(), SchedulingError> {
    for session in sessions {
        parse_iso_date(&session.date)?;
        if slots::find_slot(&session.slot_id).is_none() {
            return Err(SchedulingError::InvalidOperation(format!(
                "unknown slot id: {}",
                session.slot_id
            )));
        }
    }
    Ok(())
}

fn validate_discount(payload: &BookingPayload) -> Result<(), SchedulingError> {
    if let Some(percent) = payload.discount {
        if !(0..=100).contains(&percent) {
            return Err(SchedulingError::InvalidOperation(
                "discount must be between 0 and 100".to_string(),
            ));
        }
    }
    Ok(())
}

fn build_discount_info(payload: &BookingPayload, coupon: Option<&Coupon>) -> BookingDiscountInfo {
    if payload.discount_enabled == Some(true) {
        BookingDiscountInfo {
            coupon_code: payload.coupon_code.clone(),
            discount: payload.discount.unwrap_or(0),
            discount_enabled: true,
            validity_days: payload.validity_days.or(coupon.map(|c| c.validity_days)),
            date_from: Some(Utc::now()),
            coupon: coupon.map(|c| c.id),
        }
    } else {
        BookingDiscountInfo {
            coupon_code: None,
            discount: 0,
            discount_enabled: false,
            validity_days: None,
            date_from: None,
            coupon: None,
        }
    }
}

/// Half-up percentage of the total, in the same minor unit.
fn discount_amount(total_cost: i64, percent: i32) -> i64 {
    (total_cost * percent as i64 + 50) / 100
}

fn stamp_sessions(
    requested: &[RequestedSession],
    therapist: &TherapistDirectoryEntry,
) -> Vec<SessionEntry> {
    requested
        .iter()
        .map(|s| SessionEntry {
            date: s.date.clone(),
            slot_id: s.slot_id.clone(),
            time: s.time.clone(),
            therapist_id: therapist.id,
            therapist_code: therapist.short_code.clone(),
        })
        .collect()
}

fn session_rows(appointment_code: &str, sessions: &[SessionEntry]) -> Vec<Value> {
    sessions
        .iter()
        .map(|s| {
            json!({
                "appointmentId": appointment_code,
                "therapistId": s.therapist_id,
                "therapistCode": s.therapist_code,
                "date": s.date,
                "slotId": s.slot_id,
            })
        })
        .collect()
}

/// Sessions whose (date, slotId, therapist) triple is not already owned
/// by the stored booking.
fn newly_added_sessions(
    requested: &[RequestedSession],
    existing: &Booking,
    therapist_id: Uuid,
) -> Vec<RequestedSession> {
    requested
        .iter()
        .filter(|s| {
            !existing.sessions.iter().any(|old| {
                old.date == s.date
                    && old.slot_id == s.slot_id
                    && old.therapist_id == therapist_id
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with(sessions: Vec<RequestedSession>) -> BookingPayload {
        BookingPayload {
            package: Some(Uuid::new_v4()),
            patient: Some(Uuid::new_v4()),
            therapy: Some(Uuid::new_v4()),
            therapist: Some(Uuid::new_v4()),
            sessions,
            discount_enabled: Some(false),
            ..BookingPayload::default()
        }
    }

    fn session(date: &str, slot_id: &str) -> RequestedSession {
        RequestedSession {
            date: date.to_string(),
            slot_id: slot_id.to_string(),
            time: None,
        }
    }

    #[test]
    fn test_validate_payload_reports_missing_fields() {
        let payload = BookingPayload {
            patient: Some(Uuid::new_v4()),
            sessions: vec![session("2026-03-02", "1000-1045")],
            discount_enabled: Some(false),
            ..BookingPayload::default()
        };
        let err = validate_payload(&payload).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("package"), "{}", message);
        assert!(message.contains("therapy"), "{}", message);
        assert!(message.contains("therapist"), "{}", message);
        assert!(!message.contains("patient"), "{}", message);
    }

    #[test]
    fn test_validate_payload_requires_discount_when_enabled() {
        let mut payload = payload_with(vec![session("2026-03-02", "1000-1045")]);
        payload.discount_enabled = Some(true);
        let err = validate_payload(&payload).unwrap_err();
        assert!(err.to_string().contains("discount"), "{}", err);

        payload.discount = Some(10);
        assert!(validate_payload(&payload).is_ok());
    }

    #[test]
    fn test_validate_payload_requires_discount_enabled_flag() {
        let mut payload = payload_with(vec![session("2026-03-02", "1000-1045")]);
        payload.discount_enabled = None;
        let err = validate_payload(&payload).unwrap_err();
        assert!(err.to_string().contains("discountEnabled"), "{}", err);
    }

    #[test]
    fn test_validate_sessions_rejects_unknown_slot() {
        let result = validate_sessions(&[session("2026-03-02", "1345-1415")]);
        assert!(result.is_err(), "the lunch gap is not bookable");
        assert!(validate_sessions(&[session("2026-03-02", "1345-1415x")]).is_err());
        assert!(validate_sessions(&[session("2026-03-02", "1000-1045")]).is_ok());
    }

    #[test]
    fn test_discount_amount_rounds_half_up() {
        assert_eq!(discount_amount(18000, 10), 1800);
        assert_eq!(discount_amount(999, 15), 150);
        assert_eq!(discount_amount(1000, 0), 0);
        assert_eq!(discount_amount(1000, 100), 1000);
    }

    #[test]
    fn test_newly_added_sessions_exempts_own_triples() {
        let therapist_id = Uuid::new_v4();
        let existing = Booking {
            id: Uuid::new_v4(),
            appointment_id: "APT000001".to_string(),
            patient_id: Uuid::new_v4(),
            therapist_id,
            therapist_code: "NPL001".to_string(),
            therapy_id: Uuid::new_v4(),
            package_id: Uuid::new_v4(),
            sessions: vec![SessionEntry {
                date: "2026-03-02".to_string(),
                slot_id: "1000-1045".to_string(),
                time: None,
                therapist_id,
                therapist_code: "NPL001".to_string(),
            }],
            discount_info: None,
            payment_id: None,
            status: "confirmed".to_string(),
            notes: None,
            channel: None,
            referral: None,
            created_at: None,
            updated_at: None,
        };

        let requested = vec![
            session("2026-03-02", "1000-1045"),
            session("2026-03-02", "1045-1130"),
        ];

        let added = newly_added_sessions(&requested, &existing, therapist_id);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].slot_id, "1045-1130");

        // A different therapist makes every triple new.
        let added = newly_added_sessions(&requested, &existing, Uuid::new_v4());
        assert_eq!(added.len(), 2);
    }
}
