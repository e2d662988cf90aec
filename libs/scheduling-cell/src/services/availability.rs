use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use therapist_cell::TherapistService;

use crate::dates::{display_key, iso_string, parse_iso_date};
use crate::models::{AvailabilityReport, BookingSessionRow, DayAvailability, SchedulingError};
use crate::slots;

/// Builds the per-day availability picture: a staffing ceiling from the
/// active therapist directory and a booked view scanned live from the
/// denormalized booking session rows. Daily capacity counts are a
/// separate planning concept and are not consulted here.
pub struct AvailabilityService {
    db: Arc<PostgrestClient>,
    directory: TherapistService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
            directory: TherapistService::new(config),
        }
    }

    /// Report over the inclusive `[from, to]` range, optionally narrowed
    /// to one therapist. Keys are display dates (`DD-MM-YYYY`); an
    /// unknown or inactive therapist filter yields days with zero totals
    /// rather than an error.
    pub async fn report(
        &self,
        from: &str,
        to: &str,
        therapist_id: Option<Uuid>,
    ) -> Result<AvailabilityReport, SchedulingError> {
        let start = parse_iso_date(from)?;
        let end = parse_iso_date(to)?;

        let mut therapists = self
            .directory
            .list_active_directory()
            .await
            .map_err(|e| SchedulingError::DependencyFailure(e.to_string()))?;

        if let Some(id) = therapist_id {
            therapists.retain(|t| t.id == id);
        }

        let mut report = AvailabilityReport::new();
        let mut day = start;
        while day <= end {
            let iso = iso_string(day);
            let on_duty = therapists
                .iter()
                .filter(|t| !t.holidays.contains(&iso))
                .count() as i64;
            report.insert(
                display_key(day),
                DayAvailability {
                    total_available_slots: on_duty * slots::normal_slot_count() as i64,
                    total_limited_available_slots: on_duty * slots::limited_slot_count() as i64,
                    ..DayAvailability::default()
                },
            );
            day = day + Duration::days(1);
        }

        if therapists.is_empty() {
            return Ok(report);
        }

        let code_by_id: BTreeMap<Uuid, String> = therapists
            .iter()
            .map(|t| (t.id, t.short_code.clone()))
            .collect();

        let id_filter = therapists
            .iter()
            .map(|t| t.id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let rows: Vec<BookingSessionRow> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/booking_sessions?date=gte.{}&date=lte.{}&therapistId=in.({})",
                    from, to, id_filter
                ),
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        debug!("Availability scan over {} session rows", rows.len());

        for row in rows {
            let Ok(date) = parse_iso_date(&row.date) else {
                continue;
            };
            let Some(day) = report.get_mut(&display_key(date)) else {
                continue;
            };
            // Short codes are keyed from the directory, never from the row.
            let Some(code) = code_by_id.get(&row.therapist_id) else {
                continue;
            };
            day.booked_by_therapist
                .entry(code.clone())
                .or_default()
                .insert(row.slot_id);
        }

        for day in report.values_mut() {
            let mut booked = 0i64;
            let mut limited_booked = 0i64;
            for slot_ids in day.booked_by_therapist.values() {
                for slot_id in slot_ids {
                    if slots::is_limited(slot_id) {
                        limited_booked += 1;
                    } else {
                        booked += 1;
                    }
                }
            }
            day.booked_slots = booked;
            day.limited_booked_slots = limited_booked;
        }

        Ok(report)
    }
}
