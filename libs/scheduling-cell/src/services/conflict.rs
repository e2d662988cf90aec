use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::ConflictingSlot;

use crate::dates::{display_key, iso_string, parse_iso_date};
use crate::models::{RequestedSession, SchedulingError};
use crate::services::AvailabilityService;

/// Answers "are these (date, slot) pairs free for this therapist?" by
/// aggregating the therapist's existing sessions over the requested
/// span. The short code must come from a directory resolution done by
/// the caller, never from client input.
pub struct ConflictService {
    availability: AvailabilityService,
}

impl ConflictService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            availability: AvailabilityService::new(config),
        }
    }

    /// All requested pairs already taken by the therapist. Empty means
    /// clear to book.
    pub async fn find_conflicts(
        &self,
        therapist_id: Uuid,
        short_code: &str,
        requested: &[RequestedSession],
    ) -> Result<Vec<ConflictingSlot>, SchedulingError> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let mut min_date: Option<NaiveDate> = None;
        let mut max_date: Option<NaiveDate> = None;
        for session in requested {
            let date = parse_iso_date(&session.date)?;
            min_date = Some(min_date.map_or(date, |d| d.min(date)));
            max_date = Some(max_date.map_or(date, |d| d.max(date)));
        }
        let (Some(from), Some(to)) = (min_date, max_date) else {
            return Ok(Vec::new());
        };

        let report = self
            .availability
            .report(&iso_string(from), &iso_string(to), Some(therapist_id))
            .await?;

        let mut conflicts = Vec::new();
        for session in requested {
            let date = parse_iso_date(&session.date)?;
            let taken = report
                .get(&display_key(date))
                .and_then(|day| day.booked_by_therapist.get(short_code))
                .map(|slot_ids| slot_ids.contains(&session.slot_id))
                .unwrap_or(false);
            if taken {
                conflicts.push(ConflictingSlot {
                    date: session.date.clone(),
                    slot_id: session.slot_id.clone(),
                });
            }
        }

        if !conflicts.is_empty() {
            debug!(
                "{} of {} requested slots already booked for {}",
                conflicts.len(),
                requested.len(),
                short_code
            );
        }

        Ok(conflicts)
    }

    /// Like `find_conflicts` but fails with the full offending list so
    /// booking flows abort with nothing partially written.
    pub async fn check(
        &self,
        therapist_id: Uuid,
        short_code: &str,
        requested: &[RequestedSession],
    ) -> Result<(), SchedulingError> {
        let conflicts = self
            .find_conflicts(therapist_id, short_code, requested)
            .await?;
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(SchedulingError::SlotConflict(conflicts))
        }
    }
}
