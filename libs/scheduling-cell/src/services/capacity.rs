use std::sync::Arc;

use chrono::{Datelike, Duration, Utc, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::{merge_duplicates, return_representation, ApiFailure, PostgrestClient};

use crate::dates::{iso_string, parse_iso_date};
use crate::models::{DailyCapacity, RolloutSummary, SchedulingError, SetDayCountsRequest};
use crate::services::parse_row;
use crate::slots::{blank_sessions, rollout_sessions};

/// Per-day slot capacity rows in `daily_capacity`, plus the singleton
/// default used by the 14-day rollout. These numbers are planning
/// metadata; live availability is computed from booking session rows.
pub struct CapacityService {
    db: Arc<PostgrestClient>,
}

impl CapacityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    /// Fetch the row for a date, creating a blank 15-slot row on first
    /// read so the admin grid always has something to render.
    pub async fn get_day(&self, date: &str) -> Result<DailyCapacity, SchedulingError> {
        parse_iso_date(date)?;

        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/daily_capacity?date=eq.{}", date),
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if let Some(row) = rows.first() {
            return serde_json::from_value(row.clone())
                .map_err(|e| SchedulingError::DatabaseError(e.to_string()));
        }

        let blank = json!({
            "date": date,
            "sessions": blank_sessions(),
            "createdAt": Utc::now().to_rfc3339(),
        });

        let created: Result<Vec<Value>, _> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/daily_capacity",
                None,
                Some(blank),
                Some(return_representation()),
            )
            .await;

        match created {
            Ok(rows) => parse_row(rows, "daily capacity"),
            Err(e) => {
                // Lost a create race on the date index; the winner's row serves.
                if e.downcast_ref::<ApiFailure>()
                    .map(|f| f.is_unique_violation())
                    .unwrap_or(false)
                {
                    let rows: Vec<Value> = self
                        .db
                        .request(
                            Method::GET,
                            &format!("/rest/v1/daily_capacity?date=eq.{}", date),
                            None,
                            None,
                        )
                        .await
                        .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
                    parse_row(rows, "daily capacity")
                } else {
                    Err(SchedulingError::DatabaseError(e.to_string()))
                }
            }
        }
    }

    /// Overwrite configured counts for a day. `booked` stays untouched,
    /// unknown slot ids are skipped, and the whole update is rejected if
    /// any requested count would fall below what is already booked.
    pub async fn set_day_counts(
        &self,
        date: &str,
        request: SetDayCountsRequest,
    ) -> Result<DailyCapacity, SchedulingError> {
        for update in &request.sessions {
            if update.count < 0 {
                return Err(SchedulingError::InvalidOperation(format!(
                    "count for slot {} must be non-negative",
                    update.slot_id
                )));
            }
        }

        let mut day = self.get_day(date).await?;

        // Every floor is verified before anything is written, so a
        // rejection leaves the stored row exactly as it was.
        for update in &request.sessions {
            if let Some(existing) = day.sessions.iter().find(|s| s.slot_id == update.slot_id) {
                if update.count < existing.booked {
                    return Err(SchedulingError::InvalidOperation(format!(
                        "Cannot decrease count below current booked ({}) for slot {}",
                        existing.booked, update.slot_id
                    )));
                }
            }
        }

        for update in &request.sessions {
            if let Some(existing) = day.sessions.iter_mut().find(|s| s.slot_id == update.slot_id)
            {
                existing.count = update.count;
            }
        }

        let updated: Vec<Value> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/daily_capacity?date=eq.{}", date),
                None,
                Some(json!({
                    "sessions": day.sessions,
                    "updatedAt": Utc::now().to_rfc3339(),
                })),
                Some(return_representation()),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        parse_row(updated, "daily capacity")
    }

    /// Persist the global default and rewrite the next 14 days: normal
    /// slots open at the default, limited slots closed, booked reset to
    /// zero. Sundays keep whatever they already have. Overwrites any
    /// manual per-day tuning for the days it touches.
    pub async fn rollout_default_capacity(
        &self,
        default_capacity: i32,
    ) -> Result<RolloutSummary, SchedulingError> {
        if default_capacity < 0 {
            return Err(SchedulingError::InvalidOperation(
                "defaultCapacity must be a non-negative integer".to_string(),
            ));
        }

        let _: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/default_capacity_setting",
                None,
                Some(json!({
                    "id": 1,
                    "defaultCapacity": default_capacity,
                    "updatedAt": Utc::now().to_rfc3339(),
                })),
                Some(merge_duplicates()),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let today = Utc::now().date_naive();
        let mut days_written = 0;
        let mut sundays_skipped = 0;

        for offset in 1..=14 {
            let day = today + Duration::days(offset);
            if day.weekday() == Weekday::Sun {
                sundays_skipped += 1;
                continue;
            }

            let _: Vec<Value> = self
                .db
                .request_with_headers(
                    Method::POST,
                    "/rest/v1/daily_capacity",
                    None,
                    Some(json!({
                        "date": iso_string(day),
                        "sessions": rollout_sessions(default_capacity),
                        "updatedAt": Utc::now().to_rfc3339(),
                    })),
                    Some(merge_duplicates()),
                )
                .await
                .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
            days_written += 1;
        }

        info!(
            "Capacity rollout wrote {} days at default {} ({} Sundays untouched)",
            days_written, default_capacity, sundays_skipped
        );

        Ok(RolloutSummary {
            default_capacity,
            days_written,
            sundays_skipped,
        })
    }

    /// Inclusive range fetch, ascending by date. Days never touched have
    /// no row and are simply absent from the result.
    pub async fn get_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<DailyCapacity>, SchedulingError> {
        parse_iso_date(from)?;
        parse_iso_date(to)?;

        self.db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/daily_capacity?date=gte.{}&date=lte.{}&order=date.asc",
                    from, to
                ),
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))
    }

    /// The singleton default, 0 when never set.
    pub async fn get_default_capacity(&self) -> Result<i32, SchedulingError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/default_capacity_setting?id=eq.1",
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(rows
            .first()
            .and_then(|row| row["defaultCapacity"].as_i64())
            .unwrap_or(0) as i32)
    }
}
