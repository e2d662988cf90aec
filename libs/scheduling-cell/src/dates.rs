//! Date handling for the scheduling surface. Storage and request bodies
//! use ISO `YYYY-MM-DD`; the availability report keys days as
//! `DD-MM-YYYY` because that is what the admin dashboard renders.

use chrono::NaiveDate;
use regex::Regex;

use crate::models::SchedulingError;

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, SchedulingError> {
    let pattern = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    if !pattern.is_match(value) {
        return Err(SchedulingError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| SchedulingError::InvalidDate(value.to_string()))
}

/// Report key for a day, e.g. `03-03-2026`.
pub fn display_key(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

pub fn iso_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_date() {
        assert!(parse_iso_date("2026-03-01").is_ok());
        assert!(parse_iso_date("2026-02-29").is_err(), "2026 is not a leap year");
        assert!(parse_iso_date("01-03-2026").is_err());
        assert!(parse_iso_date("2026-3-1").is_err());
        assert!(parse_iso_date("garbage").is_err());
    }

    #[test]
    fn test_display_key_roundtrip() {
        let date = parse_iso_date("2026-03-09").unwrap();
        assert_eq!(display_key(date), "09-03-2026");
        assert_eq!(iso_string(date), "2026-03-09");
    }
}
