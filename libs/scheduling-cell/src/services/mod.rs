pub mod availability;
pub mod booking;
pub mod capacity;
pub mod conflict;
pub mod requests;

pub use availability::AvailabilityService;
pub use booking::BookingService;
pub use capacity::CapacityService;
pub use conflict::ConflictService;
pub use requests::BookingRequestService;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::SchedulingError;

pub(crate) fn parse_row<T: DeserializeOwned>(
    rows: Vec<Value>,
    context: &str,
) -> Result<T, SchedulingError> {
    rows.first()
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?
        .ok_or_else(|| SchedulingError::DatabaseError(format!("{} write returned no row", context)))
}
