//! The fixed daily slot grid. Every clinic day is divided into the same
//! fifteen 45-minute slots with a half-hour gap after 13:45. Edge slots
//! (early morning, evening) are "limited": they default to zero capacity
//! and are only opened by hand for specific days.

use crate::models::SlotCapacity;

#[derive(Debug, Clone, Copy)]
pub struct SlotDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub limited: bool,
}

pub const SLOT_CATALOG: [SlotDefinition; 15] = [
    SlotDefinition { id: "0830-0915", label: "08:30 to 09:15", limited: true },
    SlotDefinition { id: "0915-1000", label: "09:15 to 10:00", limited: true },
    SlotDefinition { id: "1000-1045", label: "10:00 to 10:45", limited: false },
    SlotDefinition { id: "1045-1130", label: "10:45 to 11:30", limited: false },
    SlotDefinition { id: "1130-1215", label: "11:30 to 12:15", limited: false },
    SlotDefinition { id: "1215-1300", label: "12:15 to 13:00", limited: false },
    SlotDefinition { id: "1300-1345", label: "13:00 to 13:45", limited: false },
    SlotDefinition { id: "1415-1500", label: "14:15 to 15:00", limited: false },
    SlotDefinition { id: "1500-1545", label: "15:00 to 15:45", limited: false },
    SlotDefinition { id: "1545-1630", label: "15:45 to 16:30", limited: false },
    SlotDefinition { id: "1630-1715", label: "16:30 to 17:15", limited: false },
    SlotDefinition { id: "1715-1800", label: "17:15 to 18:00", limited: false },
    SlotDefinition { id: "1800-1845", label: "18:00 to 18:45", limited: true },
    SlotDefinition { id: "1845-1930", label: "18:45 to 19:30", limited: true },
    SlotDefinition { id: "1930-2015", label: "19:30 to 20:15", limited: true },
];

pub fn find_slot(slot_id: &str) -> Option<&'static SlotDefinition> {
    SLOT_CATALOG.iter().find(|slot| slot.id == slot_id)
}

/// Unknown slot ids count as normal; they only appear in historical rows
/// written before the grid was fixed.
pub fn is_limited(slot_id: &str) -> bool {
    find_slot(slot_id).map(|slot| slot.limited).unwrap_or(false)
}

pub fn normal_slot_count() -> usize {
    SLOT_CATALOG.iter().filter(|slot| !slot.limited).count()
}

pub fn limited_slot_count() -> usize {
    SLOT_CATALOG.iter().filter(|slot| slot.limited).count()
}

/// Session list for an untouched day: every slot present, zero capacity.
pub fn blank_sessions() -> Vec<SlotCapacity> {
    SLOT_CATALOG
        .iter()
        .map(|slot| SlotCapacity {
            slot_id: slot.id.to_string(),
            label: slot.label.to_string(),
            limited: slot.limited,
            count: 0,
            booked: 0,
        })
        .collect()
}

/// Session list written by the capacity rollout: normal slots open at the
/// default capacity, limited slots stay closed. Booked counts reset to
/// zero because the tally is recomputed from booking records anyway.
pub fn rollout_sessions(default_capacity: i32) -> Vec<SlotCapacity> {
    SLOT_CATALOG
        .iter()
        .map(|slot| SlotCapacity {
            slot_id: slot.id.to_string(),
            label: slot.label.to_string(),
            limited: slot.limited,
            count: if slot.limited { 0 } else { default_capacity },
            booked: 0,
        })
        .collect()
}
