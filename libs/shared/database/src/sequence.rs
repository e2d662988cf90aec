use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, Utc};
use serde_json::json;
use tracing::debug;

use crate::postgrest::PostgrestClient;

/// Named counters backing the human-readable entity codes. Each maps to
/// one row in the `counters` table; allocation happens in a single
/// `next_sequence` rpc so concurrent callers can never observe the same
/// value. Aborted operations leave gaps, never reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Patient,
    Appointment,
    Lead,
    Therapist,
    Payment,
    Request,
}

impl SequenceKind {
    pub fn counter_name(&self) -> &'static str {
        match self {
            SequenceKind::Patient => "patient",
            SequenceKind::Appointment => "appointment",
            SequenceKind::Lead => "lead",
            SequenceKind::Therapist => "therapist",
            SequenceKind::Payment => "payment",
            SequenceKind::Request => "request",
        }
    }

    pub fn format_code(&self, seq: i64) -> String {
        self.format_code_for_year(seq, Utc::now().year())
    }

    fn format_code_for_year(&self, seq: i64, year: i32) -> String {
        match self {
            SequenceKind::Patient => format!("P{:04}", seq),
            SequenceKind::Appointment => format!("APT{:06}", seq),
            SequenceKind::Lead => format!("L{:05}", seq),
            SequenceKind::Therapist => format!("NPL{:03}", seq),
            SequenceKind::Payment => format!("INV-{}-{:05}", year, seq),
            SequenceKind::Request => format!("REQ{:05}", seq),
        }
    }
}

pub struct SequenceAllocator {
    db: Arc<PostgrestClient>,
}

impl SequenceAllocator {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    /// Increments the named counter and returns the formatted code for the
    /// new value. First allocation of a counter yields 1.
    pub async fn next_code(&self, kind: SequenceKind) -> Result<String> {
        let seq: i64 = self
            .db
            .rpc(
                "next_sequence",
                json!({ "counter_name": kind.counter_name() }),
            )
            .await?;

        let code = kind.format_code(seq);
        debug!("Allocated {} -> {}", kind.counter_name(), code);
        Ok(code)
    }
}
