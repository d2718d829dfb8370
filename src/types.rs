use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SourceId = Uuid;
pub type RunId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Invalid,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Invalid => "invalid",
        }
    }
}

/// An event in the shared events store, keyed on `(source_id, source_event_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub source_id: SourceId,
    pub source_event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub timezone: String,
    pub venue_name: Option<String>,
    pub city: String,
    pub country: String,
    pub url: String,
    pub ticket_url: String,
    pub organizer_name: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub is_free: Option<bool>,
    pub currency: String,
    pub categories: Vec<String>,
    pub images: Vec<String>,
    pub status: EventStatus,
    /// Verbatim subset of the listing fields, kept for debugging and replay
    pub raw_data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    /// Terminal status for a run that got past the listing fetch.
    pub fn from_counts(events_upserted: usize, errors_count: usize) -> Self {
        if errors_count == 0 {
            RunStatus::Success
        } else if events_upserted > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunStatus::Failed)
    }
}

/// One row per invocation. `finished_at`/`status` stay empty until finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub source_id: SourceId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<RunStatus>,
    pub events_found: usize,
    pub events_upserted: usize,
    pub errors_count: usize,
    pub notes: serde_json::Value,
}

impl RunRecord {
    pub fn started(source_id: SourceId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            started_at,
            finished_at: None,
            status: None,
            events_found: 0,
            events_upserted: 0,
            errors_count: 0,
            notes: serde_json::Value::Null,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn apply(&mut self, fin: &RunFinalization) {
        self.finished_at = Some(fin.finished_at);
        self.status = Some(fin.status);
        self.events_found = fin.events_found;
        self.events_upserted = fin.events_upserted;
        self.errors_count = fin.errors_count;
        self.notes = fin.notes.clone();
    }
}

/// Fields written once when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFinalization {
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub events_found: usize,
    pub events_upserted: usize,
    pub errors_count: usize,
    pub notes: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    FetchError,
    UpsertError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::FetchError => "fetch_error",
            ErrorType::UpsertError => "upsert_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub source_id: SourceId,
    pub run_id: RunId,
    pub url: String,
    pub error_type: ErrorType,
    pub message: String,
}

/// What a completed run reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    pub events_found: usize,
    pub events_upserted: usize,
    pub events_skipped: usize,
    pub errors_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_from_counts() {
        assert_eq!(RunStatus::from_counts(0, 0), RunStatus::Success);
        assert_eq!(RunStatus::from_counts(4, 0), RunStatus::Success);
        assert_eq!(RunStatus::from_counts(2, 1), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(0, 3), RunStatus::Failed);
    }

    #[test]
    fn enums_serialize_as_store_strings() {
        assert_eq!(serde_json::to_string(&ErrorType::UpsertError).unwrap(), "\"upsert_error\"");
        assert_eq!(serde_json::to_string(&RunStatus::Partial).unwrap(), "\"partial\"");
        assert_eq!(serde_json::to_string(&EventStatus::Invalid).unwrap(), "\"invalid\"");
    }
}
