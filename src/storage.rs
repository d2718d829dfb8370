use crate::error::{StoreError, StoreResult};
use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// The events store as seen by the ingest worker.
///
/// Every method reports failure as a value; the runner decides which ones
/// are fatal. `upsert_event` must be idempotent on
/// `(source_id, source_event_id)`.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_source_by_name(&self, name: &str) -> StoreResult<Option<SourceId>>;

    async fn upsert_event(&self, event: &CanonicalEvent) -> StoreResult<()>;

    // Run log
    async fn create_run(&self, source_id: SourceId, started_at: DateTime<Utc>) -> StoreResult<RunId>;
    async fn finalize_run(&self, run_id: RunId, fin: &RunFinalization) -> StoreResult<()>;

    // Error log, append-only
    async fn append_errors(&self, records: &[ErrorRecord]) -> StoreResult<()>;
}

/// In-memory store for tests and `--in-memory` runs
#[derive(Clone, Default)]
pub struct InMemoryStore {
    sources: Arc<Mutex<HashMap<String, SourceId>>>,
    events: Arc<Mutex<HashMap<(SourceId, String), CanonicalEvent>>>,
    runs: Arc<Mutex<HashMap<RunId, RunRecord>>>,
    errors: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a source row, returning the existing id if the name is known.
    pub fn register_source(&self, name: &str) -> SourceId {
        let mut sources = match self.sources.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sources.entry(name.to_string()).or_insert_with(Uuid::new_v4)
    }

    pub fn events(&self) -> Vec<CanonicalEvent> {
        let mut events: Vec<CanonicalEvent> = lock(&self.events)
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default();
        events.sort_by(|a, b| a.source_event_id.cmp(&b.source_event_id));
        events
    }

    pub fn event(&self, source_id: SourceId, source_event_id: &str) -> Option<CanonicalEvent> {
        lock(&self.events)
            .ok()?
            .get(&(source_id, source_event_id.to_string()))
            .cloned()
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        let mut runs: Vec<RunRecord> = lock(&self.runs)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    pub fn run(&self, run_id: RunId) -> Option<RunRecord> {
        lock(&self.runs).ok()?.get(&run_id).cloned()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        lock(&self.errors).map(|e| e.clone()).unwrap_or_default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Rejected("store lock poisoned".to_string()))
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn find_source_by_name(&self, name: &str) -> StoreResult<Option<SourceId>> {
        Ok(lock(&self.sources)?.get(name).copied())
    }

    async fn upsert_event(&self, event: &CanonicalEvent) -> StoreResult<()> {
        let key = (event.source_id, event.source_event_id.clone());
        let replaced = lock(&self.events)?.insert(key, event.clone()).is_some();
        debug!(
            "{} event {} for source {}",
            if replaced { "Replaced" } else { "Inserted" },
            event.source_event_id,
            event.source_id
        );
        Ok(())
    }

    async fn create_run(&self, source_id: SourceId, started_at: DateTime<Utc>) -> StoreResult<RunId> {
        let run = RunRecord::started(source_id, started_at);
        let id = run.id;
        lock(&self.runs)?.insert(id, run);
        debug!("Created run {}", id);
        Ok(id)
    }

    async fn finalize_run(&self, run_id: RunId, fin: &RunFinalization) -> StoreResult<()> {
        let mut runs = lock(&self.runs)?;
        let run = runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;
        if run.is_finalized() {
            return Err(StoreError::RunAlreadyFinalized(run_id));
        }
        run.apply(fin);
        debug!("Finalized run {} as {}", run_id, fin.status.as_str());
        Ok(())
    }

    async fn append_errors(&self, records: &[ErrorRecord]) -> StoreResult<()> {
        lock(&self.errors)?.extend_from_slice(records);
        debug!("Appended {} error records", records.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(source_id: SourceId, code: &str, title: &str) -> CanonicalEvent {
        CanonicalEvent {
            source_id,
            source_event_id: code.to_string(),
            title: title.to_string(),
            description: None,
            start_at: Some(Utc::now()),
            end_at: None,
            all_day: false,
            timezone: "Asia/Macau".into(),
            venue_name: None,
            city: "Macau".into(),
            country: "MO".into(),
            url: format!("https://example.test/{code}"),
            ticket_url: format!("https://example.test/{code}"),
            organizer_name: None,
            price_min: None,
            price_max: None,
            is_free: None,
            currency: "HKD".into(),
            categories: vec![],
            images: vec![],
            status: EventStatus::Active,
            raw_data: json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_same_key_keeps_one_row_with_latest_title() {
        let store = InMemoryStore::new();
        let source = store.register_source("src");
        store.upsert_event(&event(source, "P1", "First")).await.unwrap();
        store.upsert_event(&event(source, "P1", "Second")).await.unwrap();

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Second");
    }

    #[tokio::test]
    async fn same_code_under_other_source_is_distinct() {
        let store = InMemoryStore::new();
        let a = store.register_source("a");
        let b = store.register_source("b");
        store.upsert_event(&event(a, "P1", "A")).await.unwrap();
        store.upsert_event(&event(b, "P1", "B")).await.unwrap();
        assert_eq!(store.events().len(), 2);
    }

    #[tokio::test]
    async fn register_source_is_idempotent() {
        let store = InMemoryStore::new();
        let id = store.register_source("src");
        assert_eq!(store.register_source("src"), id);
        assert_eq!(store.find_source_by_name("src").await.unwrap(), Some(id));
        assert_eq!(store.find_source_by_name("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn run_is_finalized_once() {
        let store = InMemoryStore::new();
        let source = store.register_source("src");
        let run_id = store.create_run(source, Utc::now()).await.unwrap();
        assert!(!store.run(run_id).unwrap().is_finalized());

        let fin = RunFinalization {
            finished_at: Utc::now(),
            status: RunStatus::Success,
            events_found: 2,
            events_upserted: 2,
            errors_count: 0,
            notes: json!({}),
        };
        store.finalize_run(run_id, &fin).await.unwrap();
        assert_eq!(store.run(run_id).unwrap().status, Some(RunStatus::Success));

        let again = store.finalize_run(run_id, &fin).await;
        assert!(matches!(again, Err(StoreError::RunAlreadyFinalized(id)) if id == run_id));
    }

    #[tokio::test]
    async fn finalizing_unknown_run_fails() {
        let store = InMemoryStore::new();
        let fin = RunFinalization {
            finished_at: Utc::now(),
            status: RunStatus::Failed,
            events_found: 0,
            events_upserted: 0,
            errors_count: 0,
            notes: json!(null),
        };
        assert!(matches!(
            store.finalize_run(Uuid::new_v4(), &fin).await,
            Err(StoreError::RunNotFound(_))
        ));
    }
}
