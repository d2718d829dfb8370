use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use macau_ingest::app::ports::PayloadExtractor;
use macau_ingest::config::IngestConfig;
use macau_ingest::db::SqliteStore;
use macau_ingest::error::FetchError;
use macau_ingest::pipeline::IngestRunner;
use macau_ingest::types::RunStatus;

/// Listing with two dated items whose detail pages always vanish.
struct DetailLessSource {
    title: &'static str,
}

#[async_trait]
impl PayloadExtractor for DetailLessSource {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        if url == "https://tickets.test/en" {
            return Ok(json!({"props": {"pageProps": {"showListData": [
                {"ProCode": "S1", "ProName1": self.title, "ShowDate": "2026/05/01 20:00"},
                {"ProCode": "S2", "ProName1": "Matinee", "ShowDate": "2026/05/02"}
            ]}}}));
        }
        Err(FetchError::Extraction {
            url: url.to_string(),
            reason: "__NEXT_DATA__ script tag not found".into(),
        })
    }
}

fn config(db: &std::path::Path) -> IngestConfig {
    IngestConfig {
        listing_url: "https://tickets.test/en".into(),
        detail_base_url: "https://tickets.test/en/programme".into(),
        request_delay_ms: 0,
        database_path: db.to_path_buf(),
        ..IngestConfig::default()
    }
}

#[tokio::test]
async fn sqlite_run_records_events_run_and_errors() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir.path().join("events.db"));
    let store = Arc::new(SqliteStore::open(&cfg.database_path).unwrap());
    let source_id = store.register_source(&cfg.source_name).unwrap();

    let runner = IngestRunner::new(cfg, Arc::new(DetailLessSource { title: "Opening" }), store.clone());
    let summary = runner.run().await.unwrap();

    assert_eq!(summary.status, RunStatus::Partial);
    assert_eq!(summary.events_upserted, 2);
    assert_eq!(summary.errors_count, 2);
    assert_eq!(store.count_events().unwrap(), 2);
    assert_eq!(store.count_errors(summary.run_id).unwrap(), 2);
    assert_eq!(store.run_status(summary.run_id).unwrap(), Some(RunStatus::Partial));
    assert_eq!(store.event_title(source_id, "S1").unwrap().as_deref(), Some("Opening"));
}

#[tokio::test]
async fn sqlite_rerun_keeps_one_row_with_latest_title() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir.path().join("events.db"));
    let store = Arc::new(SqliteStore::open(&cfg.database_path).unwrap());
    let source_id = store.register_source(&cfg.source_name).unwrap();

    IngestRunner::new(cfg.clone(), Arc::new(DetailLessSource { title: "Opening" }), store.clone())
        .run()
        .await
        .unwrap();
    IngestRunner::new(cfg, Arc::new(DetailLessSource { title: "Opening (rescheduled)" }), store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(store.count_events().unwrap(), 2);
    assert_eq!(
        store.event_title(source_id, "S1").unwrap().as_deref(),
        Some("Opening (rescheduled)")
    );
}
