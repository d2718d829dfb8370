use crate::apis::macau_ticket::{self, DetailPayload, RawListingItem};
use crate::app::ports::PayloadExtractor;
use crate::config::IngestConfig;
use crate::error::{FetchError, IngestError};
use crate::normalize::EventNormalizer;
use crate::storage::EventStore;
use crate::types::*;
use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Items read from the listing page
#[derive(Debug)]
struct Listing {
    /// Entries on the page, including ones that could not be read
    found: usize,
    items: Vec<RawListingItem>,
}

/// Runs one ingest pass: listing, per-item details, normalize, upsert, log.
///
/// Items are processed strictly one after another with a fixed delay before
/// every detail request. Only a missing source or a failed listing fetch
/// aborts the run; everything else is recorded and skipped past.
pub struct IngestRunner {
    config: IngestConfig,
    extractor: Arc<dyn PayloadExtractor>,
    store: Arc<dyn EventStore>,
    normalizer: EventNormalizer,
}

impl IngestRunner {
    pub fn new(
        config: IngestConfig,
        extractor: Arc<dyn PayloadExtractor>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        let normalizer = EventNormalizer::from_config(&config);
        Self {
            config,
            extractor,
            store,
            normalizer,
        }
    }

    #[instrument(skip(self), fields(source = %self.config.source_name))]
    pub async fn run(&self) -> Result<RunSummary, IngestError> {
        counter!("ingest_runs_total").increment(1);
        let t_run = Instant::now();

        let source_id = self
            .store
            .find_source_by_name(&self.config.source_name)
            .await?
            .ok_or_else(|| IngestError::SourceNotConfigured {
                name: self.config.source_name.clone(),
            })?;

        let run_id = self.store.create_run(source_id, Utc::now()).await?;
        info!("Started run {} for source {}", run_id, source_id);

        info!("Fetching listing: {}", self.config.listing_url);
        let listing = match self.fetch_listing().await {
            Ok(listing) => listing,
            Err(e) => {
                error!("Listing fetch failed, aborting run: {}", e);
                let fin = RunFinalization {
                    finished_at: Utc::now(),
                    status: RunStatus::Failed,
                    events_found: 0,
                    events_upserted: 0,
                    errors_count: 0,
                    notes: json!({ "error": e.to_string() }),
                };
                if let Err(store_err) = self.store.finalize_run(run_id, &fin).await {
                    error!("Could not record failed run {}: {}", run_id, store_err);
                }
                counter!("ingest_runs_failed_total").increment(1);
                return Err(IngestError::ListingFetch(e));
            }
        };
        info!("Found {} events on listing page", listing.found);

        let to_process: Vec<&RawListingItem> = listing
            .items
            .iter()
            .take(self.config.max_items_per_run)
            .collect();
        let total = to_process.len();

        let mut upserted = 0usize;
        let mut skipped = 0usize;
        let mut error_log: Vec<ErrorRecord> = Vec::new();

        for (i, item) in to_process.into_iter().enumerate() {
            tokio::time::sleep(self.config.request_delay()).await;

            let detail_url = self.normalizer.programme_url(&item.code);
            info!(
                "[{}/{}] {} - {}",
                i + 1,
                total,
                item.code,
                item.name.as_deref().unwrap_or_default().chars().take(50).collect::<String>()
            );

            let detail = match self.fetch_detail(&detail_url).await {
                Ok(detail) => Some(detail),
                Err(e) => {
                    warn!("Detail fetch failed for {}: {}", item.code, e);
                    error_log.push(ErrorRecord {
                        source_id,
                        run_id,
                        url: e.url().to_string(),
                        error_type: ErrorType::FetchError,
                        message: e.to_string(),
                    });
                    None
                }
            };

            let event = self.normalizer.normalize(item, detail.as_ref(), source_id);

            let Some(start_at) = event.start_at else {
                info!(
                    "Skipping {}: no parseable date ({:?})",
                    item.code,
                    item.show_date.as_deref().unwrap_or_default()
                );
                skipped += 1;
                continue;
            };

            match self.store.upsert_event(&event).await {
                Ok(()) => {
                    upserted += 1;
                    debug!("Upserted {} @ {}", event.title, start_at);
                }
                Err(e) => {
                    warn!("Upsert error for {}: {}", item.code, e);
                    error_log.push(ErrorRecord {
                        source_id,
                        run_id,
                        url: detail_url,
                        error_type: ErrorType::UpsertError,
                        message: e.to_string(),
                    });
                }
            }
        }

        let errors_count = error_log.len();
        if !error_log.is_empty() {
            if let Err(e) = self.store.append_errors(&error_log).await {
                error!("Failed to write {} error records: {}", errors_count, e);
            }
        }

        let status = RunStatus::from_counts(upserted, errors_count);
        let fin = RunFinalization {
            finished_at: Utc::now(),
            status,
            events_found: listing.found,
            events_upserted: upserted,
            errors_count,
            notes: json!({
                "max_items_per_run": self.config.max_items_per_run,
                "items_processed": total,
                "skipped_no_date": skipped,
            }),
        };
        self.store.finalize_run(run_id, &fin).await?;

        counter!("ingest_events_upserted_total").increment(upserted as u64);
        counter!("ingest_item_errors_total").increment(errors_count as u64);
        histogram!("ingest_run_duration_seconds").record(t_run.elapsed().as_secs_f64());

        info!(
            "Run {} finished as {}: found {}, upserted {}, skipped {}, errors {}",
            run_id,
            status.as_str(),
            listing.found,
            upserted,
            skipped,
            errors_count
        );

        Ok(RunSummary {
            run_id,
            status,
            events_found: listing.found,
            events_upserted: upserted,
            events_skipped: skipped,
            errors_count,
        })
    }

    /// Fetch and normalize the first `limit` listing items without writing
    /// anything. Events carry a nil source id.
    #[instrument(skip(self))]
    pub async fn preview(&self, limit: usize) -> Result<Vec<CanonicalEvent>, IngestError> {
        let listing = self.fetch_listing().await.map_err(IngestError::ListingFetch)?;
        info!("Previewing {} of {} listed events", limit.min(listing.items.len()), listing.found);

        let mut events = Vec::new();
        for item in listing.items.iter().take(limit) {
            tokio::time::sleep(self.config.request_delay()).await;
            let detail_url = self.normalizer.programme_url(&item.code);
            let detail = match self.fetch_detail(&detail_url).await {
                Ok(detail) => Some(detail),
                Err(e) => {
                    warn!("Detail fetch failed for {}: {}", item.code, e);
                    None
                }
            };
            events.push(self.normalizer.normalize(item, detail.as_ref(), Uuid::nil()));
        }
        Ok(events)
    }

    async fn fetch_listing(&self) -> Result<Listing, FetchError> {
        let url = &self.config.listing_url;
        let next_data = self.extractor.fetch(url).await?;
        let entries = macau_ticket::show_list(&next_data).ok_or_else(|| FetchError::Extraction {
            url: url.clone(),
            reason: "showListData missing from page props".to_string(),
        })?;
        Ok(Listing {
            found: entries.len(),
            items: macau_ticket::listing_items(entries),
        })
    }

    async fn fetch_detail(&self, url: &str) -> Result<DetailPayload, FetchError> {
        let next_data = self.extractor.fetch(url).await?;
        Ok(DetailPayload::from_next_data(&next_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;

    /// Serves canned `__NEXT_DATA__` documents by URL; unknown URLs 404.
    struct CannedPages(HashMap<String, Value>);

    #[async_trait]
    impl PayloadExtractor for CannedPages {
        async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
            self.0.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn config() -> IngestConfig {
        IngestConfig {
            listing_url: "https://t.test/en".into(),
            detail_base_url: "https://t.test/en/programme".into(),
            request_delay_ms: 0,
            max_items_per_run: 2,
            ..IngestConfig::default()
        }
    }

    fn pages() -> CannedPages {
        let mut pages = HashMap::new();
        pages.insert(
            "https://t.test/en".to_string(),
            json!({"props": {"pageProps": {"showListData": [
                {"ProCode": "A", "ProName1": "One", "ShowDate": "2026/02/25 19:45"},
                {"ProCode": "B", "ProName1": "Two", "ShowDate": "2026/03/01"},
                {"ProCode": "C", "ProName1": "Three", "ShowDate": "2026/03/02"}
            ]}}}),
        );
        pages.insert(
            "https://t.test/en/programme/A".to_string(),
            json!({"props": {"pageProps": {"proList": {"ProListData": [{"VenueName": "Hall"}]}}}}),
        );
        pages.insert("https://t.test/en/programme/B".to_string(), json!({"props": {"pageProps": {}}}));
        CannedPages(pages)
    }

    #[tokio::test]
    async fn cap_limits_items_processed_but_not_found() {
        let store = InMemoryStore::new();
        store.register_source(&config().source_name);
        let runner = IngestRunner::new(config(), Arc::new(pages()), Arc::new(store.clone()));

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.events_found, 3);
        assert_eq!(summary.events_upserted, 2);
        assert_eq!(summary.status, RunStatus::Success);

        let run = store.run(summary.run_id).unwrap();
        assert_eq!(run.notes["items_processed"], json!(2));
        assert_eq!(run.notes["max_items_per_run"], json!(2));
    }

    #[tokio::test]
    async fn missing_source_aborts_before_any_run_record() {
        let store = InMemoryStore::new();
        let runner = IngestRunner::new(config(), Arc::new(pages()), Arc::new(store.clone()));

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, IngestError::SourceNotConfigured { .. }));
        assert!(store.runs().is_empty());
    }

    #[tokio::test]
    async fn listing_without_show_list_is_fatal() {
        let store = InMemoryStore::new();
        store.register_source(&config().source_name);
        let mut canned = HashMap::new();
        canned.insert("https://t.test/en".to_string(), json!({"props": {"pageProps": {}}}));
        let runner = IngestRunner::new(config(), Arc::new(CannedPages(canned)), Arc::new(store.clone()));

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, IngestError::ListingFetch(FetchError::Extraction { .. })));
        let runs = store.runs();
        assert_eq!(runs[0].status, Some(RunStatus::Failed));
        assert!(runs[0].notes["error"].as_str().unwrap().contains("showListData"));
    }

    #[tokio::test]
    async fn preview_normalizes_without_writing() {
        let store = InMemoryStore::new();
        let runner = IngestRunner::new(config(), Arc::new(pages()), Arc::new(store.clone()));

        let events = runner.preview(3).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].venue_name.as_deref(), Some("Hall"));
        assert_eq!(events[2].venue_name, None);
        assert!(events.iter().all(|e| e.source_id == Uuid::nil()));
        assert!(store.events().is_empty());
        assert!(store.runs().is_empty());
    }
}
