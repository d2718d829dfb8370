use crate::error::{StoreError, StoreResult};
use crate::storage::EventStore;
use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS event_sources (
        id    TEXT PRIMARY KEY,
        name  TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS public_events (
        source_id        TEXT NOT NULL,
        source_event_id  TEXT NOT NULL,
        title            TEXT NOT NULL,
        description      TEXT,
        start_at         TEXT,
        end_at           TEXT,
        all_day          INTEGER NOT NULL,
        timezone         TEXT NOT NULL,
        venue_name       TEXT,
        city             TEXT NOT NULL,
        country          TEXT NOT NULL,
        url              TEXT NOT NULL,
        ticket_url       TEXT NOT NULL,
        organizer_name   TEXT,
        price_min        REAL,
        price_max        REAL,
        is_free          INTEGER,
        currency         TEXT NOT NULL,
        categories       TEXT NOT NULL,
        images           TEXT NOT NULL,
        status           TEXT NOT NULL,
        raw_data         TEXT NOT NULL,
        PRIMARY KEY (source_id, source_event_id)
    );
    CREATE TABLE IF NOT EXISTS public_event_source_runs (
        id               TEXT PRIMARY KEY,
        source_id        TEXT NOT NULL,
        started_at       TEXT NOT NULL,
        finished_at      TEXT,
        status           TEXT,
        events_found     INTEGER NOT NULL DEFAULT 0,
        events_upserted  INTEGER NOT NULL DEFAULT 0,
        errors_count     INTEGER NOT NULL DEFAULT 0,
        notes            TEXT
    );
    CREATE TABLE IF NOT EXISTS public_event_ingest_errors (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id   TEXT NOT NULL,
        run_id      TEXT NOT NULL,
        url         TEXT NOT NULL,
        error_type  TEXT NOT NULL,
        message     TEXT NOT NULL
    );
"#;

/// SQLite-backed event store. Tables are created on open if missing.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Rejected(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened event store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Rejected("connection lock poisoned".to_string()))
    }

    /// Seed a source row, returning the existing id if the name is known.
    pub fn register_source(&self, name: &str) -> StoreResult<SourceId> {
        let conn = self.conn()?;
        if let Some(id) = find_source(&conn, name)? {
            return Ok(id);
        }
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO event_sources (id, name) VALUES (?1, ?2)",
            params![id.to_string(), name],
        )?;
        info!("Registered source '{}' as {}", name, id);
        Ok(id)
    }

    pub fn count_events(&self) -> StoreResult<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM public_events", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn event_title(&self, source_id: SourceId, source_event_id: &str) -> StoreResult<Option<String>> {
        let title = self
            .conn()?
            .query_row(
                "SELECT title FROM public_events WHERE source_id = ?1 AND source_event_id = ?2",
                params![source_id.to_string(), source_event_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(title)
    }

    pub fn count_errors(&self, run_id: RunId) -> StoreResult<usize> {
        let n: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM public_event_ingest_errors WHERE run_id = ?1",
            params![run_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    pub fn run_status(&self, run_id: RunId) -> StoreResult<Option<RunStatus>> {
        let status: Option<Option<String>> = self
            .conn()?
            .query_row(
                "SELECT status FROM public_event_source_runs WHERE id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.flatten().as_deref().and_then(parse_run_status))
    }
}

fn find_source(conn: &Connection, name: &str) -> StoreResult<Option<SourceId>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM event_sources WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    id.map(|s| {
        Uuid::parse_str(&s).map_err(|e| StoreError::Rejected(format!("bad source id '{s}': {e}")))
    })
    .transpose()
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_run_status(s: &str) -> Option<RunStatus> {
    match s {
        "success" => Some(RunStatus::Success),
        "partial" => Some(RunStatus::Partial),
        "failed" => Some(RunStatus::Failed),
        _ => None,
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn find_source_by_name(&self, name: &str) -> StoreResult<Option<SourceId>> {
        find_source(&*self.conn()?, name)
    }

    async fn upsert_event(&self, event: &CanonicalEvent) -> StoreResult<()> {
        let categories = serde_json::to_string(&event.categories)?;
        let images = serde_json::to_string(&event.images)?;
        let raw_data = serde_json::to_string(&event.raw_data)?;

        self.conn()?.execute(
            "INSERT INTO public_events (
                source_id, source_event_id, title, description, start_at, end_at, all_day,
                timezone, venue_name, city, country, url, ticket_url, organizer_name,
                price_min, price_max, is_free, currency, categories, images, status, raw_data
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
             ON CONFLICT(source_id, source_event_id) DO UPDATE SET
                title=excluded.title, description=excluded.description,
                start_at=excluded.start_at, end_at=excluded.end_at, all_day=excluded.all_day,
                timezone=excluded.timezone, venue_name=excluded.venue_name, city=excluded.city,
                country=excluded.country, url=excluded.url, ticket_url=excluded.ticket_url,
                organizer_name=excluded.organizer_name, price_min=excluded.price_min,
                price_max=excluded.price_max, is_free=excluded.is_free, currency=excluded.currency,
                categories=excluded.categories, images=excluded.images, status=excluded.status,
                raw_data=excluded.raw_data",
            params![
                event.source_id.to_string(),
                event.source_event_id,
                event.title,
                event.description,
                event.start_at.as_ref().map(timestamp),
                event.end_at.as_ref().map(timestamp),
                event.all_day,
                event.timezone,
                event.venue_name,
                event.city,
                event.country,
                event.url,
                event.ticket_url,
                event.organizer_name,
                event.price_min,
                event.price_max,
                event.is_free,
                event.currency,
                categories,
                images,
                event.status.as_str(),
                raw_data,
            ],
        )?;
        debug!("Upserted event {}", event.source_event_id);
        Ok(())
    }

    async fn create_run(&self, source_id: SourceId, started_at: DateTime<Utc>) -> StoreResult<RunId> {
        let id = Uuid::new_v4();
        self.conn()?.execute(
            "INSERT INTO public_event_source_runs (id, source_id, started_at) VALUES (?1, ?2, ?3)",
            params![id.to_string(), source_id.to_string(), timestamp(&started_at)],
        )?;
        debug!("Created run {}", id);
        Ok(id)
    }

    async fn finalize_run(&self, run_id: RunId, fin: &RunFinalization) -> StoreResult<()> {
        let conn = self.conn()?;
        let finished_at: Option<Option<String>> = conn
            .query_row(
                "SELECT finished_at FROM public_event_source_runs WHERE id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match finished_at {
            None => return Err(StoreError::RunNotFound(run_id)),
            Some(Some(_)) => return Err(StoreError::RunAlreadyFinalized(run_id)),
            Some(None) => {}
        }

        conn.execute(
            "UPDATE public_event_source_runs
             SET finished_at = ?2, status = ?3, events_found = ?4, events_upserted = ?5,
                 errors_count = ?6, notes = ?7
             WHERE id = ?1",
            params![
                run_id.to_string(),
                timestamp(&fin.finished_at),
                fin.status.as_str(),
                fin.events_found as i64,
                fin.events_upserted as i64,
                fin.errors_count as i64,
                serde_json::to_string(&fin.notes)?,
            ],
        )?;
        debug!("Finalized run {} as {}", run_id, fin.status.as_str());
        Ok(())
    }

    async fn append_errors(&self, records: &[ErrorRecord]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO public_event_ingest_errors (source_id, run_id, url, error_type, message)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.source_id.to_string(),
                    record.run_id.to_string(),
                    record.url,
                    record.error_type.as_str(),
                    record.message,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Appended {} error records", records.len());
        Ok(())
    }
}
