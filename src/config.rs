use crate::constants;
use crate::error::{Result, ScraperError};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Everything the runner needs, passed in explicitly at construction.
///
/// Values are layered: built-in defaults, then an optional TOML file, then
/// `INGEST_*` environment variables (a `.env` file is honored).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub source_name: String,
    pub listing_url: String,
    pub detail_base_url: String,
    pub request_delay_ms: u64,
    pub max_items_per_run: usize,
    pub timezone_offset_hours: i32,
    pub timezone_name: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub city: String,
    pub country: String,
    pub currency: String,
    pub database_path: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_name: constants::SOURCE_NAME.to_string(),
            listing_url: constants::LISTING_URL.to_string(),
            detail_base_url: constants::DETAIL_BASE_URL.to_string(),
            request_delay_ms: constants::REQUEST_DELAY_MS,
            max_items_per_run: constants::MAX_ITEMS_PER_RUN,
            timezone_offset_hours: constants::TIMEZONE_OFFSET_HOURS,
            timezone_name: constants::TIMEZONE_NAME.to_string(),
            user_agent: constants::USER_AGENT.to_string(),
            request_timeout_secs: constants::REQUEST_TIMEOUT_SECS,
            city: constants::CITY.to_string(),
            country: constants::COUNTRY.to_string(),
            currency: constants::CURRENCY.to_string(),
            database_path: PathBuf::from(constants::DEFAULT_DATABASE_PATH),
        }
    }
}

impl IngestConfig {
    /// Load configuration from `path`, or from `ingest.toml` when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(constants::DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(constants::DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: IngestConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `INGEST_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("INGEST_LISTING_URL") {
            self.listing_url = v;
        }
        if let Some(v) = lookup("INGEST_DETAIL_BASE_URL") {
            self.detail_base_url = v;
        }
        if let Some(v) = lookup("INGEST_REQUEST_DELAY_MS") {
            self.request_delay_ms = parse_env("INGEST_REQUEST_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("INGEST_MAX_ITEMS_PER_RUN") {
            self.max_items_per_run = parse_env("INGEST_MAX_ITEMS_PER_RUN", &v)?;
        }
        if let Some(v) = lookup("INGEST_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_name.trim().is_empty() {
            return Err(ScraperError::Config("source_name must not be empty".into()));
        }
        if self.checked_offset().is_none() {
            return Err(ScraperError::Config(format!(
                "timezone_offset_hours out of range: {}",
                self.timezone_offset_hours
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> FixedOffset {
        self.checked_offset().unwrap_or_else(|| Utc.fix())
    }

    fn checked_offset(&self) -> Option<FixedOffset> {
        self.timezone_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScraperError::Config(format!("{key} has invalid value '{value}'")))
}
