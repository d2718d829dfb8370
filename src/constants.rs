//! Source-wide constants. Everything here is a default; `IngestConfig` carries
//! the values actually used at runtime.

// Name of the row in `event_sources` this worker writes under
pub const SOURCE_NAME: &str = "MacauTicket.com (Kong Seng)";

pub const LISTING_URL: &str = "https://www.macauticket.com/TicketWeb2023/en";
pub const DETAIL_BASE_URL: &str = "https://www.macauticket.com/TicketWeb2023/en/programme";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

// ~1 req/sec politeness delay between detail fetches
pub const REQUEST_DELAY_MS: u64 = 1200;
pub const MAX_ITEMS_PER_RUN: usize = 60;
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// Macau: UTC+8, no daylight saving
pub const TIMEZONE_NAME: &str = "Asia/Macau";
pub const TIMEZONE_OFFSET_HOURS: i32 = 8;

pub const CITY: &str = "Macau";
pub const COUNTRY: &str = "MO";
pub const CURRENCY: &str = "HKD";

pub const UNTITLED: &str = "(untitled)";

pub const DEFAULT_CONFIG_PATH: &str = "ingest.toml";
pub const DEFAULT_DATABASE_PATH: &str = "data/events.db";
