use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})/(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{2})").expect("datetime pattern")
});
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})/(\d{1,2})/(\d{1,2})").expect("date pattern"));
static SHOWING_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+&\s+").expect("showing separator pattern"));

// Matched case-insensitively anywhere in the text ("Please See The Below", "TBD")
const PLACEHOLDER_TOKENS: &[&str] = &["please", "see", "below", "tbd"];

/// Canonical timing for an event. All fields empty means "no usable date".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateInfo {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub all_day: bool,
}

impl DateInfo {
    fn timed(start_at: DateTime<Utc>) -> Self {
        Self {
            start_at: Some(start_at),
            end_at: None,
            all_day: false,
        }
    }

    fn all_day(start_at: DateTime<Utc>) -> Self {
        Self {
            start_at: Some(start_at),
            end_at: Some(start_at + Duration::hours(24)),
            all_day: true,
        }
    }
}

/// Convert a source date string to UTC, reading wall-clock values in `offset`.
///
/// Shapes seen on the source:
///   "2026/02/25 19:45"                     single showing
///   "2026/02/25 19:45 & 2026/02/26 15:00"  several showings, first one kept
///   "2026/02/19 - 2026/02/24"              run of days, first day, all day
///   "2026/02/19"                           all day
///   "Please See The Below", "TBD", "--"    no date
///
/// Anything else yields an empty `DateInfo`; that is a skip, not an error.
pub fn normalize_date(text: &str, offset: FixedOffset) -> DateInfo {
    let text = text.trim();
    if is_placeholder(text) {
        return DateInfo::default();
    }

    let first = first_segment(text);

    if let Some(caps) = DATETIME_RE.captures(first) {
        let parsed = ymd(&caps[1], &caps[2], &caps[3])
            .zip(hm(&caps[4], &caps[5]))
            .and_then(|(date, time)| to_utc(date.and_time(time), offset));
        return parsed.map(DateInfo::timed).unwrap_or_default();
    }

    if let Some(caps) = DATE_RE.captures(first) {
        let parsed = ymd(&caps[1], &caps[2], &caps[3])
            .and_then(|date| to_utc(date.and_time(NaiveTime::MIN), offset));
        return parsed.map(DateInfo::all_day).unwrap_or_default();
    }

    DateInfo::default()
}

fn is_placeholder(text: &str) -> bool {
    if text.is_empty() || text == "--" {
        return true;
    }
    let lower = text.to_lowercase();
    PLACEHOLDER_TOKENS.iter().any(|token| lower.contains(token))
}

// First showing of a " & " list, then the first boundary of a " - " range
fn first_segment(text: &str) -> &str {
    let first_showing = SHOWING_SEPARATOR_RE.split(text).next().unwrap_or(text);
    first_showing.split(" - ").next().unwrap_or(first_showing).trim()
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn hm(h: &str, m: &str) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
}

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
