pub mod date;
pub mod price;
pub mod text;

pub use date::{normalize_date, DateInfo};
pub use price::{normalize_price, PriceInfo};
pub use text::sanitize_html;

use crate::apis::macau_ticket::{DetailPayload, RawListingItem};
use crate::config::IngestConfig;
use crate::constants;
use crate::types::{CanonicalEvent, EventStatus, SourceId};
use chrono::FixedOffset;

/// Maps listing items (plus optional detail data) onto `CanonicalEvent`.
///
/// Holds only configuration, so `normalize` is a pure function of its
/// arguments: the same inputs always serialize to the same bytes.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    offset: FixedOffset,
    detail_base_url: String,
    timezone: String,
    city: String,
    country: String,
    currency: String,
}

impl EventNormalizer {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            offset: config.offset(),
            detail_base_url: config.detail_base_url.trim_end_matches('/').to_string(),
            timezone: config.timezone_name.clone(),
            city: config.city.clone(),
            country: config.country.clone(),
            currency: config.currency.clone(),
        }
    }

    pub fn programme_url(&self, code: &str) -> String {
        format!("{}/{}", self.detail_base_url, code)
    }

    pub fn normalize(
        &self,
        item: &RawListingItem,
        detail: Option<&DetailPayload>,
        source_id: SourceId,
    ) -> CanonicalEvent {
        let dates = normalize_date(item.show_date.as_deref().unwrap_or_default(), self.offset);
        let prices = normalize_price(item.price_text.as_deref());

        let title = item
            .name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(constants::UNTITLED)
            .to_string();

        let description = detail
            .and_then(|d| d.description_html.as_deref())
            .and_then(sanitize_html);

        // Landscape thumbnail first; consumers use images[0] as the hero
        let images = [&item.picture_small, &item.picture_portrait]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        let status = if item.is_removed() {
            EventStatus::Invalid
        } else {
            EventStatus::Active
        };

        let url = self.programme_url(&item.code);

        CanonicalEvent {
            source_id,
            source_event_id: item.code.clone(),
            title,
            description,
            start_at: dates.start_at,
            end_at: dates.end_at,
            all_day: dates.all_day,
            timezone: self.timezone.clone(),
            venue_name: detail.and_then(|d| d.venue_name.clone()),
            city: self.city.clone(),
            country: self.country.clone(),
            ticket_url: url.clone(),
            url,
            organizer_name: detail.and_then(|d| d.organizer_name.clone()),
            price_min: prices.price_min,
            price_max: prices.price_max,
            is_free: prices.is_free,
            currency: self.currency.clone(),
            categories: item.pro_type.iter().cloned().collect(),
            images,
            status,
            raw_data: item.raw_data(),
        }
    }
}
