//! Payload shapes of the MacauTicket.com Next.js pages.
//!
//! Listing page: `props.pageProps.showListData[]`, one object per programme.
//! Detail page:  `props.pageProps` with `proList` (venue, organizer) and
//! `proInfo[]` (description markup).

use serde_json::{Map, Value};
use tracing::warn;

// Listing fields copied verbatim into `raw_data`
pub const RAW_DATA_FIELDS: &[&str] = &[
    "ProCode",
    "ProType",
    "ShowDate",
    "SPID",
    "WEBStatus",
    "WEBStatusStr",
    "OpenFrom",
    "OpenTo",
];

// `Status` value the source uses for withdrawn programmes
pub const REMOVED_STATUS: &str = "0";

/// One programme as it appears on the listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawListingItem {
    pub code: String,
    pub name: Option<String>,
    pub show_date: Option<String>,
    pub price_text: Option<String>,
    pub pro_type: Option<String>,
    pub picture_small: Option<String>,
    pub picture_portrait: Option<String>,
    pub status: Option<String>,
    pub raw: Map<String, Value>,
}

impl RawListingItem {
    /// Read an item from its listing JSON. Returns `None` when the item has
    /// no programme code, since it could never be keyed in the store.
    pub fn from_json(value: &Value) -> Option<Self> {
        let raw = value.as_object()?;
        let code = field(raw, "ProCode")?;

        Some(Self {
            code,
            name: field(raw, "ProName1"),
            show_date: field(raw, "ShowDate"),
            price_text: field(raw, "PriceDesc").or_else(|| field(raw, "Price")),
            pro_type: field(raw, "ProType"),
            picture_small: field(raw, "PictureS"),
            picture_portrait: field(raw, "PictureP"),
            status: field(raw, "Status"),
            raw: raw.clone(),
        })
    }

    pub fn is_removed(&self) -> bool {
        self.status.as_deref() == Some(REMOVED_STATUS)
    }

    /// The audit snapshot stored alongside the normalized event.
    pub fn raw_data(&self) -> Value {
        let subset: Map<String, Value> = RAW_DATA_FIELDS
            .iter()
            .filter_map(|key| self.raw.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect();
        Value::Object(subset)
    }
}

/// Extra per-programme data from the detail page. Every field is optional;
/// a page that moved things around just yields `None`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPayload {
    pub venue_name: Option<String>,
    pub organizer_name: Option<String>,
    pub description_html: Option<String>,
}

impl DetailPayload {
    /// Read from a detail page's `__NEXT_DATA__` document.
    pub fn from_next_data(next_data: &Value) -> Self {
        let props = &next_data["props"]["pageProps"];
        let pro_list = &props["proList"];

        Self {
            venue_name: pro_list["ProListData"]
                .get(0)
                .and_then(|v| v.as_object())
                .and_then(|o| field(o, "VenueName")),
            organizer_name: pro_list.as_object().and_then(|o| field(o, "SPName")),
            description_html: props["proInfo"]
                .get(0)
                .and_then(|v| v.as_object())
                .and_then(|o| field(o, "Content")),
        }
    }
}

/// The raw `showListData` array of a listing page's `__NEXT_DATA__`.
/// `None` means the page no longer has the shape this worker understands.
pub fn show_list(next_data: &Value) -> Option<&Vec<Value>> {
    next_data["props"]["pageProps"]["showListData"].as_array()
}

/// Parse every usable listing item, warning about the ones that are not.
pub fn listing_items(entries: &[Value]) -> Vec<RawListingItem> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let item = RawListingItem::from_json(entry);
            if item.is_none() {
                warn!("Listing entry {} has no ProCode, ignoring it", i);
            }
            item
        })
        .collect()
}

// Listing values arrive as strings or bare numbers depending on the field;
// blank strings count as absent.
fn field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
