use once_cell::sync::Lazy;
use regex::Regex;

// "$150", "$ 1,200", "$99.50"; the comma in "$150,$180" is a list separator,
// not part of the amount, so a trailing comma is dropped with the rest.
static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").expect("amount pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceInfo {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub is_free: Option<bool>,
}

/// Parse a free-text price list into a min/max range.
///
/// `"Free"` in any case marks the event free at zero cost. Text without any
/// `$`-prefixed amount ("Please see below") yields an empty `PriceInfo`.
pub fn normalize_price(text: Option<&str>) -> PriceInfo {
    let text = match text.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return PriceInfo::default(),
    };

    if text.to_lowercase().contains("free") {
        return PriceInfo {
            price_min: Some(0.0),
            price_max: Some(0.0),
            is_free: Some(true),
        };
    }

    let amounts: Vec<f64> = AMOUNT_RE
        .captures_iter(text)
        .filter_map(|caps| caps[1].replace(',', "").parse::<f64>().ok())
        .collect();

    if amounts.is_empty() {
        return PriceInfo::default();
    }

    let min = amounts.iter().copied().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    PriceInfo {
        price_min: Some(min),
        price_max: Some(max),
        is_free: Some(false),
    }
}
