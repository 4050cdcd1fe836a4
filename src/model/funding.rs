use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::quote::{Market, split_symbol};

/// Perp funding snapshot normalized across venues.
///
/// Top-of-book and index fields are optional: some venue endpoints report
/// only mark and funding (Binance premiumIndex).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FundingSnapshot {
    pub detected_at: String,
    pub venue: String,
    pub market: Market,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub mark_price: f64,
    /// Fraction per funding interval; positive = longs pay shorts.
    pub funding_rate: f64,
    pub funding_rate_bps: f64,
    pub next_funding_time: String,
    pub minutes_to_funding: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_price: Option<f64>,
}

/// Raw per-symbol perp ticker as fetched, before normalization.
#[derive(Debug, Clone)]
pub struct PerpTicker {
    pub funding_rate: f64,
    pub mark_price: f64,
    pub index_price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub next_funding_ms: i64,
}

impl FundingSnapshot {
    pub fn from_ticker(
        detected_at: &str,
        now_ms: i64,
        venue: &str,
        raw_symbol: &str,
        ticker: &PerpTicker,
    ) -> Option<Self> {
        let (base, quote) = split_symbol(raw_symbol)?;

        Some(Self {
            detected_at: detected_at.to_string(),
            venue: venue.to_string(),
            market: Market::Perp,
            symbol: format!("{base}/{quote}"),
            base,
            quote,
            mark_price: super::round10(ticker.mark_price),
            funding_rate: super::round10(ticker.funding_rate),
            funding_rate_bps: super::round6(ticker.funding_rate * 10_000.0),
            next_funding_time: iso_from_ms(ticker.next_funding_ms),
            minutes_to_funding: super::round4(minutes_until(now_ms, ticker.next_funding_ms)),
            index_price: ticker.index_price.map(super::round10),
            bid_price: ticker.bid_price.map(super::round10),
            ask_price: ticker.ask_price.map(super::round10),
        })
    }
}

/// Minutes from `now_ms` to `future_ms`, floored at zero.
pub fn minutes_until(now_ms: i64, future_ms: i64) -> f64 {
    ((future_ms - now_ms) as f64 / 60_000.0).max(0.0)
}

/// RFC 3339 UTC string for a millisecond epoch timestamp.
pub fn iso_from_ms(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}
