//! Execution overlays: venue/instrument fee table and per-venue/asset
//! constraint book, with venue-tag canonicalization shared between them.

pub mod constraints;
pub mod fee_table;

use std::collections::BTreeSet;

use crate::model::Instrument;

/// Tolerance for all limit comparisons.
pub const EPS: f64 = 1e-6;

/// Direction/instrument markers that never name a venue.
const VENUE_STOPWORDS: [&str; 11] = [
    "long", "short", "spot", "perp", "futures", "future", "swap", "dex", "cex", "buy", "sell",
];

fn tokens_of(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Canonicalize a raw venue tag against a known venue set: exact match,
/// then longest known substring, then the first non-stopword token, then
/// the lowercased string itself. Idempotent for any input.
pub fn canonical_venue(raw: &str, known: &BTreeSet<String>) -> String {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return "unknown".to_string();
    }

    if known.contains(&lowered) {
        return lowered;
    }

    let mut best: Option<&String> = None;
    for venue in known {
        if lowered.contains(venue.as_str()) && best.is_none_or(|b| venue.len() > b.len()) {
            best = Some(venue);
        }
    }
    if let Some(venue) = best {
        return venue.clone();
    }

    for token in tokens_of(&lowered) {
        if !VENUE_STOPWORDS.contains(&token) {
            return token.to_string();
        }
    }

    lowered
}

/// Infer the instrument class from a raw venue tag. Defaults to spot when
/// no marker is present.
pub fn instrument_from_venue(raw: &str) -> Instrument {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return Instrument::Unknown;
    }

    let tokens = tokens_of(&lowered);
    let has = |set: &[&str]| tokens.iter().any(|t| set.contains(t));

    if has(&["perp", "future", "futures", "swap"]) {
        return Instrument::Perp;
    }
    if has(&["dex", "jupiter", "uniswap", "raydium", "0x", "orca"]) {
        return Instrument::Dex;
    }
    if has(&["spot"]) {
        return Instrument::Spot;
    }
    if lowered.contains("jupiter") || lowered.contains("uniswap") {
        return Instrument::Dex;
    }
    Instrument::Spot
}

/// Base currency from a candidate symbol (`"BTC/USDT"` -> `"BTC"`).
pub fn asset_from_symbol(symbol: &str) -> String {
    let raw = symbol.trim().to_uppercase();
    if let Some((base, _)) = raw.split_once('/') {
        let base = base.trim();
        if !base.is_empty() {
            return base.to_string();
        }
        return "UNKNOWN".to_string();
    }
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|t| !t.is_empty())
        .unwrap_or("UNKNOWN")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> BTreeSet<String> {
        ["binance", "bybit", "jupiter"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn canonical_venue_exact_and_substring() {
        let known = known();
        assert_eq!(canonical_venue("binance", &known), "binance");
        assert_eq!(canonical_venue("long_binance_perp", &known), "binance");
        assert_eq!(canonical_venue("short_bybit_spot", &known), "bybit");
        assert_eq!(canonical_venue("Jupiter", &known), "jupiter");
    }

    #[test]
    fn canonical_venue_token_fallback() {
        let known = known();
        assert_eq!(canonical_venue("long_okx_perp", &known), "okx");
        assert_eq!(canonical_venue("long_perp", &known), "long_perp");
        assert_eq!(canonical_venue("", &known), "unknown");
    }

    #[test]
    fn canonical_venue_is_idempotent() {
        let known = known();
        for raw in [
            "binance",
            "long_binance_perp",
            "short_bybit_spot",
            "long_okx_perp",
            "long_perp",
            "",
            "weird!!venue",
        ] {
            let once = canonical_venue(raw, &known);
            let twice = canonical_venue(&once, &known);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn instrument_inference() {
        assert_eq!(instrument_from_venue("long_binance_perp"), Instrument::Perp);
        assert_eq!(instrument_from_venue("binance_futures"), Instrument::Perp);
        assert_eq!(instrument_from_venue("jupiter"), Instrument::Dex);
        assert_eq!(instrument_from_venue("short_bybit_spot"), Instrument::Spot);
        assert_eq!(instrument_from_venue("binance"), Instrument::Spot);
        assert_eq!(instrument_from_venue("uniswapv3"), Instrument::Dex);
    }

    #[test]
    fn asset_extraction() {
        assert_eq!(asset_from_symbol("BTC/USDT"), "BTC");
        assert_eq!(asset_from_symbol("sol/usdc"), "SOL");
        assert_eq!(asset_from_symbol("ETH-PERP"), "ETH");
        assert_eq!(asset_from_symbol(""), "UNKNOWN");
    }
}
