//! Candidate builders: turn normalized venue snapshots into comparable
//! opportunities with explicit gross-edge and friction fields.

pub mod basis;
pub mod cex_cex;
pub mod cex_dex;
pub mod funding;
pub mod merge;

use crate::fetch::CexVenue;
use crate::model::Candidate;

/// Default scan universe (venue-native symbols).
pub fn default_symbols() -> Vec<String> {
    [
        "BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT", "BNBUSDT", "ADAUSDT", "LINKUSDT",
        "LTCUSDT", "AVAXUSDT",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

pub fn default_size_tiers_usd() -> Vec<f64> {
    vec![1000.0, 5000.0, 10_000.0]
}

/// Conservative built-in taker-fee assumptions, overridden downstream by the
/// fee table when one is enabled.
pub fn spot_taker_fee_bps(venue: CexVenue) -> f64 {
    match venue {
        CexVenue::Binance => 7.5,
        CexVenue::Bybit => 10.0,
    }
}

pub fn perp_taker_fee_bps(venue: CexVenue) -> f64 {
    match venue {
        CexVenue::Binance => 5.0,
        CexVenue::Bybit => 5.5,
    }
}

/// Per-side execution impact assumption, single leg.
pub fn perp_slippage_per_side_bps(venue: CexVenue) -> f64 {
    match venue {
        CexVenue::Binance => 1.4,
        CexVenue::Bybit => 1.8,
    }
}

pub fn spot_slippage_per_side_bps(venue: CexVenue) -> f64 {
    match venue {
        CexVenue::Binance => 1.0,
        CexVenue::Bybit => 1.3,
    }
}

/// Candidates are always persisted best-gross-first.
pub fn sort_by_gross_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.gross_edge_bps.total_cmp(&a.gross_edge_bps));
}
