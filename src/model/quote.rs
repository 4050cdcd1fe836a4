use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Instrument class a quote was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Spot,
    Perp,
}

/// Top-of-book quote normalized to a common shape across venues.
///
/// Invariants: `bid_price > 0`, `ask_price > bid_price`, `spread_bps >= 0`.
/// Rows that cannot satisfy them are skipped at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedQuote {
    pub detected_at: String,
    pub venue: String,
    pub market: Market,
    /// `"BASE/QUOTE"` form, e.g. `"BTC/USDT"`.
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub bid_price: f64,
    pub ask_price: f64,
    pub mid_price: f64,
    pub spread_bps: f64,
}

impl NormalizedQuote {
    /// Build from a raw venue row. Returns `None` when the symbol has no
    /// recognised quote suffix or the book is degenerate.
    pub fn from_book(
        detected_at: &str,
        venue: &str,
        market: Market,
        raw_symbol: &str,
        bid: f64,
        ask: f64,
    ) -> Option<Self> {
        if bid <= 0.0 || ask <= bid {
            return None;
        }
        let (base, quote) = split_symbol(raw_symbol)?;
        let mid = (bid + ask) / 2.0;
        let spread_bps = ((ask - bid) / mid) * 10_000.0;

        Some(Self {
            detected_at: detected_at.to_string(),
            venue: venue.to_string(),
            market,
            symbol: format!("{base}/{quote}"),
            base,
            quote,
            bid_price: super::round10(bid),
            ask_price: super::round10(ask),
            mid_price: super::round10(mid),
            spread_bps: super::round6(spread_bps),
        })
    }

    /// The venue-native symbol this quote came from (`BTC/USDT` -> `BTCUSDT`).
    pub fn raw_symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

/// Split a venue symbol of form `BASEQUOTE` by recognising trailing quote
/// tokens in priority order. Unrecognised symbols are skipped upstream.
pub fn split_symbol(raw: &str) -> Option<(String, String)> {
    for quote in ["USDT", "USDC"] {
        if raw.ends_with(quote) && raw.len() > quote.len() {
            return Some((raw[..raw.len() - quote.len()].to_string(), quote.to_string()));
        }
    }
    None
}

/// Coerce a venue string field to a strictly positive float.
pub fn safe_positive(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if value > 0.0 { Some(value) } else { None }
}

/// Two-way DEX routing quote priced at a USD notional against a CEX
/// reference mid. One row per token per run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DexQuote {
    pub detected_at: String,
    pub venue: String,
    pub market: String,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub bid_price: f64,
    pub ask_price: f64,
    pub mid_price: f64,
    /// Clamped at zero; the raw value is kept for the crossed-book guard.
    pub spread_bps: f64,
    pub raw_spread_bps: f64,
    pub crossed_quote: bool,
    pub buy_leg_price_impact_bps: f64,
    pub sell_leg_price_impact_bps: f64,
    pub route_hops_buy: usize,
    pub route_hops_sell: usize,
    pub cex_reference_mid: f64,
    pub reference_deviation_bps: f64,
    pub scan_size_usd: f64,
}

impl DexQuote {
    /// Average of the two leg impacts, the builder's slippage input.
    pub fn avg_impact_bps(&self) -> f64 {
        (self.buy_leg_price_impact_bps + self.sell_leg_price_impact_bps) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_recognises_usdt_then_usdc() {
        assert_eq!(
            split_symbol("BTCUSDT"),
            Some(("BTC".into(), "USDT".into()))
        );
        assert_eq!(
            split_symbol("SOLUSDC"),
            Some(("SOL".into(), "USDC".into()))
        );
    }

    #[test]
    fn split_rejects_bare_quote_and_unknown_suffix() {
        assert_eq!(split_symbol("USDT"), None);
        assert_eq!(split_symbol("BTCEUR"), None);
    }

    #[test]
    fn split_round_trips_through_normalized_form() {
        let (base, quote) = split_symbol("AVAXUSDT").unwrap();
        assert_eq!(format!("{base}/{quote}"), "AVAX/USDT");
        assert_eq!(format!("{base}{quote}"), "AVAXUSDT");
    }

    #[test]
    fn from_book_rejects_crossed_and_nonpositive_books() {
        assert!(NormalizedQuote::from_book("t", "binance", Market::Spot, "BTCUSDT", 100.0, 99.0).is_none());
        assert!(NormalizedQuote::from_book("t", "binance", Market::Spot, "BTCUSDT", 0.0, 1.0).is_none());
    }

    #[test]
    fn from_book_computes_mid_and_spread() {
        let q = NormalizedQuote::from_book("t", "binance", Market::Spot, "BTCUSDT", 99.0, 101.0)
            .unwrap();
        assert_eq!(q.mid_price, 100.0);
        assert!((q.spread_bps - 200.0).abs() < 1e-9);
        assert_eq!(q.symbol, "BTC/USDT");
    }
}
