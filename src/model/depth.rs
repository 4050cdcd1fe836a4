//! Orderbook depth ladders and size-aware slippage.
//!
//! Slippage is measured by walking the ladder until a target USD notional is
//! filled and comparing the average execution price to mid:
//!
//!     buy:  slip_bps = (avg_exec / mid - 1) * 10_000
//!     sell: slip_bps = (1 - avg_exec / mid) * 10_000
//!
//! Both clamp at zero. A ladder too thin to fill the target yields `None`.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which side of the book an execution consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Buy,
    Sell,
}

/// Price levels for one symbol on one venue. Bids descending, asks ascending;
/// the constructor enforces the ordering.
#[derive(Debug, Clone, Default)]
pub struct DepthLadder {
    bids: Vec<(f64, f64)>,
    asks: Vec<(f64, f64)>,
}

impl DepthLadder {
    pub fn new(mut bids: Vec<(f64, f64)>, mut asks: Vec<(f64, f64)>) -> Self {
        bids.retain(|(price, qty)| *price > 0.0 && *qty > 0.0);
        asks.retain(|(price, qty)| *price > 0.0 && *qty > 0.0);
        bids.sort_by(|a, b| b.0.total_cmp(&a.0));
        asks.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { bids, asks }
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Average-execution slippage for buying `size_usd` of notional.
    pub fn buy_slippage_bps(&self, mid_price: f64, size_usd: f64) -> Option<f64> {
        if mid_price <= 0.0 || size_usd <= 0.0 {
            return None;
        }
        let target_quote = size_usd;
        let mut spent_quote = 0.0;
        let mut bought_base = 0.0;

        for (price, qty) in &self.asks {
            let level_quote = price * qty;
            let take_quote = (target_quote - spent_quote).min(level_quote);
            if take_quote <= 0.0 {
                break;
            }
            spent_quote += take_quote;
            bought_base += take_quote / price;
            if spent_quote >= target_quote {
                break;
            }
        }

        if spent_quote < target_quote || bought_base <= 0.0 {
            return None;
        }
        let avg_exec = spent_quote / bought_base;
        Some((avg_exec / mid_price - 1.0).max(0.0) * 10_000.0)
    }

    /// Average-execution slippage for selling `size_usd` of notional.
    pub fn sell_slippage_bps(&self, mid_price: f64, size_usd: f64) -> Option<f64> {
        if mid_price <= 0.0 || size_usd <= 0.0 {
            return None;
        }
        let target_base = size_usd / mid_price;
        let mut sold_base = 0.0;
        let mut received_quote = 0.0;

        for (price, qty) in &self.bids {
            let take_base = (target_base - sold_base).min(*qty);
            if take_base <= 0.0 {
                break;
            }
            received_quote += take_base * price;
            sold_base += take_base;
            if sold_base >= target_base {
                break;
            }
        }

        if sold_base < target_base || sold_base <= 0.0 {
            return None;
        }
        let avg_exec = received_quote / sold_base;
        Some((1.0 - avg_exec / mid_price).max(0.0) * 10_000.0)
    }
}

/// One USD tier of the slippage curve.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TierSlippage {
    pub size_usd: f64,
    pub buy_slippage_bps: Option<f64>,
    pub sell_slippage_bps: Option<f64>,
}

/// Per-venue slippage curve for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VenueDepthModel {
    pub mid_price: f64,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub slippage_bps_by_tier: Vec<TierSlippage>,
}

impl VenueDepthModel {
    pub fn from_ladder(ladder: &DepthLadder, mid_price: f64, tiers_usd: &[f64]) -> Self {
        let slippage_bps_by_tier = tiers_usd
            .iter()
            .map(|&size| TierSlippage {
                size_usd: crate::model::round2(size),
                buy_slippage_bps: ladder
                    .buy_slippage_bps(mid_price, size)
                    .map(crate::model::round6),
                sell_slippage_bps: ladder
                    .sell_slippage_bps(mid_price, size)
                    .map(crate::model::round6),
            })
            .collect();

        Self {
            mid_price: crate::model::round10(mid_price),
            bid_levels: ladder.bid_levels(),
            ask_levels: ladder.ask_levels(),
            slippage_bps_by_tier,
        }
    }
}

/// Depth slippage artifact: `symbol -> venue -> curve`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DepthSlippageFile {
    pub generated_at: String,
    pub size_tiers_usd: Vec<f64>,
    pub symbols: BTreeMap<String, BTreeMap<String, VenueDepthModel>>,
}

impl DepthSlippageFile {
    /// Resolve slippage at the tier whose notional is closest to the request.
    pub fn resolve(
        &self,
        symbol: &str,
        venue: &str,
        size_usd: f64,
        side: BookSide,
    ) -> Option<(f64, f64)> {
        let model = self.symbols.get(symbol)?.get(venue)?;
        let best = model
            .slippage_bps_by_tier
            .iter()
            .min_by(|a, b| {
                (a.size_usd - size_usd)
                    .abs()
                    .total_cmp(&(b.size_usd - size_usd).abs())
            })?;
        let value = match side {
            BookSide::Buy => best.buy_slippage_bps?,
            BookSide::Sell => best.sell_slippage_bps?,
        };
        Some((value, best.size_usd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> DepthLadder {
        DepthLadder::new(
            vec![(99.0, 10.0), (98.0, 10.0), (97.0, 100.0)],
            vec![(101.0, 10.0), (102.0, 10.0), (103.0, 100.0)],
        )
    }

    #[test]
    fn buy_slippage_within_first_level_matches_top_of_book() {
        let slip = ladder().buy_slippage_bps(100.0, 500.0).unwrap();
        // Fully filled at 101: (101/100 - 1) * 1e4 = 100 bps.
        assert!((slip - 100.0).abs() < 1e-9);
    }

    #[test]
    fn sell_slippage_within_first_level_matches_top_of_book() {
        let slip = ladder().sell_slippage_bps(100.0, 500.0).unwrap();
        assert!((slip - 100.0).abs() < 1e-9);
    }

    #[test]
    fn slippage_is_monotone_in_size() {
        let l = ladder();
        let sizes = [500.0, 1_000.0, 2_000.0, 5_000.0, 10_000.0];
        let mut last = 0.0;
        for size in sizes {
            let slip = l.buy_slippage_bps(100.0, size).unwrap();
            assert!(slip >= last - 1e-12, "slippage decreased at size {size}");
            last = slip;
        }
    }

    #[test]
    fn thin_ladder_returns_none() {
        let l = DepthLadder::new(vec![(99.0, 0.1)], vec![(101.0, 0.1)]);
        assert!(l.buy_slippage_bps(100.0, 1_000_000.0).is_none());
        assert!(l.sell_slippage_bps(100.0, 1_000_000.0).is_none());
    }

    #[test]
    fn resolve_picks_closest_tier() {
        let model = VenueDepthModel::from_ladder(&ladder(), 100.0, &[1_000.0, 5_000.0, 10_000.0]);
        let mut venues = BTreeMap::new();
        venues.insert("binance".to_string(), model);
        let mut symbols = BTreeMap::new();
        symbols.insert("BTCUSDT".to_string(), venues);
        let file = DepthSlippageFile {
            generated_at: String::new(),
            size_tiers_usd: vec![1_000.0, 5_000.0, 10_000.0],
            symbols,
        };

        let (_, tier) = file
            .resolve("BTCUSDT", "binance", 4_200.0, BookSide::Buy)
            .unwrap();
        assert_eq!(tier, 5_000.0);
    }
}
