use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::funding::FundingSnapshot;
use super::quote::NormalizedQuote;

/// Same-venue perp-vs-spot observation, the input to the basis builder.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BasisObservation {
    pub detected_at: String,
    pub venue: String,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub spot_bid_price: f64,
    pub spot_ask_price: f64,
    pub spot_mid_price: f64,
    pub perp_bid_price: f64,
    pub perp_ask_price: f64,
    pub perp_mark_price: f64,
    pub perp_index_price: f64,
    pub funding_rate: f64,
    pub funding_rate_bps: f64,
    /// `(perp_mark - spot_mid) / spot_mid * 1e4`.
    pub basis_mark_to_spot_bps: f64,
    pub basis_index_to_spot_bps: f64,
    pub next_funding_time: String,
    pub minutes_to_funding: f64,
}

impl BasisObservation {
    /// Pair a spot quote with the same venue's funding snapshot.
    ///
    /// Where the perp endpoint reports no top-of-book, mark stands in for
    /// both sides; where it reports no index, mark stands in for index.
    pub fn from_snapshots(spot: &NormalizedQuote, perp: &FundingSnapshot) -> Self {
        let spot_mid = spot.mid_price;
        let perp_mark = perp.mark_price;
        let perp_index = perp.index_price.unwrap_or(perp_mark);
        let perp_bid = perp.bid_price.unwrap_or(perp_mark);
        let perp_ask = perp.ask_price.unwrap_or(perp_mark);

        Self {
            detected_at: spot.detected_at.clone(),
            venue: spot.venue.clone(),
            symbol: spot.symbol.clone(),
            base: spot.base.clone(),
            quote: spot.quote.clone(),
            spot_bid_price: spot.bid_price,
            spot_ask_price: spot.ask_price,
            spot_mid_price: spot_mid,
            perp_bid_price: perp_bid,
            perp_ask_price: perp_ask,
            perp_mark_price: perp_mark,
            perp_index_price: perp_index,
            funding_rate: perp.funding_rate,
            funding_rate_bps: perp.funding_rate_bps,
            basis_mark_to_spot_bps: crate::model::round6(
                ((perp_mark - spot_mid) / spot_mid) * 10_000.0,
            ),
            basis_index_to_spot_bps: crate::model::round6(
                ((perp_index - spot_mid) / spot_mid) * 10_000.0,
            ),
            next_funding_time: perp.next_funding_time.clone(),
            minutes_to_funding: perp.minutes_to_funding,
        }
    }
}
