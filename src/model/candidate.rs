use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The four strategy families the scanner constructs candidates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum StrategyType {
    #[serde(rename = "cex_cex")]
    CexCex,
    #[serde(rename = "cex_dex")]
    CexDex,
    #[serde(rename = "funding_carry_cex_cex")]
    FundingCarryCexCex,
    #[serde(rename = "perp_spot_basis")]
    PerpSpotBasis,
}

impl StrategyType {
    pub fn all() -> [StrategyType; 4] {
        [
            StrategyType::CexCex,
            StrategyType::CexDex,
            StrategyType::FundingCarryCexCex,
            StrategyType::PerpSpotBasis,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::CexCex => "cex_cex",
            StrategyType::CexDex => "cex_dex",
            StrategyType::FundingCarryCexCex => "funding_carry_cex_cex",
            StrategyType::PerpSpotBasis => "perp_spot_basis",
        }
    }

    /// Strategies whose buy leg must be funded from sell-side inventory.
    /// Pure funding carry posts margin on both legs instead.
    pub fn requires_inventory(&self) -> bool {
        !matches!(self, StrategyType::FundingCarryCexCex)
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrument class used for fee lookup. `Unknown` only appears as a lookup
/// fallback bucket, never from inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Spot,
    Perp,
    Dex,
    Unknown,
}

impl Instrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Spot => "spot",
            Instrument::Perp => "perp",
            Instrument::Dex => "dex",
            Instrument::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

/// Structured venue role: venue, instrument, and optionally the direction of
/// the leg. Builders work with this form and emit the fused display tag
/// (`"long_binance_perp"`) that downstream files and overlays consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueTag {
    pub venue: String,
    pub instrument: Instrument,
    pub side: Option<Side>,
}

impl VenueTag {
    /// A plain spot venue leg, tagged with the bare venue name.
    pub fn spot(venue: &str) -> Self {
        Self {
            venue: venue.to_string(),
            instrument: Instrument::Spot,
            side: None,
        }
    }

    pub fn dex(venue: &str) -> Self {
        Self {
            venue: venue.to_string(),
            instrument: Instrument::Dex,
            side: None,
        }
    }

    pub fn leg(side: Side, venue: &str, instrument: Instrument) -> Self {
        Self {
            venue: venue.to_string(),
            instrument,
            side: Some(side),
        }
    }

    /// Display/wire form: `"long_binance_perp"` for directional legs,
    /// the bare venue name otherwise.
    pub fn tag(&self) -> String {
        match self.side {
            Some(side) => format!("{}_{}_{}", side.as_str(), self.venue, self.instrument),
            None => self.venue.clone(),
        }
    }
}

impl fmt::Display for VenueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// A strategy-specific opportunity with explicit gross-edge and friction
/// components, comparable across families. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Candidate {
    pub detected_at: String,
    pub strategy_type: StrategyType,
    pub symbol: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub gross_edge_bps: f64,
    pub fees_bps: f64,
    pub slippage_bps: f64,
    pub latency_risk_bps: f64,
    pub transfer_delay_min: f64,
    pub size_usd: f64,
    #[serde(default)]
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_wire_names() {
        let json = serde_json::to_string(&StrategyType::FundingCarryCexCex).unwrap();
        assert_eq!(json, "\"funding_carry_cex_cex\"");
        let back: StrategyType = serde_json::from_str("\"perp_spot_basis\"").unwrap();
        assert_eq!(back, StrategyType::PerpSpotBasis);
    }

    #[test]
    fn venue_tag_forms() {
        assert_eq!(VenueTag::spot("binance").tag(), "binance");
        assert_eq!(VenueTag::dex("jupiter").tag(), "jupiter");
        assert_eq!(
            VenueTag::leg(Side::Long, "binance", Instrument::Perp).tag(),
            "long_binance_perp"
        );
        assert_eq!(
            VenueTag::leg(Side::Short, "bybit", Instrument::Spot).tag(),
            "short_bybit_spot"
        );
    }

    #[test]
    fn inventory_requirement_excludes_funding_carry() {
        assert!(StrategyType::CexCex.requires_inventory());
        assert!(StrategyType::CexDex.requires_inventory());
        assert!(StrategyType::PerpSpotBasis.requires_inventory());
        assert!(!StrategyType::FundingCarryCexCex.requires_inventory());
    }
}
