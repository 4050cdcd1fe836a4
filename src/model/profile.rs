use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Named bundle of friction multipliers and qualification thresholds
/// representing an execution-quality scenario.
///
/// `fee_multiplier` models the maker-vs-taker discount when scoring against
/// candidate-embedded taker fees. Once the fee table is enabled the mode
/// lookup already selects maker rates, so the scorer resets the effective
/// multiplier to 1 unless explicitly overridden.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionProfile {
    pub name: String,
    pub fee_multiplier: f64,
    pub slippage_multiplier: f64,
    pub latency_multiplier: f64,
    pub transfer_delay_multiplier: f64,
    pub transfer_penalty_bps_per_min: f64,
    pub min_net_edge_bps: f64,
    pub max_risk_score: f64,
}

impl ExecutionProfile {
    pub fn taker_default() -> Self {
        Self {
            name: "taker_default".to_string(),
            fee_multiplier: 1.0,
            slippage_multiplier: 1.0,
            latency_multiplier: 1.0,
            transfer_delay_multiplier: 1.0,
            transfer_penalty_bps_per_min: 0.45,
            min_net_edge_bps: 8.0,
            max_risk_score: 0.60,
        }
    }

    /// Patient maker execution from prepositioned inventory: lower fees and
    /// impact, but longer exposure while resting orders fill.
    pub fn maker_inventory() -> Self {
        Self {
            name: "maker_inventory".to_string(),
            fee_multiplier: 0.42,
            slippage_multiplier: 0.70,
            latency_multiplier: 1.15,
            transfer_delay_multiplier: 0.60,
            transfer_penalty_bps_per_min: 0.45,
            min_net_edge_bps: 5.0,
            max_risk_score: 0.55,
        }
    }

    pub fn maker_inventory_vip() -> Self {
        Self {
            name: "maker_inventory_vip".to_string(),
            fee_multiplier: 0.30,
            slippage_multiplier: 0.70,
            latency_multiplier: 1.15,
            transfer_delay_multiplier: 0.60,
            transfer_penalty_bps_per_min: 0.45,
            min_net_edge_bps: 4.0,
            max_risk_score: 0.55,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "taker_default" => Some(Self::taker_default()),
            "maker_inventory" => Some(Self::maker_inventory()),
            "maker_inventory_vip" => Some(Self::maker_inventory_vip()),
            _ => None,
        }
    }

    pub fn names() -> [&'static str; 3] {
        ["taker_default", "maker_inventory", "maker_inventory_vip"]
    }
}
