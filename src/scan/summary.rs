//! Rejection summary: reason and drag tallies across non-qualified items,
//! plus the best rejects by net edge.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::utc_now_rfc3339;

use super::ScanRules;
use super::score::ScoredOpportunity;

const TOP_REJECTED_LIMIT: usize = 10;

/// The effective thresholds a run was scored under.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RuleEcho {
    pub profile: String,
    pub fee_model_enabled: bool,
    pub constraints_enabled: bool,
    pub fee_multiplier: f64,
    pub slippage_multiplier: f64,
    pub latency_multiplier: f64,
    pub transfer_delay_multiplier: f64,
    pub transfer_penalty_bps_per_min: f64,
    pub min_net_edge_bps: f64,
    pub max_risk_score: f64,
}

impl RuleEcho {
    pub fn from_rules(rules: &ScanRules) -> Self {
        Self {
            profile: rules.profile_name.clone(),
            fee_model_enabled: rules.fee_table_enabled,
            constraints_enabled: rules.constraints_enabled,
            fee_multiplier: rules.fee_multiplier,
            slippage_multiplier: rules.slippage_multiplier,
            latency_multiplier: rules.latency_multiplier,
            transfer_delay_multiplier: rules.transfer_delay_multiplier,
            transfer_penalty_bps_per_min: rules.transfer_penalty_bps_per_min,
            min_net_edge_bps: rules.min_net_edge_bps,
            max_risk_score: rules.max_risk_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummaryCounts {
    pub candidates: usize,
    pub qualified: usize,
    pub rejected: usize,
    pub fee_model_applied: usize,
}

/// The persisted rejection-summary artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanSummary {
    pub generated_at: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_table_path: Option<String>,
    pub profile: String,
    pub rules: RuleEcho,
    pub counts: SummaryCounts,
    pub rejection_reason_counts: BTreeMap<String, usize>,
    pub dominant_drag_counts: BTreeMap<String, usize>,
    pub top_rejected: Vec<ScoredOpportunity>,
}

pub fn build_summary(
    scored: &[ScoredOpportunity],
    rules: &ScanRules,
    input: &str,
    constraints_path: Option<&str>,
    fee_table_path: Option<&str>,
) -> ScanSummary {
    let qualified = scored.iter().filter(|s| s.is_qualified).count();
    let rejected: Vec<&ScoredOpportunity> =
        scored.iter().filter(|s| !s.is_qualified).collect();

    let mut rejection_reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut dominant_drag_counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in &rejected {
        for reason in &item.rejection_reasons {
            *rejection_reason_counts
                .entry(reason.as_str().to_string())
                .or_default() += 1;
        }
        *dominant_drag_counts
            .entry(item.dominant_drag.as_str().to_string())
            .or_default() += 1;
    }

    let mut top_rejected: Vec<ScoredOpportunity> =
        rejected.into_iter().cloned().collect();
    top_rejected.sort_by(|a, b| b.net_edge_bps.total_cmp(&a.net_edge_bps));
    top_rejected.truncate(TOP_REJECTED_LIMIT);

    ScanSummary {
        generated_at: utc_now_rfc3339(),
        input: input.to_string(),
        constraints_path: constraints_path.map(str::to_string),
        fee_table_path: fee_table_path.map(str::to_string),
        profile: rules.profile_name.clone(),
        rules: RuleEcho::from_rules(rules),
        counts: SummaryCounts {
            candidates: scored.len(),
            qualified,
            rejected: scored.len() - qualified,
            fee_model_applied: scored.iter().filter(|s| s.fee_model_used).count(),
        },
        rejection_reason_counts,
        dominant_drag_counts,
        top_rejected,
    }
}
