//! Net-edge scoring with risk gating.
//!
//! Identity (bps): `net = gross - fees - slippage - latency - transfer_risk
//! - borrow_cost`, with `transfer_risk = transfer_delay_min *
//! transfer_penalty_bps_per_min`.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Candidate, StrategyType, round4, round6};
use crate::overlay::constraints::{ConstraintAssessment, ConstraintBook, UNBOUNDED_SENTINEL};
use crate::overlay::fee_table::FeeTable;

use super::ScanRules;

/// The friction component with the largest magnitude for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Fees,
    Slippage,
    Latency,
    Transfer,
    Borrow,
}

impl DragKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DragKind::Fees => "fees",
            DragKind::Slippage => "slippage",
            DragKind::Latency => "latency",
            DragKind::Transfer => "transfer",
            DragKind::Borrow => "borrow",
        }
    }
}

impl fmt::Display for DragKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a candidate failed qualification. Multiple reasons co-occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NetEdgeBelowThreshold,
    RiskScoreAboveThreshold,
    FeeDominated,
    SlippageDominated,
    LatencyTransferDominated,
    BorrowDominated,
    PositionLimitExceeded,
    InventoryUnavailable,
    BorrowLimitExceeded,
    LeverageLimitExceeded,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::NetEdgeBelowThreshold => "net_edge_below_threshold",
            RejectionReason::RiskScoreAboveThreshold => "risk_score_above_threshold",
            RejectionReason::FeeDominated => "fee_dominated",
            RejectionReason::SlippageDominated => "slippage_dominated",
            RejectionReason::LatencyTransferDominated => "latency_transfer_dominated",
            RejectionReason::BorrowDominated => "borrow_dominated",
            RejectionReason::PositionLimitExceeded => "position_limit_exceeded",
            RejectionReason::InventoryUnavailable => "inventory_unavailable",
            RejectionReason::BorrowLimitExceeded => "borrow_limit_exceeded",
            RejectionReason::LeverageLimitExceeded => "leverage_limit_exceeded",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate enriched with post-overlay frictions, net edge, risk score,
/// and qualification outcome.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScoredOpportunity {
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
    pub transfer_risk_bps: f64,
    pub borrow_cost_bps: f64,
    pub net_edge_bps: f64,
    pub risk_score: f64,
    pub size_usd: f64,
    /// `UNBOUNDED_SENTINEL` when no cap applies.
    pub max_position_usd: f64,
    pub leverage_notional_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage_used: Option<f64>,
    pub max_leverage: f64,
    pub dominant_drag: DragKind,
    pub is_qualified: bool,
    pub rejection_reasons: Vec<RejectionReason>,
    pub fee_model_used: bool,
    #[serde(default)]
    pub notes: String,
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn risk_score(
    fees: f64,
    slippage: f64,
    latency: f64,
    transfer_risk: f64,
    borrow_cost: f64,
    net_edge: f64,
    with_borrow: bool,
) -> f64 {
    let fee_component = clamp01(fees / 20.0);
    let slip_component = clamp01(slippage / 20.0);
    let latency_component = clamp01(latency / 12.0);
    let transfer_component = clamp01(transfer_risk / 12.0);
    let edge_buffer = clamp01((10.0 - net_edge.max(0.0)) / 10.0);

    let raw = if with_borrow {
        let borrow_component = clamp01(borrow_cost / 12.0);
        0.18 * fee_component
            + 0.22 * slip_component
            + 0.16 * latency_component
            + 0.16 * transfer_component
            + 0.14 * borrow_component
            + 0.14 * edge_buffer
    } else {
        0.20 * fee_component
            + 0.25 * slip_component
            + 0.20 * latency_component
            + 0.20 * transfer_component
            + 0.15 * edge_buffer
    };
    round4(raw)
}

fn dominant_drag(
    fees: f64,
    slippage: f64,
    latency: f64,
    transfer_risk: f64,
    borrow_cost: f64,
) -> DragKind {
    let drags = [
        (DragKind::Fees, fees),
        (DragKind::Slippage, slippage),
        (DragKind::Latency, latency),
        (DragKind::Transfer, transfer_risk),
        (DragKind::Borrow, borrow_cost),
    ];
    let mut best = drags[0];
    for drag in &drags[1..] {
        if drag.1 > best.1 {
            best = *drag;
        }
    }
    best.0
}

/// Score one candidate against the resolved rules and optional overlays.
pub fn score_candidate(
    candidate: &Candidate,
    rules: &ScanRules,
    fee_table: Option<&FeeTable>,
    book: Option<&ConstraintBook>,
) -> ScoredOpportunity {
    // 1. Base fees: the table replaces embedded fees when enabled.
    let base_fees = match fee_table {
        Some(table) => table.roundtrip_total_bps(candidate, &rules.profile_name),
        None => candidate.fees_bps,
    };

    // 2. Profile multipliers.
    let fees = base_fees * rules.fee_multiplier;
    let slippage = candidate.slippage_bps * rules.slippage_multiplier;
    let latency = candidate.latency_risk_bps * rules.latency_multiplier;
    let transfer_delay = candidate.transfer_delay_min * rules.transfer_delay_multiplier;
    let transfer_risk = transfer_delay * rules.transfer_penalty_bps_per_min;

    // 3. Borrow contribution.
    let assessment: Option<ConstraintAssessment> = book.map(|b| b.assess(candidate));
    let borrow_cost = assessment
        .as_ref()
        .map(|a| a.borrow_cost_bps)
        .unwrap_or(0.0);

    // 4. Net edge.
    let gross = candidate.gross_edge_bps;
    let net_edge = gross - fees - slippage - latency - transfer_risk - borrow_cost;

    // 5. Risk.
    let risk = risk_score(
        fees,
        slippage,
        latency,
        transfer_risk,
        borrow_cost,
        net_edge,
        book.is_some(),
    );

    // 6. Dominant drag.
    let drag = dominant_drag(fees, slippage, latency, transfer_risk, borrow_cost);

    // 7. Qualification and rejection attribution.
    let violation = assessment
        .as_ref()
        .is_some_and(ConstraintAssessment::any_violation);
    let is_qualified =
        net_edge >= rules.min_net_edge_bps && risk <= rules.max_risk_score && !violation;

    let mut rejection_reasons = Vec::new();
    if !is_qualified {
        if net_edge < rules.min_net_edge_bps {
            rejection_reasons.push(RejectionReason::NetEdgeBelowThreshold);
        }
        if risk > rules.max_risk_score {
            rejection_reasons.push(RejectionReason::RiskScoreAboveThreshold);
        }
        if fees >= gross {
            rejection_reasons.push(RejectionReason::FeeDominated);
        }
        if slippage >= gross {
            rejection_reasons.push(RejectionReason::SlippageDominated);
        }
        if latency + transfer_risk >= gross {
            rejection_reasons.push(RejectionReason::LatencyTransferDominated);
        }
        if borrow_cost > 0.0 && borrow_cost >= gross {
            rejection_reasons.push(RejectionReason::BorrowDominated);
        }
        if let Some(a) = &assessment {
            if a.position_limit_exceeded {
                rejection_reasons.push(RejectionReason::PositionLimitExceeded);
            }
            if a.inventory_unavailable {
                rejection_reasons.push(RejectionReason::InventoryUnavailable);
            }
            if a.borrow_limit_exceeded {
                rejection_reasons.push(RejectionReason::BorrowLimitExceeded);
            }
            if a.leverage_limit_exceeded {
                rejection_reasons.push(RejectionReason::LeverageLimitExceeded);
            }
        }
    }

    let (max_position_usd, leverage_notional_usd, leverage_used, max_leverage) = assessment
        .as_ref()
        .map(|a| {
            (
                a.max_position_usd.unwrap_or(UNBOUNDED_SENTINEL),
                a.leverage_notional_usd,
                a.leverage_used,
                a.max_leverage,
            )
        })
        .unwrap_or((UNBOUNDED_SENTINEL, 0.0, None, 0.0));

    ScoredOpportunity {
        detected_at: candidate.detected_at.clone(),
        strategy_type: candidate.strategy_type,
        symbol: candidate.symbol.clone(),
        buy_venue: candidate.buy_venue.clone(),
        sell_venue: candidate.sell_venue.clone(),
        gross_edge_bps: round6(gross),
        fees_bps: round6(fees),
        slippage_bps: round6(slippage),
        latency_risk_bps: round6(latency),
        transfer_delay_min: round6(transfer_delay),
        transfer_risk_bps: round6(transfer_risk),
        borrow_cost_bps: round6(borrow_cost),
        net_edge_bps: round6(net_edge),
        risk_score: risk,
        size_usd: round6(candidate.size_usd),
        max_position_usd: round6(max_position_usd),
        leverage_notional_usd: round6(leverage_notional_usd),
        leverage_used: leverage_used.map(round4),
        max_leverage: round4(max_leverage),
        dominant_drag: drag,
        is_qualified,
        rejection_reasons,
        fee_model_used: fee_table.is_some(),
        notes: candidate.notes.clone(),
    }
}

/// Shortlist order: qualified first, then net edge descending, ties broken
/// lexicographically on `(symbol, buy_venue, sell_venue)`.
pub fn sort_shortlist(scored: &mut [ScoredOpportunity]) {
    scored.sort_by(|a, b| {
        b.is_qualified
            .cmp(&a.is_qualified)
            .then_with(|| b.net_edge_bps.total_cmp(&a.net_edge_bps))
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| a.buy_venue.cmp(&b.buy_venue))
            .then_with(|| a.sell_venue.cmp(&b.sell_venue))
    });
}
