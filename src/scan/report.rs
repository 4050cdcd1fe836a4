//! Human-readable dashboard rendering. Presentation only; the shortlist
//! JSON is the machine artifact.

use crate::overlay::constraints::UNBOUNDED_SENTINEL;

use super::ScanRules;
use super::score::ScoredOpportunity;

fn leverage_cell(item: &ScoredOpportunity) -> String {
    let used = match item.leverage_used {
        Some(used) => format!("{used:.2}"),
        None => "-".to_string(),
    };
    let cap = if item.max_leverage > 0.0 {
        format!("{:.1}", item.max_leverage)
    } else {
        "∞".to_string()
    };
    format!("{used}/{cap}")
}

fn reasons_cell(item: &ScoredOpportunity) -> String {
    if item.rejection_reasons.is_empty() {
        "-".to_string()
    } else {
        item.rejection_reasons
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Render the ranked dashboard. `scored` must already be in shortlist order.
pub fn render_markdown(scored: &[ScoredOpportunity], rules: &ScanRules, run_at: &str) -> String {
    let qualified = scored.iter().filter(|s| s.is_qualified).count();

    let mut lines = vec![
        "# Opportunity Dashboard (Latest)".to_string(),
        String::new(),
        format!("Generated at: `{run_at}`"),
        String::new(),
        "## Rules".to_string(),
        format!(
            "- Net edge (bps) = gross - fees - slippage - latency risk - transfer risk ({} bps/min) - borrow cost",
            rules.transfer_penalty_bps_per_min
        ),
        format!(
            "- Qualified if `net_edge_bps >= {}`, `risk_score <= {}`, and no constraint violation",
            rules.min_net_edge_bps, rules.max_risk_score
        ),
        format!(
            "- Profile: `{}` (fee x{}, slippage x{}, latency x{}, transfer x{})",
            rules.profile_name,
            rules.fee_multiplier,
            rules.slippage_multiplier,
            rules.latency_multiplier,
            rules.transfer_delay_multiplier
        ),
        String::new(),
        format!(
            "## Summary\n- Candidates: **{}**\n- Qualified: **{qualified}**",
            scored.len()
        ),
        String::new(),
        "## Ranked Candidates".to_string(),
        String::new(),
        "| Rank | Pair | Path | Gross bps | Net bps | Borrow bps | Lev Notional | Lev Used/Cap | Risk | Drag | Qualified | Reasons |"
            .to_string(),
        "|---:|---|---|---:|---:|---:|---:|---:|---:|---|:---:|---|".to_string(),
    ];

    for (rank, item) in scored.iter().enumerate() {
        let notional = if item.max_position_usd >= UNBOUNDED_SENTINEL && item.leverage_notional_usd == 0.0
        {
            "-".to_string()
        } else {
            format!("{:.0}", item.leverage_notional_usd)
        };
        lines.push(format!(
            "| {} | {} | {} -> {} | {:.2} | {:.2} | {:.2} | {} | {} | {:.2} | {} | {} | {} |",
            rank + 1,
            item.symbol,
            item.buy_venue,
            item.sell_venue,
            item.gross_edge_bps,
            item.net_edge_bps,
            item.borrow_cost_bps,
            notional,
            leverage_cell(item),
            item.risk_score,
            item.dominant_drag,
            if item.is_qualified { "✅" } else { "❌" },
            reasons_cell(item),
        ));
    }

    lines.push(String::new());
    lines.push("## Notes".to_string());
    lines.push("- This dashboard is for screening only, not execution advice.".to_string());
    lines.join("\n") + "\n"
}
