//! End-to-end scan command: JSON artifacts in, shortlist + dashboard +
//! rejection summary out.

use std::path::PathBuf;

use arb_intel::model::{Candidate, StrategyType};
use arb_intel::scan::score::ScoredOpportunity;
use arb_intel::scan::summary::ScanSummary;
use arb_intel::scan::{RuleOverrides, ScanConfig, run};

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("arb-intel-test-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn candidate(symbol: &str, gross: f64, fees: f64) -> Candidate {
    Candidate {
        detected_at: "2025-06-01T00:00:00+00:00".into(),
        strategy_type: StrategyType::CexCex,
        symbol: symbol.into(),
        buy_venue: "binance".into(),
        sell_venue: "bybit".into(),
        gross_edge_bps: gross,
        fees_bps: fees,
        slippage_bps: 1.0,
        latency_risk_bps: 1.0,
        transfer_delay_min: 2.0,
        size_usd: 10_000.0,
        notes: String::new(),
    }
}

#[test]
fn scan_writes_shortlist_dashboard_and_summary() {
    let dir = scratch_dir("outputs");
    let input = dir.join("candidates.json");
    let output_json = dir.join("shortlist.json");
    let output_md = dir.join("dashboard.md");
    let output_summary = dir.join("summary.json");

    let candidates = vec![
        candidate("BTC/USDT", 25.0, 2.0),
        candidate("ETH/USDT", 6.0, 9.0),
        candidate("SOL/USDT", 14.0, 1.0),
    ];
    std::fs::write(&input, serde_json::to_string_pretty(&candidates).unwrap()).unwrap();

    run(&ScanConfig {
        input: input.clone(),
        output_json: output_json.clone(),
        output_md: Some(output_md.clone()),
        output_summary: Some(output_summary.clone()),
        execution_profile: "taker_default".into(),
        constraints: None,
        fee_table: None,
        overrides: RuleOverrides::default(),
    })
    .unwrap();

    let shortlist: Vec<ScoredOpportunity> =
        serde_json::from_str(&std::fs::read_to_string(&output_json).unwrap()).unwrap();
    assert_eq!(shortlist.len(), 3);
    // Qualified first, then net edge descending.
    assert!(shortlist[0].is_qualified);
    assert_eq!(shortlist[0].symbol, "BTC/USDT");
    assert_eq!(shortlist[1].symbol, "SOL/USDT");
    assert!(!shortlist[2].is_qualified);

    let summary: ScanSummary =
        serde_json::from_str(&std::fs::read_to_string(&output_summary).unwrap()).unwrap();
    assert_eq!(summary.counts.candidates, 3);
    assert_eq!(summary.counts.qualified, 2);
    assert_eq!(summary.counts.rejected, 1);
    assert_eq!(summary.counts.fee_model_applied, 0);
    assert_eq!(summary.profile, "taker_default");
    assert!(summary.rejection_reason_counts.contains_key("net_edge_below_threshold"));
    assert_eq!(summary.top_rejected.len(), 1);

    let markdown = std::fs::read_to_string(&output_md).unwrap();
    assert!(markdown.contains("# Opportunity Dashboard"));
    assert!(markdown.contains("BTC/USDT"));
    assert!(markdown.contains("| Rank |"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn scan_fails_on_non_array_input() {
    let dir = scratch_dir("bad-input");
    let input = dir.join("candidates.json");
    std::fs::write(&input, "{\"not\": \"an array\"}").unwrap();

    let result = run(&ScanConfig {
        input,
        output_json: dir.join("shortlist.json"),
        output_md: None,
        output_summary: None,
        execution_profile: "taker_default".into(),
        constraints: None,
        fee_table: None,
        overrides: RuleOverrides::default(),
    });
    assert!(result.is_err());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn scan_rejects_unknown_profile() {
    let dir = scratch_dir("bad-profile");
    let input = dir.join("candidates.json");
    std::fs::write(&input, "[]").unwrap();

    let result = run(&ScanConfig {
        input,
        output_json: dir.join("shortlist.json"),
        output_md: None,
        output_summary: None,
        execution_profile: "vip_whale".into(),
        constraints: None,
        fee_table: None,
        overrides: RuleOverrides::default(),
    });
    assert!(result.is_err());

    std::fs::remove_dir_all(&dir).ok();
}
