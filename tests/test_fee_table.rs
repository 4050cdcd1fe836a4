use arb_intel::model::{Candidate, ExecutionProfile, Instrument, StrategyType};
use arb_intel::overlay::fee_table::{
    FeeDefaults, FeeMode, FeeRule, FeeTable, FeeTableFile, VERSION, build_template,
    default_instrument_fees, default_profile_fee_mode, default_strategy_roundtrip_side_multiplier,
};
use arb_intel::scan::score::score_candidate;
use arb_intel::scan::{RuleOverrides, ScanRules};

// ── Helpers ─────────────────────────────────────────────────────────

fn fee_rule(venue: &str, instrument: Instrument, taker: f64, maker: f64, vip: f64) -> FeeRule {
    FeeRule {
        venue: venue.into(),
        instrument,
        taker_bps: taker,
        maker_bps: maker,
        maker_vip_bps: vip,
        source: None,
    }
}

fn table_file(rules: Vec<FeeRule>) -> FeeTableFile {
    FeeTableFile {
        generated_at: String::new(),
        version: VERSION.to_string(),
        defaults: FeeDefaults {
            spot: default_instrument_fees(Instrument::Spot),
            perp: default_instrument_fees(Instrument::Perp),
            dex: default_instrument_fees(Instrument::Dex),
            unknown: default_instrument_fees(Instrument::Unknown),
            strategy_roundtrip_side_multiplier: default_strategy_roundtrip_side_multiplier(),
        },
        profile_fee_mode: default_profile_fee_mode(),
        rules,
    }
}

fn candidate(strategy: StrategyType, buy: &str, sell: &str) -> Candidate {
    Candidate {
        detected_at: "2025-06-01T00:00:00+00:00".into(),
        strategy_type: strategy,
        symbol: "BTC/USDT".into(),
        buy_venue: buy.into(),
        sell_venue: sell.into(),
        gross_edge_bps: 20.0,
        fees_bps: 4.0,
        slippage_bps: 3.0,
        latency_risk_bps: 1.0,
        transfer_delay_min: 2.0,
        size_usd: 10_000.0,
        notes: String::new(),
    }
}

// ── Lookup & canonicalization ───────────────────────────────────────

#[test]
fn canonicalization_is_idempotent_for_tagged_venues() {
    let table = FeeTable::from_file(&table_file(vec![
        fee_rule("binance", Instrument::Spot, 10.0, 8.0, 2.8),
        fee_rule("bybit", Instrument::Perp, 5.5, 2.0, 1.0),
        fee_rule("jupiter", Instrument::Dex, 6.0, 6.0, 5.0),
    ]));

    for raw in [
        "binance",
        "long_binance_perp",
        "short_bybit_spot",
        "jupiter",
        "BUY_JUPITER_DEX",
        "long_okx_perp",
        "unknown_venue_42",
    ] {
        let once = table.canonical(raw);
        let twice = table.canonical(&once);
        assert_eq!(once, twice, "canon not idempotent for {raw:?}");
    }
}

#[test]
fn lookup_falls_back_through_unknown_then_defaults() {
    let table = FeeTable::from_file(&table_file(vec![
        fee_rule("binance", Instrument::Unknown, 9.0, 7.0, 3.0),
        fee_rule("bybit", Instrument::Perp, 5.5, 2.0, 1.0),
    ]));

    // binance spot has no rule; (binance, unknown) catches it.
    assert_eq!(table.fee_for("binance", FeeMode::Taker), 9.0);
    // bybit perp rule hits directly.
    assert_eq!(table.fee_for("short_bybit_perp", FeeMode::Maker), 2.0);
    // unlisted venue: instrument default (perp taker 5.5).
    assert_eq!(table.fee_for("long_okx_perp", FeeMode::Taker), 5.5);
}

#[test]
fn profile_mode_selects_fee_column() {
    let table = FeeTable::from_file(&table_file(vec![fee_rule(
        "binance",
        Instrument::Spot,
        10.0,
        8.0,
        2.8,
    )]));

    assert_eq!(table.mode_for_profile("taker_default"), FeeMode::Taker);
    assert_eq!(table.mode_for_profile("maker_inventory"), FeeMode::Maker);
    assert_eq!(
        table.mode_for_profile("maker_inventory_vip"),
        FeeMode::MakerVip
    );
    assert_eq!(table.mode_for_profile("unheard_of"), FeeMode::Taker);
}

#[test]
fn carry_strategies_pay_both_sides_twice() {
    let table = FeeTable::from_file(&table_file(vec![
        fee_rule("binance", Instrument::Perp, 5.0, 2.0, 0.8),
        fee_rule("bybit", Instrument::Perp, 5.5, 2.0, 1.0),
    ]));

    let spot = candidate(StrategyType::CexCex, "binance", "bybit");
    let carry = candidate(
        StrategyType::FundingCarryCexCex,
        "long_binance_perp",
        "short_bybit_perp",
    );

    // Spot defaults: 10 + 10 at multiplier 1.
    assert!((table.roundtrip_total_bps(&spot, "taker_default") - 20.0).abs() < 1e-9);
    // Perp rules: (5.0 + 5.5) * 2.
    assert!((table.roundtrip_total_bps(&carry, "taker_default") - 21.0).abs() < 1e-9);
}

// ── Scoring interaction ─────────────────────────────────────────────

#[test]
fn fee_table_overlay_with_explicit_multiplier_changes_outcome() {
    // Table yields 8 bps for the round trip; explicit 0.42 multiplier gives
    // effective fees of 3.36 replacing the embedded 4.0.
    let table = FeeTable::from_file(&table_file(vec![
        fee_rule("binance", Instrument::Spot, 4.0, 4.0, 4.0),
        fee_rule("bybit", Instrument::Spot, 4.0, 4.0, 4.0),
    ]));

    let overrides = RuleOverrides {
        fee_multiplier: Some(0.42),
        ..Default::default()
    };
    let rules = ScanRules::resolve(
        &ExecutionProfile::maker_inventory(),
        &overrides,
        true,
        false,
    );

    let scored = score_candidate(
        &candidate(StrategyType::CexCex, "binance", "bybit"),
        &rules,
        Some(&table),
        None,
    );

    assert!(scored.fee_model_used);
    assert!((scored.fees_bps - 3.36).abs() < 1e-9);
}

#[test]
fn fee_multiplier_defaults_to_one_under_the_table() {
    let table = FeeTable::from_file(&table_file(vec![
        fee_rule("binance", Instrument::Spot, 4.0, 4.0, 4.0),
        fee_rule("bybit", Instrument::Spot, 4.0, 4.0, 4.0),
    ]));

    // maker_inventory carries fee_multiplier 0.42, but with the table
    // enabled and no explicit override the maker rate applies unscaled.
    let rules = ScanRules::resolve(
        &ExecutionProfile::maker_inventory(),
        &RuleOverrides::default(),
        true,
        false,
    );
    let scored = score_candidate(
        &candidate(StrategyType::CexCex, "binance", "bybit"),
        &rules,
        Some(&table),
        None,
    );
    assert!((scored.fees_bps - 8.0).abs() < 1e-9);
}

#[test]
fn disabled_table_scores_from_embedded_fees() {
    let rules = ScanRules::resolve(
        &ExecutionProfile::taker_default(),
        &RuleOverrides::default(),
        false,
        false,
    );
    let scored = score_candidate(
        &candidate(StrategyType::CexCex, "binance", "bybit"),
        &rules,
        None,
        None,
    );
    assert!(!scored.fee_model_used);
    assert!((scored.fees_bps - 4.0).abs() < 1e-9);
}

// ── Template generation ─────────────────────────────────────────────

#[test]
fn template_covers_candidate_universe_and_keeps_manual_rules() {
    let manual = table_file(vec![fee_rule("okx", Instrument::Spot, 8.0, 6.0, 2.0)]);
    let candidates = vec![
        candidate(StrategyType::CexCex, "binance", "bybit"),
        candidate(
            StrategyType::FundingCarryCexCex,
            "long_binance_perp",
            "short_bybit_perp",
        ),
    ];

    let file = build_template(&candidates, Some(&manual));

    let has = |venue: &str, instrument: Instrument| {
        file.rules
            .iter()
            .any(|r| r.venue == venue && r.instrument == instrument)
    };
    assert!(has("binance", Instrument::Spot));
    assert!(has("binance", Instrument::Perp));
    assert!(has("bybit", Instrument::Spot));
    assert!(has("bybit", Instrument::Perp));
    // Manual entry outside the universe survives the refresh.
    assert!(has("okx", Instrument::Spot));
}

#[test]
fn template_refresh_preserves_existing_rule_values() {
    let mut existing = table_file(vec![fee_rule("binance", Instrument::Spot, 1.1, 0.9, 0.2)]);
    existing.rules[0].source = Some("hand_tuned".into());

    let candidates = vec![candidate(StrategyType::CexCex, "binance", "bybit")];
    let file = build_template(&candidates, Some(&existing));

    let binance_spot = file
        .rules
        .iter()
        .find(|r| r.venue == "binance" && r.instrument == Instrument::Spot)
        .unwrap();
    assert_eq!(binance_spot.taker_bps, 1.1);
    assert_eq!(binance_spot.source.as_deref(), Some("hand_tuned"));
}
