use std::collections::BTreeMap;

use arb_intel::model::depth::{BookSide, DepthLadder, DepthSlippageFile, VenueDepthModel};

fn ladder() -> DepthLadder {
    // Deliberately shuffled input; the constructor restores book order.
    DepthLadder::new(
        vec![(98.0, 5.0), (99.0, 5.0), (97.0, 50.0)],
        vec![(102.0, 5.0), (101.0, 5.0), (103.0, 50.0)],
    )
}

#[test]
fn buy_walk_matches_hand_computation() {
    // Buying $400 at mid 100 fills entirely at 101.
    let slip = ladder().buy_slippage_bps(100.0, 400.0).unwrap();
    assert!((slip - 100.0).abs() < 1e-9);

    // Buying $600 of base at level one (5 * 101 = 505) spills into 102.
    let slip_two_levels = ladder().buy_slippage_bps(100.0, 600.0).unwrap();
    assert!(slip_two_levels > slip);
}

#[test]
fn sell_walk_matches_hand_computation() {
    // Selling $400 (4 base units) fills at 99 for 100 bps below mid.
    let slip = ladder().sell_slippage_bps(100.0, 400.0).unwrap();
    assert!((slip - 100.0).abs() < 1e-9);
}

#[test]
fn slippage_is_monotone_non_decreasing_in_size() {
    let l = ladder();
    let mut last_buy = f64::MIN;
    let mut last_sell = f64::MIN;
    for size in [100.0, 300.0, 700.0, 1500.0, 3000.0, 4500.0] {
        let buy = l.buy_slippage_bps(100.0, size).unwrap();
        let sell = l.sell_slippage_bps(100.0, size).unwrap();
        assert!(buy >= last_buy - 1e-12, "buy slippage decreased at {size}");
        assert!(sell >= last_sell - 1e-12, "sell slippage decreased at {size}");
        last_buy = buy;
        last_sell = sell;
    }
}

#[test]
fn unfillable_size_returns_none() {
    let l = ladder();
    // Total ask depth is 60 base units; $1M cannot fill.
    assert!(l.buy_slippage_bps(100.0, 1_000_000.0).is_none());
    assert!(l.sell_slippage_bps(100.0, 1_000_000.0).is_none());
}

#[test]
fn degenerate_inputs_return_none() {
    let l = ladder();
    assert!(l.buy_slippage_bps(0.0, 1000.0).is_none());
    assert!(l.buy_slippage_bps(100.0, 0.0).is_none());
    let empty = DepthLadder::new(Vec::new(), Vec::new());
    assert!(empty.buy_slippage_bps(100.0, 1000.0).is_none());
}

#[test]
fn tier_resolution_picks_nearest_notional() {
    let tiers = [1000.0, 5000.0, 10_000.0];
    let model = VenueDepthModel::from_ladder(&ladder(), 100.0, &tiers);

    let mut venues = BTreeMap::new();
    venues.insert("binance".to_string(), model);
    let mut symbols = BTreeMap::new();
    symbols.insert("BTCUSDT".to_string(), venues);
    let file = DepthSlippageFile {
        generated_at: String::new(),
        size_tiers_usd: tiers.to_vec(),
        symbols,
    };

    let (_, tier) = file
        .resolve("BTCUSDT", "binance", 1200.0, BookSide::Buy)
        .unwrap();
    assert_eq!(tier, 1000.0);
    let (_, tier) = file
        .resolve("BTCUSDT", "binance", 7600.0, BookSide::Sell)
        .unwrap();
    assert_eq!(tier, 10_000.0);
    assert!(file.resolve("ETHUSDT", "binance", 1000.0, BookSide::Buy).is_none());
}

#[test]
fn thin_tiers_surface_as_none_not_zero() {
    let thin = DepthLadder::new(vec![(99.0, 15.0)], vec![(101.0, 15.0)]);
    let model = VenueDepthModel::from_ladder(&thin, 100.0, &[1000.0, 100_000.0]);
    assert!(model.slippage_bps_by_tier[0].buy_slippage_bps.is_some());
    assert!(model.slippage_bps_by_tier[1].buy_slippage_bps.is_none());
}
