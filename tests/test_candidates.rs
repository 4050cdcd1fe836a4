use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use arb_intel::candidates::{basis, cex_cex, cex_dex, funding};
use arb_intel::fetch::{
    CexVenue, Chain, Credentials, DexToken, GasStat, SnapshotSource, default_dex_tokens,
};
use arb_intel::friction::DexFeeModel;
use arb_intel::model::basis::BasisObservation;
use arb_intel::model::depth::{DepthLadder, DepthSlippageFile, VenueDepthModel};
use arb_intel::model::funding::{FundingSnapshot, PerpTicker};
use arb_intel::model::quote::{DexQuote, Market, NormalizedQuote};
use arb_intel::model::{Instrument, StrategyType};

const RUN_AT: &str = "2025-06-01T00:00:00+00:00";

// ── Fixtures ────────────────────────────────────────────────────────

fn spot_quote(venue: &str, symbol: &str, bid: f64, ask: f64) -> NormalizedQuote {
    NormalizedQuote::from_book(RUN_AT, venue, Market::Spot, symbol, bid, ask).unwrap()
}

fn funding_snapshot(venue: &str, symbol: &str, rate: f64, minutes: f64) -> FundingSnapshot {
    let ticker = PerpTicker {
        funding_rate: rate,
        mark_price: 100.0,
        index_price: Some(100.0),
        bid_price: Some(99.9),
        ask_price: Some(100.1),
        next_funding_ms: (minutes * 60_000.0) as i64,
    };
    FundingSnapshot::from_ticker(RUN_AT, 0, venue, symbol, &ticker).unwrap()
}

fn empty_depth() -> DepthSlippageFile {
    DepthSlippageFile {
        generated_at: RUN_AT.into(),
        size_tiers_usd: vec![1000.0, 5000.0, 10_000.0],
        symbols: BTreeMap::new(),
    }
}

fn symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string()]
}

// ── cex_cex ─────────────────────────────────────────────────────────

#[test]
fn cex_cex_emits_only_profitable_direction() {
    let quotes = vec![
        spot_quote("binance", "BTCUSDT", 100.0, 100.1),
        spot_quote("bybit", "BTCUSDT", 100.3, 100.4),
    ];
    let params = cex_cex::CexCexParams::default();
    let candidates =
        cex_cex::build_candidates(RUN_AT, &symbols(), &quotes, &empty_depth(), &params);

    assert_eq!(candidates.len(), 1);
    let c = &candidates[0];
    assert_eq!(c.strategy_type, StrategyType::CexCex);
    assert_eq!(c.buy_venue, "binance");
    assert_eq!(c.sell_venue, "bybit");
    assert_eq!(c.symbol, "BTC/USDT");

    let expected_gross = ((100.3 - 100.1) / 100.1) * 10_000.0;
    assert!((c.gross_edge_bps - expected_gross).abs() < 1e-3);
    assert!((c.fees_bps - 17.5).abs() < 1e-9);
    assert!(c.notes.contains("fallback_top_of_book_spread_model"));
}

#[test]
fn cex_cex_prefers_depth_model_when_available() {
    let quotes = vec![
        spot_quote("binance", "BTCUSDT", 100.0, 100.1),
        spot_quote("bybit", "BTCUSDT", 100.3, 100.4),
    ];

    let ladder = DepthLadder::new(
        vec![(100.0, 500.0), (99.9, 500.0)],
        vec![(100.1, 500.0), (100.2, 500.0)],
    );
    let tiers = [1000.0, 5000.0, 10_000.0];
    let mut depth = empty_depth();
    for venue in ["binance", "bybit"] {
        depth
            .symbols
            .entry("BTCUSDT".into())
            .or_default()
            .insert(venue.into(), VenueDepthModel::from_ladder(&ladder, 100.05, &tiers));
    }

    let params = cex_cex::CexCexParams::default();
    let candidates = cex_cex::build_candidates(RUN_AT, &symbols(), &quotes, &depth, &params);

    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].notes.contains("depth_model"));
}

#[test]
fn cex_cex_respects_gross_edge_floor() {
    // Books within a hair of each other: neither direction clears 0.2 bps.
    let quotes = vec![
        spot_quote("binance", "BTCUSDT", 100.0, 100.001),
        spot_quote("bybit", "BTCUSDT", 100.0, 100.001),
    ];
    let params = cex_cex::CexCexParams::default();
    let candidates =
        cex_cex::build_candidates(RUN_AT, &symbols(), &quotes, &empty_depth(), &params);
    assert!(candidates.is_empty());
}

// ── funding carry ───────────────────────────────────────────────────

#[test]
fn funding_carry_pairs_low_against_high() {
    let snaps = vec![
        funding_snapshot("binance", "BTCUSDT", 0.0001, 60.0),
        funding_snapshot("bybit", "BTCUSDT", 0.0003, 60.0),
    ];
    let params = funding::FundingParams::default();
    let candidates = funding::build_candidates(RUN_AT, &symbols(), &snaps, &params);

    // Only long-binance / short-bybit collects (3 - 1) bps.
    assert_eq!(candidates.len(), 1);
    let c = &candidates[0];
    assert_eq!(c.buy_venue, "long_binance_perp");
    assert_eq!(c.sell_venue, "short_bybit_perp");
    assert!((c.gross_edge_bps - 2.0).abs() < 1e-6);
    assert!((c.fees_bps - 21.0).abs() < 1e-9);
    assert!((c.slippage_bps - 6.4).abs() < 1e-9);
    assert_eq!(c.transfer_delay_min, 1.0);
}

#[test]
fn funding_carry_latency_grows_with_skew() {
    let aligned = funding::build_candidates(
        RUN_AT,
        &symbols(),
        &[
            funding_snapshot("binance", "BTCUSDT", 0.0, 30.0),
            funding_snapshot("bybit", "BTCUSDT", 0.0005, 30.0),
        ],
        &funding::FundingParams::default(),
    );
    let skewed = funding::build_candidates(
        RUN_AT,
        &symbols(),
        &[
            funding_snapshot("binance", "BTCUSDT", 0.0, 30.0),
            funding_snapshot("bybit", "BTCUSDT", 0.0005, 90.0),
        ],
        &funding::FundingParams::default(),
    );
    assert!(skewed[0].latency_risk_bps > aligned[0].latency_risk_bps);
}

// ── basis ───────────────────────────────────────────────────────────

fn basis_observation(venue: &str, basis_bps: f64, funding_bps: f64) -> BasisObservation {
    let spot_mid = 100.0;
    let perp_mark = spot_mid * (1.0 + basis_bps / 10_000.0);
    BasisObservation {
        detected_at: RUN_AT.into(),
        venue: venue.into(),
        symbol: "BTC/USDT".into(),
        base: "BTC".into(),
        quote: "USDT".into(),
        spot_bid_price: 99.95,
        spot_ask_price: 100.05,
        spot_mid_price: spot_mid,
        perp_bid_price: perp_mark,
        perp_ask_price: perp_mark,
        perp_mark_price: perp_mark,
        perp_index_price: perp_mark,
        funding_rate: funding_bps / 10_000.0,
        funding_rate_bps: funding_bps,
        basis_mark_to_spot_bps: basis_bps,
        basis_index_to_spot_bps: basis_bps,
        next_funding_time: RUN_AT.into(),
        minutes_to_funding: 120.0,
    }
}

#[test]
fn basis_premium_longs_spot_and_shorts_perp() {
    let params = basis::BasisParams::default();
    let c = basis::build_candidate(RUN_AT, &basis_observation("binance", 30.0, 1.0), &params)
        .unwrap();

    assert_eq!(c.buy_venue, "long_binance_spot");
    assert_eq!(c.sell_venue, "short_binance_perp");
    // 30 * 0.22 + 1.0 funding edge.
    assert!((c.gross_edge_bps - 7.6).abs() < 1e-6);
    // Entry + exit on both legs: 2 * (7.5 + 5.0).
    assert!((c.fees_bps - 25.0).abs() < 1e-9);
    assert_eq!(c.transfer_delay_min, 0.25);
    assert!(c.notes.contains("cash_and_carry"));
}

#[test]
fn basis_discount_longs_perp_and_flips_funding_edge() {
    let params = basis::BasisParams::default();
    let c = basis::build_candidate(RUN_AT, &basis_observation("bybit", -40.0, -2.0), &params)
        .unwrap();

    assert_eq!(c.buy_venue, "long_bybit_perp");
    assert_eq!(c.sell_venue, "short_bybit_spot");
    // |basis| * 0.22 + (-funding) = 8.8 + 2.0.
    assert!((c.gross_edge_bps - 10.8).abs() < 1e-6);
    assert!(c.notes.contains("reverse_carry"));
}

#[test]
fn basis_capture_ratio_clamps_to_unit_interval() {
    let params = basis::BasisParams {
        basis_capture_ratio: 7.5,
        ..Default::default()
    };
    let c = basis::build_candidate(RUN_AT, &basis_observation("binance", 30.0, 0.0), &params)
        .unwrap();
    // Ratio clamps to 1.0: full basis, no funding edge.
    assert!((c.gross_edge_bps - 30.0).abs() < 1e-6);
}

#[test]
fn basis_transfer_mode_widens_delay() {
    let params = basis::BasisParams {
        inventory_mode: basis::InventoryMode::Transfer,
        ..Default::default()
    };
    let c = basis::build_candidate(RUN_AT, &basis_observation("binance", 30.0, 1.0), &params)
        .unwrap();
    assert_eq!(c.transfer_delay_min, 5.0);
}

// ── cex_dex ─────────────────────────────────────────────────────────

fn dex_quote(bid: f64, ask: f64, ref_mid: f64) -> DexQuote {
    let mid = (bid + ask) / 2.0;
    let raw_spread = ((ask - bid) / mid) * 10_000.0;
    DexQuote {
        detected_at: RUN_AT.into(),
        venue: "jupiter".into(),
        market: "solana-spot".into(),
        symbol: "SOL/USDC".into(),
        base: "SOL".into(),
        quote: "USDC".into(),
        bid_price: bid,
        ask_price: ask,
        mid_price: mid,
        spread_bps: raw_spread.max(0.0),
        raw_spread_bps: raw_spread,
        crossed_quote: raw_spread < -1.0,
        buy_leg_price_impact_bps: 2.0,
        sell_leg_price_impact_bps: 2.0,
        route_hops_buy: 1,
        route_hops_sell: 1,
        cex_reference_mid: ref_mid,
        reference_deviation_bps: (mid - ref_mid).abs() / ref_mid * 10_000.0,
        scan_size_usd: 5000.0,
    }
}

fn sol_token() -> Vec<DexToken> {
    default_dex_tokens()
        .into_iter()
        .filter(|t| t.base == "SOL")
        .collect()
}

fn sol_cex_quotes(bid: f64, ask: f64) -> BTreeMap<String, BTreeMap<String, NormalizedQuote>> {
    let mut venues = BTreeMap::new();
    venues.insert(
        "binance".to_string(),
        spot_quote("binance", "SOLUSDT", bid, ask),
    );
    let mut out = BTreeMap::new();
    out.insert("SOLUSDT".to_string(), venues);
    out
}

#[test]
fn cex_dex_builds_the_profitable_direction() {
    let fee_model = DexFeeModel::static_fallback(4.0);
    let params = cex_dex::CexDexParams::default();

    // DEX prices well below CEX: buying on DEX and selling on CEX wins.
    let mut dex_by_symbol = BTreeMap::new();
    dex_by_symbol.insert("SOLUSDT".to_string(), dex_quote(99.0, 99.2, 100.0));

    let candidates = cex_dex::build_candidates(
        RUN_AT,
        &sol_token(),
        &sol_cex_quotes(100.0, 100.1),
        &dex_by_symbol,
        &fee_model,
        &params,
    );

    assert_eq!(candidates.len(), 1);
    let c = &candidates[0];
    assert_eq!(c.buy_venue, "jupiter");
    assert_eq!(c.sell_venue, "binance");
    let expected_gross = ((100.0 - 99.2) / 99.2) * 10_000.0;
    assert!((c.gross_edge_bps - expected_gross).abs() < 1e-3);
    // router 4.0 + network 0 + binance taker 7.5.
    assert!((c.fees_bps - 11.5).abs() < 1e-9);
}

#[test]
fn cex_dex_reference_deviation_guard_drops_token() {
    let fee_model = DexFeeModel::static_fallback(4.0);
    let params = cex_dex::CexDexParams::default();

    // DEX mid 105 vs CEX reference 100: 500 bps > the 400 bps guard.
    let mut dex_by_symbol = BTreeMap::new();
    dex_by_symbol.insert("SOLUSDT".to_string(), dex_quote(104.9, 105.1, 100.0));

    let candidates = cex_dex::build_candidates(
        RUN_AT,
        &sol_token(),
        &sol_cex_quotes(100.0, 100.1),
        &dex_by_symbol,
        &fee_model,
        &params,
    );
    assert!(candidates.is_empty());
}

#[test]
fn cex_dex_crossed_book_guard_drops_token() {
    let fee_model = DexFeeModel::static_fallback(4.0);
    let params = cex_dex::CexDexParams::default();

    // Bid far above ask: crossed beyond the -1 bps tolerance.
    let mut dex_by_symbol = BTreeMap::new();
    dex_by_symbol.insert("SOLUSDT".to_string(), dex_quote(100.5, 100.0, 100.0));

    let candidates = cex_dex::build_candidates(
        RUN_AT,
        &sol_token(),
        &sol_cex_quotes(100.0, 100.1),
        &dex_by_symbol,
        &fee_model,
        &params,
    );
    assert!(candidates.is_empty());
}

// ── Mock snapshot source exercising the trait seam ──────────────────

struct MockSource {
    spot: Vec<NormalizedQuote>,
    perp: Vec<FundingSnapshot>,
}

#[async_trait]
impl SnapshotSource for MockSource {
    async fn fetch_spot_book(&self, venue: CexVenue) -> Result<Vec<NormalizedQuote>> {
        Ok(self
            .spot
            .iter()
            .filter(|q| q.venue == venue.name())
            .cloned()
            .collect())
    }

    async fn fetch_depth(&self, _venue: CexVenue, _symbol: &str) -> Result<DepthLadder> {
        Ok(DepthLadder::new(Vec::new(), Vec::new()))
    }

    async fn fetch_perp(&self, venue: CexVenue) -> Result<Vec<FundingSnapshot>> {
        Ok(self
            .perp
            .iter()
            .filter(|s| s.venue == venue.name())
            .cloned()
            .collect())
    }

    async fn fetch_dex_quote(
        &self,
        _token: &DexToken,
        _ref_mid: f64,
        _size_usd: f64,
        _slippage_bps: u32,
    ) -> Result<Option<DexQuote>> {
        Ok(None)
    }

    async fn fetch_authenticated_balances(
        &self,
        _venue: CexVenue,
        _creds: &Credentials,
    ) -> Result<Vec<(String, f64)>> {
        Ok(Vec::new())
    }

    async fn fetch_venue_fee_rate(
        &self,
        _venue: CexVenue,
        _instrument: Instrument,
        _symbol: &str,
        _creds: &Credentials,
    ) -> Result<Option<(f64, f64)>> {
        Ok(None)
    }

    async fn fetch_network_gas(&self, _chain: Chain) -> Result<GasStat> {
        anyhow::bail!("not used in this test")
    }
}

#[tokio::test]
async fn normalized_funding_filters_to_requested_symbols() {
    let source = MockSource {
        spot: Vec::new(),
        perp: vec![
            funding_snapshot("binance", "BTCUSDT", 0.0001, 60.0),
            funding_snapshot("binance", "ETHUSDT", 0.0002, 60.0),
            funding_snapshot("bybit", "BTCUSDT", 0.0003, 60.0),
        ],
    };
    let rows = funding::normalized_funding(&source, &symbols()).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.base == "BTC"));
}

#[tokio::test]
async fn normalized_basis_pairs_spot_with_same_venue_perp() {
    let source = MockSource {
        spot: vec![
            spot_quote("binance", "BTCUSDT", 99.9, 100.1),
            spot_quote("bybit", "BTCUSDT", 99.8, 100.2),
        ],
        perp: vec![funding_snapshot("binance", "BTCUSDT", 0.0001, 60.0)],
    };
    let rows = basis::normalized_basis(&source, &symbols()).await;

    // Only binance has both legs.
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].venue, "binance");
    assert_eq!(rows[0].spot_mid_price, 100.0);
    assert!((rows[0].basis_mark_to_spot_bps - 0.0).abs() < 1.0);
}
