//! CEX-vs-DEX candidates: tokens with both CEX quotes and a Jupiter route,
//! priced both ways at the scan notional.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::fetch::{CexVenue, DexToken, LiveSource, SnapshotSource, default_dex_tokens};
use crate::friction::{DEFAULT_DEX_ROUTER_FEE_BPS, DexFeeModel, load_dex_fee_model};
use crate::model::quote::{DexQuote, NormalizedQuote};
use crate::model::{Candidate, StrategyType, VenueTag, round2, round4, round6, utc_now_rfc3339};

use super::{sort_by_gross_desc, spot_taker_fee_bps};

#[derive(Debug, Clone)]
pub struct CexDexParams {
    pub size_usd: f64,
    pub slippage_bps: u32,
    pub transfer_delay_min: f64,
    pub min_gross_edge_bps: f64,
    pub max_ref_deviation_bps: f64,
}

impl Default for CexDexParams {
    fn default() -> Self {
        Self {
            size_usd: 5000.0,
            slippage_bps: 30,
            transfer_delay_min: 12.0,
            min_gross_edge_bps: 0.2,
            max_ref_deviation_bps: 400.0,
        }
    }
}

fn make_candidate(
    run_at: &str,
    base: &str,
    buy_venue: String,
    sell_venue: String,
    gross_edge_bps: f64,
    cex_venue: CexVenue,
    cex_spread_bps: f64,
    dex: &DexQuote,
    fee_model: &DexFeeModel,
    params: &CexDexParams,
    direction_note: &str,
) -> Candidate {
    let slippage_bps =
        0.55 * cex_spread_bps + 0.65 * dex.spread_bps + 0.5 * dex.avg_impact_bps() + 0.8;
    let latency_risk_bps = 2.4 + (10.0 - gross_edge_bps).max(0.0) * 0.08;
    let fees_bps = fee_model.total_fee_bps() + spot_taker_fee_bps(cex_venue);

    Candidate {
        detected_at: run_at.to_string(),
        strategy_type: StrategyType::CexDex,
        symbol: format!("{base}/USDT"),
        buy_venue,
        sell_venue,
        gross_edge_bps: round6(gross_edge_bps),
        fees_bps: round6(fees_bps),
        slippage_bps: round6(slippage_bps),
        latency_risk_bps: round6(latency_risk_bps),
        transfer_delay_min: round4(params.transfer_delay_min),
        size_usd: round2(params.size_usd),
        notes: format!(
            "{direction_note} dex_spread={:.2}bps dex_impact={:.2}bps \
             dex_router_fee={:.4}bps dex_network_fee={:.6}bps source={}",
            dex.spread_bps,
            dex.avg_impact_bps(),
            fee_model.router_fee_bps,
            fee_model.network_fee_bps,
            fee_model.source
        ),
    }
}

/// Build both directions per token per CEX venue, applying the
/// reference-deviation and crossed-book guards to the DEX quote first.
pub fn build_candidates(
    run_at: &str,
    tokens: &[DexToken],
    cex_quotes: &BTreeMap<String, BTreeMap<String, NormalizedQuote>>,
    dex_quotes_by_symbol: &BTreeMap<String, DexQuote>,
    fee_model: &DexFeeModel,
    params: &CexDexParams,
) -> Vec<Candidate> {
    let mut out = Vec::new();

    for token in tokens {
        let Some(dex) = dex_quotes_by_symbol.get(&token.symbol) else {
            continue;
        };
        if dex.reference_deviation_bps > params.max_ref_deviation_bps {
            continue;
        }
        if dex.crossed_quote {
            continue;
        }

        let Some(venue_quotes) = cex_quotes.get(&token.symbol) else {
            continue;
        };
        for venue in CexVenue::all() {
            let Some(cex) = venue_quotes.get(venue.name()) else {
                continue;
            };

            // Buy on DEX, sell on CEX.
            let gross_buy_dex = ((cex.bid_price - dex.ask_price) / dex.ask_price) * 10_000.0;
            if gross_buy_dex >= params.min_gross_edge_bps {
                out.push(make_candidate(
                    run_at,
                    &token.base,
                    VenueTag::dex("jupiter").tag(),
                    VenueTag::spot(venue.name()).tag(),
                    gross_buy_dex,
                    venue,
                    cex.spread_bps,
                    dex,
                    fee_model,
                    params,
                    &format!(
                        "buy_dex_sell_cex dex_ask={:.8} cex_bid={:.8}",
                        dex.ask_price, cex.bid_price
                    ),
                ));
            }

            // Buy on CEX, sell on DEX.
            let gross_sell_dex = ((dex.bid_price - cex.ask_price) / cex.ask_price) * 10_000.0;
            if gross_sell_dex >= params.min_gross_edge_bps {
                out.push(make_candidate(
                    run_at,
                    &token.base,
                    VenueTag::spot(venue.name()).tag(),
                    VenueTag::dex("jupiter").tag(),
                    gross_sell_dex,
                    venue,
                    cex.spread_bps,
                    dex,
                    fee_model,
                    params,
                    &format!(
                        "buy_cex_sell_dex cex_ask={:.8} dex_bid={:.8}",
                        cex.ask_price, dex.bid_price
                    ),
                ));
            }
        }
    }

    sort_by_gross_desc(&mut out);
    out
}

/// CEX quotes for the DEX-routable token universe, keyed symbol -> venue.
async fn fetch_cex_quotes(
    source: &dyn SnapshotSource,
    tokens: &[DexToken],
) -> BTreeMap<String, BTreeMap<String, NormalizedQuote>> {
    let wanted: Vec<String> = tokens.iter().map(|t| t.symbol.clone()).collect();
    let mut out: BTreeMap<String, BTreeMap<String, NormalizedQuote>> = BTreeMap::new();

    for venue in CexVenue::all() {
        match source.fetch_spot_book(venue).await {
            Ok(quotes) => {
                for quote in quotes {
                    let raw = quote.raw_symbol();
                    if wanted.contains(&raw) {
                        out.entry(raw).or_default().insert(quote.venue.clone(), quote);
                    }
                }
            }
            Err(e) => warn!(venue = %venue, error = %e, "spot book fetch failed"),
        }
    }
    out
}

pub struct CexDexConfig {
    pub params: CexDexParams,
    pub network_friction: PathBuf,
    pub dex_router_fee_bps: f64,
    pub dex_quotes_out: PathBuf,
    pub candidates_out: PathBuf,
}

impl Default for CexDexConfig {
    fn default() -> Self {
        Self {
            params: CexDexParams::default(),
            network_friction: PathBuf::from("data/network_friction.latest.json"),
            dex_router_fee_bps: DEFAULT_DEX_ROUTER_FEE_BPS,
            dex_quotes_out: PathBuf::from("data/normalized_quotes_dex_latest.json"),
            candidates_out: PathBuf::from("data/opportunity_candidates.cex_dex.live.json"),
        }
    }
}

pub fn run(config: &CexDexConfig) -> Result<()> {
    let run_at = utc_now_rfc3339();
    let tokens = default_dex_tokens();
    let fee_model = load_dex_fee_model(&config.network_friction, config.dex_router_fee_bps);

    let rt = tokio::runtime::Runtime::new()?;
    let (cex_quotes, dex_quotes) = rt.block_on(async {
        let source = LiveSource::new()?;
        let cex_quotes = fetch_cex_quotes(&source, &tokens).await;

        let mut dex_quotes: Vec<DexQuote> = Vec::new();
        for token in &tokens {
            let mids: Vec<f64> = cex_quotes
                .get(&token.symbol)
                .map(|venues| venues.values().map(|q| q.mid_price).collect())
                .unwrap_or_default();
            if mids.is_empty() {
                continue;
            }
            let ref_mid = mids.iter().sum::<f64>() / mids.len() as f64;

            match source
                .fetch_dex_quote(token, ref_mid, config.params.size_usd, config.params.slippage_bps)
                .await
            {
                Ok(Some(quote)) => dex_quotes.push(quote),
                Ok(None) => {}
                Err(e) => warn!(token = %token.base, error = %e, "dex quote failed"),
            }
        }
        anyhow::Ok((cex_quotes, dex_quotes))
    })?;

    let dex_by_symbol: BTreeMap<String, DexQuote> = dex_quotes
        .iter()
        .filter_map(|quote| {
            tokens
                .iter()
                .find(|t| t.base == quote.base)
                .map(|t| (t.symbol.clone(), quote.clone()))
        })
        .collect();

    let candidates = build_candidates(
        &run_at,
        &tokens,
        &cex_quotes,
        &dex_by_symbol,
        &fee_model,
        &config.params,
    );

    crate::io::write_json_pretty(&config.dex_quotes_out, &dex_quotes)?;
    crate::io::write_json_pretty(&config.candidates_out, &candidates)?;

    let rejected_by_reference = dex_quotes
        .iter()
        .filter(|q| q.reference_deviation_bps > config.params.max_ref_deviation_bps)
        .count();
    let rejected_by_cross = dex_quotes.iter().filter(|q| q.crossed_quote).count();

    println!("DEX quotes normalized: {}", dex_quotes.len());
    println!("DEX quotes rejected by reference guard: {rejected_by_reference}");
    println!("DEX quotes rejected by crossed-book guard: {rejected_by_cross}");
    println!(
        "Jupiter fee model: router={:.4}bps, network={:.6}bps, total={:.6}bps ({})",
        fee_model.router_fee_bps,
        fee_model.network_fee_bps,
        fee_model.total_fee_bps(),
        fee_model.source
    );
    println!("CEX-DEX candidates built: {}", candidates.len());
    println!("Wrote: {}", config.dex_quotes_out.display());
    println!("Wrote: {}", config.candidates_out.display());
    Ok(())
}
