//! Spot cross-venue candidates: same symbol quoted on both CEXes, priced in
//! both directions with size-aware depth slippage.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::warn;

use crate::fetch::{CexVenue, LiveSource, SnapshotSource};
use crate::model::depth::{BookSide, DepthSlippageFile, VenueDepthModel};
use crate::model::quote::{NormalizedQuote, split_symbol};
use crate::model::{Candidate, StrategyType, VenueTag, round2, round4, round6, utc_now_rfc3339};

use super::{sort_by_gross_desc, spot_taker_fee_bps};

#[derive(Debug, Clone)]
pub struct CexCexParams {
    pub size_usd: f64,
    pub transfer_delay_min: f64,
    pub min_gross_edge_bps: f64,
}

impl Default for CexCexParams {
    fn default() -> Self {
        Self {
            size_usd: 10_000.0,
            transfer_delay_min: 5.0,
            min_gross_edge_bps: 0.2,
        }
    }
}

/// Fixed cost of legging into two books at once, on top of depth slippage.
const DEPTH_MODEL_PAD_BPS: f64 = 0.80;
/// Fallback when either ladder is missing: fractions of top-of-book spread
/// plus a wider pad.
const SPREAD_FALLBACK_FRACTION: f64 = 0.55;
const SPREAD_FALLBACK_PAD_BPS: f64 = 1.20;

fn build_candidate(
    run_at: &str,
    raw_symbol: &str,
    buy_venue: CexVenue,
    sell_venue: CexVenue,
    buy_quote: &NormalizedQuote,
    sell_quote: &NormalizedQuote,
    depth: &DepthSlippageFile,
    params: &CexCexParams,
) -> Option<Candidate> {
    let buy_ask = buy_quote.ask_price;
    let sell_bid = sell_quote.bid_price;

    let gross_edge_bps = ((sell_bid - buy_ask) / buy_ask) * 10_000.0;
    if gross_edge_bps < params.min_gross_edge_bps {
        return None;
    }

    let fees_bps = spot_taker_fee_bps(buy_venue) + spot_taker_fee_bps(sell_venue);

    let buy_depth =
        depth.resolve(raw_symbol, buy_venue.name(), params.size_usd, BookSide::Buy);
    let sell_depth =
        depth.resolve(raw_symbol, sell_venue.name(), params.size_usd, BookSide::Sell);

    let (slippage_bps, slip_note) = match (buy_depth, sell_depth) {
        (Some((buy_slip, buy_tier)), Some((sell_slip, sell_tier))) => (
            buy_slip + sell_slip + DEPTH_MODEL_PAD_BPS,
            format!(
                "depth_model tiers buy={} sell={}, buy_depth={buy_slip:.3}bps sell_depth={sell_slip:.3}bps",
                buy_tier as i64, sell_tier as i64
            ),
        ),
        _ => (
            SPREAD_FALLBACK_FRACTION * buy_quote.spread_bps
                + SPREAD_FALLBACK_FRACTION * sell_quote.spread_bps
                + SPREAD_FALLBACK_PAD_BPS,
            "fallback_top_of_book_spread_model".to_string(),
        ),
    };

    let latency_risk_bps = 0.8 + (8.0 - gross_edge_bps).max(0.0) * 0.10;

    let symbol = split_symbol(raw_symbol)
        .map(|(base, quote)| format!("{base}/{quote}"))
        .unwrap_or_else(|| raw_symbol.to_string());

    Some(Candidate {
        detected_at: run_at.to_string(),
        strategy_type: StrategyType::CexCex,
        symbol,
        buy_venue: VenueTag::spot(buy_venue.name()).tag(),
        sell_venue: VenueTag::spot(sell_venue.name()).tag(),
        gross_edge_bps: round6(gross_edge_bps),
        fees_bps: round6(fees_bps),
        slippage_bps: round6(slippage_bps),
        latency_risk_bps: round6(latency_risk_bps),
        transfer_delay_min: round4(params.transfer_delay_min),
        size_usd: round2(params.size_usd),
        notes: format!(
            "live_top_of_book buy_ask={buy_ask:.8}, sell_bid={sell_bid:.8}, \
             buy_spread={:.3}bps, sell_spread={:.3}bps; slippage={slip_note}",
            buy_quote.spread_bps, sell_quote.spread_bps
        ),
    })
}

/// Build both directions for every symbol present on both venues.
pub fn build_candidates(
    run_at: &str,
    symbols: &[String],
    quotes: &[NormalizedQuote],
    depth: &DepthSlippageFile,
    params: &CexCexParams,
) -> Vec<Candidate> {
    let mut by_symbol_venue: BTreeMap<String, BTreeMap<String, &NormalizedQuote>> = BTreeMap::new();
    for quote in quotes {
        by_symbol_venue
            .entry(quote.raw_symbol())
            .or_default()
            .insert(quote.venue.clone(), quote);
    }

    let mut out = Vec::new();
    for symbol in symbols {
        let Some(venue_quotes) = by_symbol_venue.get(symbol) else {
            continue;
        };
        let (Some(binance), Some(bybit)) = (venue_quotes.get("binance"), venue_quotes.get("bybit"))
        else {
            continue;
        };

        let directions = [
            (CexVenue::Binance, CexVenue::Bybit, *binance, *bybit),
            (CexVenue::Bybit, CexVenue::Binance, *bybit, *binance),
        ];
        for (buy, sell, buy_quote, sell_quote) in directions {
            if let Some(candidate) =
                build_candidate(run_at, symbol, buy, sell, buy_quote, sell_quote, depth, params)
            {
                out.push(candidate);
            }
        }
    }

    sort_by_gross_desc(&mut out);
    out
}

/// Normalize spot books from both venues, keeping only requested symbols.
pub async fn normalized_quotes(
    source: &dyn SnapshotSource,
    symbols: &[String],
) -> Vec<NormalizedQuote> {
    let mut out = Vec::new();
    for venue in CexVenue::all() {
        match source.fetch_spot_book(venue).await {
            Ok(quotes) => {
                let mut wanted: BTreeMap<String, NormalizedQuote> = quotes
                    .into_iter()
                    .map(|q| (q.raw_symbol(), q))
                    .filter(|(raw, _)| symbols.contains(raw))
                    .collect();
                for symbol in symbols {
                    if let Some(quote) = wanted.remove(symbol) {
                        out.push(quote);
                    }
                }
            }
            Err(e) => warn!(venue = %venue, error = %e, "spot book fetch failed"),
        }
    }
    out
}

/// Build per-symbol, per-venue slippage curves from live orderbooks.
/// Individual book failures are skipped; the candidate builder falls back to
/// the spread model for those venues. The source's own limiter bounds the
/// fan-out.
pub async fn build_depth_slippage(
    source: &Arc<LiveSource>,
    run_at: &str,
    symbols: &[String],
    quotes: &[NormalizedQuote],
    size_tiers_usd: &[f64],
) -> DepthSlippageFile {
    let mut mids: BTreeMap<(String, String), f64> = BTreeMap::new();
    for quote in quotes {
        mids.insert((quote.raw_symbol(), quote.venue.clone()), quote.mid_price);
    }

    let mut join_set: JoinSet<(String, String, f64, Result<crate::model::depth::DepthLadder>)> =
        JoinSet::new();
    for symbol in symbols {
        for venue in CexVenue::all() {
            let Some(&mid) = mids.get(&(symbol.clone(), venue.name().to_string())) else {
                continue;
            };
            let symbol = symbol.clone();
            let source = Arc::clone(source);
            join_set.spawn(async move {
                let ladder = source.fetch_depth(venue, &symbol).await;
                (symbol, venue.name().to_string(), mid, ladder)
            });
        }
    }

    let mut file = DepthSlippageFile {
        generated_at: run_at.to_string(),
        size_tiers_usd: size_tiers_usd.iter().map(|&s| round2(s)).collect(),
        symbols: BTreeMap::new(),
    };

    while let Some(joined) = join_set.join_next().await {
        let Ok((symbol, venue, mid, ladder)) = joined else {
            continue;
        };
        match ladder {
            Ok(ladder) => {
                let model = VenueDepthModel::from_ladder(&ladder, mid, size_tiers_usd);
                file.symbols.entry(symbol).or_default().insert(venue, model);
            }
            Err(e) => warn!(symbol = %symbol, venue = %venue, error = %e, "depth fetch failed"),
        }
    }

    file
}

/// The `cex` command: fetch, normalize, model depth, build candidates,
/// persist all three artifacts.
pub struct CexCexConfig {
    pub symbols: Vec<String>,
    pub size_tiers_usd: Vec<f64>,
    pub params: CexCexParams,
    pub quotes_out: PathBuf,
    pub depth_out: PathBuf,
    pub candidates_out: PathBuf,
}

pub fn run(config: &CexCexConfig) -> Result<()> {
    let run_at = utc_now_rfc3339();
    let mut symbols = config.symbols.clone();
    symbols.sort();
    symbols.dedup();

    let mut tiers: Vec<f64> = config
        .size_tiers_usd
        .iter()
        .copied()
        .filter(|&s| s > 0.0)
        .collect();
    tiers.sort_by(|a, b| a.total_cmp(b));
    tiers.dedup();

    let rt = tokio::runtime::Runtime::new()?;
    let (quotes, depth) = rt.block_on(async {
        let source = Arc::new(LiveSource::new()?);
        let quotes = normalized_quotes(source.as_ref(), &symbols).await;
        let depth = build_depth_slippage(&source, &run_at, &symbols, &quotes, &tiers).await;
        anyhow::Ok((quotes, depth))
    })?;

    let candidates = build_candidates(&run_at, &symbols, &quotes, &depth, &config.params);

    crate::io::write_json_pretty(&config.quotes_out, &quotes)?;
    crate::io::write_json_pretty(&config.depth_out, &depth)?;
    crate::io::write_json_pretty(&config.candidates_out, &candidates)?;

    let venues_covered: usize = depth.symbols.values().map(|v| v.len()).sum();
    println!("Quotes normalized: {}", quotes.len());
    println!("Depth models built: {venues_covered}");
    println!("Candidates built: {}", candidates.len());
    println!("Wrote: {}", config.quotes_out.display());
    println!("Wrote: {}", config.depth_out.display());
    println!("Wrote: {}", config.candidates_out.display());
    Ok(())
}
