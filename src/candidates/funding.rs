//! Cross-venue funding carry: long the perp on the venue paying less,
//! short on the venue paying more, collect the funding differential.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::fetch::{CexVenue, LiveSource, SnapshotSource};
use crate::model::candidate::Side;
use crate::model::funding::FundingSnapshot;
use crate::model::{
    Candidate, Instrument, StrategyType, VenueTag, round2, round6, utc_now_rfc3339,
};

use super::{perp_slippage_per_side_bps, perp_taker_fee_bps, sort_by_gross_desc};

#[derive(Debug, Clone)]
pub struct FundingParams {
    pub size_usd: f64,
    pub min_gross_edge_bps: f64,
}

impl Default for FundingParams {
    fn default() -> Self {
        Self {
            size_usd: 10_000.0,
            min_gross_edge_bps: 0.4,
        }
    }
}

/// Margin shuffling between venues, not an asset transfer.
const TRANSFER_DELAY_MIN: f64 = 1.0;

fn build_candidate(
    run_at: &str,
    long_venue: CexVenue,
    short_venue: CexVenue,
    long_snap: &FundingSnapshot,
    short_snap: &FundingSnapshot,
    params: &FundingParams,
) -> Option<Candidate> {
    // Positive means this long/short pairing expects to RECEIVE net funding
    // at the next cycle.
    let gross_edge_bps = (short_snap.funding_rate - long_snap.funding_rate) * 10_000.0;
    if gross_edge_bps < params.min_gross_edge_bps {
        return None;
    }

    let hold_minutes = long_snap.minutes_to_funding.max(short_snap.minutes_to_funding);
    let skew_min = (long_snap.minutes_to_funding - short_snap.minutes_to_funding).abs();

    // Entry + exit on both legs.
    let fees_bps = 2.0 * (perp_taker_fee_bps(long_venue) + perp_taker_fee_bps(short_venue));
    let slippage_bps =
        2.0 * (perp_slippage_per_side_bps(long_venue) + perp_slippage_per_side_bps(short_venue));

    // Exposure risk grows with hold time and with venue funding-time skew.
    let latency_risk_bps = 0.75 + (hold_minutes / 60.0) * 0.35 + (skew_min - 5.0).max(0.0) * 0.06;

    Some(Candidate {
        detected_at: run_at.to_string(),
        strategy_type: StrategyType::FundingCarryCexCex,
        symbol: long_snap.symbol.clone(),
        buy_venue: VenueTag::leg(Side::Long, long_venue.name(), Instrument::Perp).tag(),
        sell_venue: VenueTag::leg(Side::Short, short_venue.name(), Instrument::Perp).tag(),
        gross_edge_bps: round6(gross_edge_bps),
        fees_bps: round6(fees_bps),
        slippage_bps: round6(slippage_bps),
        latency_risk_bps: round6(latency_risk_bps),
        transfer_delay_min: TRANSFER_DELAY_MIN,
        size_usd: round2(params.size_usd),
        notes: format!(
            "funding_diff_bps=(short {} {:.3} - long {} {:.3}); \
             hold_min={hold_minutes:.2}; skew_min={skew_min:.2}; \
             mark_long={:.6}; mark_short={:.6}",
            short_venue.name(),
            short_snap.funding_rate * 10_000.0,
            long_venue.name(),
            long_snap.funding_rate * 10_000.0,
            long_snap.mark_price,
            short_snap.mark_price
        ),
    })
}

/// Both long/short assignments for every symbol live on both perp venues.
pub fn build_candidates(
    run_at: &str,
    symbols: &[String],
    snapshots: &[FundingSnapshot],
    params: &FundingParams,
) -> Vec<Candidate> {
    let mut by_symbol_venue: BTreeMap<String, BTreeMap<String, &FundingSnapshot>> = BTreeMap::new();
    for snap in snapshots {
        by_symbol_venue
            .entry(format!("{}{}", snap.base, snap.quote))
            .or_default()
            .insert(snap.venue.clone(), snap);
    }

    let mut out = Vec::new();
    for symbol in symbols {
        let Some(venue_snaps) = by_symbol_venue.get(symbol) else {
            continue;
        };
        let (Some(binance), Some(bybit)) = (venue_snaps.get("binance"), venue_snaps.get("bybit"))
        else {
            continue;
        };

        let assignments = [
            (CexVenue::Binance, CexVenue::Bybit, *binance, *bybit),
            (CexVenue::Bybit, CexVenue::Binance, *bybit, *binance),
        ];
        for (long, short, long_snap, short_snap) in assignments {
            if let Some(candidate) =
                build_candidate(run_at, long, short, long_snap, short_snap, params)
            {
                out.push(candidate);
            }
        }
    }

    sort_by_gross_desc(&mut out);
    out
}

/// Normalized funding snapshots from both perp venues, requested symbols
/// only, in venue-then-symbol order for reproducible diffs.
pub async fn normalized_funding(
    source: &dyn SnapshotSource,
    symbols: &[String],
) -> Vec<FundingSnapshot> {
    let mut out = Vec::new();
    for venue in CexVenue::all() {
        match source.fetch_perp(venue).await {
            Ok(snaps) => {
                let mut wanted: BTreeMap<String, FundingSnapshot> = snaps
                    .into_iter()
                    .map(|s| (format!("{}{}", s.base, s.quote), s))
                    .filter(|(raw, _)| symbols.contains(raw))
                    .collect();
                for symbol in symbols {
                    if let Some(snap) = wanted.remove(symbol) {
                        out.push(snap);
                    }
                }
            }
            Err(e) => warn!(venue = %venue, error = %e, "perp fetch failed"),
        }
    }
    out
}

pub struct FundingConfig {
    pub symbols: Vec<String>,
    pub params: FundingParams,
    pub funding_out: PathBuf,
    pub candidates_out: PathBuf,
}

pub fn run(config: &FundingConfig) -> Result<()> {
    let run_at = utc_now_rfc3339();
    let mut symbols = config.symbols.clone();
    symbols.sort();
    symbols.dedup();

    let rt = tokio::runtime::Runtime::new()?;
    let snapshots = rt.block_on(async {
        let source = LiveSource::new()?;
        anyhow::Ok(normalized_funding(&source, &symbols).await)
    })?;

    let candidates = build_candidates(&run_at, &symbols, &snapshots, &config.params);

    crate::io::write_json_pretty(&config.funding_out, &snapshots)?;
    crate::io::write_json_pretty(&config.candidates_out, &candidates)?;

    println!("Funding rows normalized: {}", snapshots.len());
    println!("Candidates built: {}", candidates.len());
    println!("Wrote: {}", config.funding_out.display());
    println!("Wrote: {}", config.candidates_out.display());
    Ok(())
}
