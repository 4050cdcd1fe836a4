//! Same-venue perp-spot basis carry. A perp premium is harvested by longing
//! spot and shorting the perp (cash-and-carry); a discount by the reverse.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::fetch::{CexVenue, LiveSource, SnapshotSource};
use crate::model::basis::BasisObservation;
use crate::model::candidate::Side;
use crate::model::{
    Candidate, Instrument, StrategyType, VenueTag, round2, round4, round6, utc_now_rfc3339,
};

use super::{
    perp_slippage_per_side_bps, perp_taker_fee_bps, sort_by_gross_desc,
    spot_slippage_per_side_bps, spot_taker_fee_bps,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryMode {
    Prepositioned,
    Transfer,
}

impl InventoryMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "prepositioned" => Some(InventoryMode::Prepositioned),
            "transfer" => Some(InventoryMode::Transfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryMode::Prepositioned => "prepositioned",
            InventoryMode::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BasisParams {
    pub size_usd: f64,
    pub min_gross_edge_bps: f64,
    /// Fraction of observed basis assumed capturable in the next cycle.
    pub basis_capture_ratio: f64,
    pub inventory_mode: InventoryMode,
}

impl Default for BasisParams {
    fn default() -> Self {
        Self {
            size_usd: 10_000.0,
            min_gross_edge_bps: 0.2,
            basis_capture_ratio: 0.22,
            inventory_mode: InventoryMode::Prepositioned,
        }
    }
}

fn venue_of(observation: &BasisObservation) -> Option<CexVenue> {
    match observation.venue.as_str() {
        "binance" => Some(CexVenue::Binance),
        "bybit" => Some(CexVenue::Bybit),
        _ => None,
    }
}

pub fn build_candidate(
    run_at: &str,
    observation: &BasisObservation,
    params: &BasisParams,
) -> Option<Candidate> {
    let venue = venue_of(observation)?;
    let basis_bps = observation.basis_mark_to_spot_bps;
    let funding_bps = observation.funding_rate_bps;

    let (buy_venue, sell_venue, direction, funding_edge_bps) = if basis_bps >= 0.0 {
        // Perp premium: short perp + long spot.
        (
            VenueTag::leg(Side::Long, venue.name(), Instrument::Spot).tag(),
            VenueTag::leg(Side::Short, venue.name(), Instrument::Perp).tag(),
            "cash_and_carry",
            funding_bps,
        )
    } else {
        // Perp discount: long perp + short spot.
        (
            VenueTag::leg(Side::Long, venue.name(), Instrument::Perp).tag(),
            VenueTag::leg(Side::Short, venue.name(), Instrument::Spot).tag(),
            "reverse_carry",
            -funding_bps,
        )
    };

    let capture_ratio = params.basis_capture_ratio.clamp(0.0, 1.0);
    let basis_capture_bps = basis_bps.abs() * capture_ratio;
    let gross_edge_bps = basis_capture_bps + funding_edge_bps;
    if gross_edge_bps < params.min_gross_edge_bps {
        return None;
    }

    // Entry + exit on both legs.
    let fees_bps = 2.0 * (spot_taker_fee_bps(venue) + perp_taker_fee_bps(venue));
    let slippage_bps =
        2.0 * (spot_slippage_per_side_bps(venue) + perp_slippage_per_side_bps(venue));

    let transfer_delay_min = match params.inventory_mode {
        InventoryMode::Prepositioned => 0.25,
        InventoryMode::Transfer => 5.0,
    };

    let latency_risk_bps =
        0.7 + (observation.minutes_to_funding / 60.0) * 0.2 + basis_bps.abs() * 0.015;

    Some(Candidate {
        detected_at: run_at.to_string(),
        strategy_type: StrategyType::PerpSpotBasis,
        symbol: observation.symbol.clone(),
        buy_venue,
        sell_venue,
        gross_edge_bps: round6(gross_edge_bps),
        fees_bps: round6(fees_bps),
        slippage_bps: round6(slippage_bps),
        latency_risk_bps: round6(latency_risk_bps),
        transfer_delay_min: round4(transfer_delay_min),
        size_usd: round2(params.size_usd),
        notes: format!(
            "{direction}; venue={}; basis_mark={basis_bps:.3}bps; funding={funding_bps:.3}bps; \
             basis_capture_ratio={capture_ratio:.2}; basis_capture={basis_capture_bps:.3}bps; \
             funding_component={funding_edge_bps:.3}bps; minutes_to_funding={:.2}; \
             inventory_mode={}",
            observation.venue,
            observation.minutes_to_funding,
            params.inventory_mode.as_str()
        ),
    })
}

pub fn build_candidates(
    run_at: &str,
    observations: &[BasisObservation],
    params: &BasisParams,
) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = observations
        .iter()
        .filter_map(|obs| build_candidate(run_at, obs, params))
        .collect();
    sort_by_gross_desc(&mut out);
    out
}

/// Pair spot and perp snapshots per venue per symbol into basis rows.
pub async fn normalized_basis(
    source: &dyn SnapshotSource,
    symbols: &[String],
) -> Vec<BasisObservation> {
    let mut out = Vec::new();

    for venue in CexVenue::all() {
        let spot = match source.fetch_spot_book(venue).await {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(venue = %venue, error = %e, "spot book fetch failed");
                continue;
            }
        };
        let perp = match source.fetch_perp(venue).await {
            Ok(snaps) => snaps,
            Err(e) => {
                warn!(venue = %venue, error = %e, "perp fetch failed");
                continue;
            }
        };

        let spot_by_symbol: BTreeMap<String, _> =
            spot.into_iter().map(|q| (q.raw_symbol(), q)).collect();
        let perp_by_symbol: BTreeMap<String, _> = perp
            .into_iter()
            .map(|s| (format!("{}{}", s.base, s.quote), s))
            .collect();

        for symbol in symbols {
            let (Some(spot_quote), Some(perp_snap)) =
                (spot_by_symbol.get(symbol), perp_by_symbol.get(symbol))
            else {
                continue;
            };
            out.push(BasisObservation::from_snapshots(spot_quote, perp_snap));
        }
    }

    out
}

pub struct BasisConfig {
    pub symbols: Vec<String>,
    pub params: BasisParams,
    pub basis_out: PathBuf,
    pub candidates_out: PathBuf,
}

pub fn run(config: &BasisConfig) -> Result<()> {
    let run_at = utc_now_rfc3339();
    let mut symbols = config.symbols.clone();
    symbols.sort();
    symbols.dedup();

    let rt = tokio::runtime::Runtime::new()?;
    let observations = rt.block_on(async {
        let source = LiveSource::new()?;
        anyhow::Ok(normalized_basis(&source, &symbols).await)
    })?;

    let candidates = build_candidates(&run_at, &observations, &config.params);

    crate::io::write_json_pretty(&config.basis_out, &observations)?;
    crate::io::write_json_pretty(&config.candidates_out, &candidates)?;

    println!("Basis rows normalized: {}", observations.len());
    println!("Candidates built: {}", candidates.len());
    println!("Wrote: {}", config.basis_out.display());
    println!("Wrote: {}", config.candidates_out.display());
    Ok(())
}
