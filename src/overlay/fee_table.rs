//! Venue/instrument fee table: template generation from the candidate
//! universe, authenticated account-fee overlay, and scoring-time lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fetch::{CexVenue, Credentials, LiveSource, SnapshotSource};
use crate::io::InputError;
use crate::model::{Candidate, Instrument, StrategyType, round6, utc_now_rfc3339};

use super::{canonical_venue, instrument_from_venue};

pub const VERSION: &str = "execution_fee_table_v1";

/// How an execution profile pays: which column of a fee rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    Taker,
    Maker,
    MakerVip,
}

impl FeeMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "taker" => Some(FeeMode::Taker),
            "maker" => Some(FeeMode::Maker),
            "maker_vip" => Some(FeeMode::MakerVip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct InstrumentFees {
    pub taker_bps: f64,
    pub maker_bps: f64,
    pub maker_vip_bps: f64,
}

impl InstrumentFees {
    pub fn rate(&self, mode: FeeMode) -> f64 {
        match mode {
            FeeMode::Taker => self.taker_bps,
            FeeMode::Maker => self.maker_bps,
            FeeMode::MakerVip => self.maker_vip_bps,
        }
    }

    fn sanitized(&self, baseline: &InstrumentFees) -> InstrumentFees {
        let pick = |value: f64, fallback: f64| if value >= 0.0 { value } else { fallback };
        InstrumentFees {
            taker_bps: pick(self.taker_bps, baseline.taker_bps),
            maker_bps: pick(self.maker_bps, baseline.maker_bps),
            maker_vip_bps: pick(self.maker_vip_bps, baseline.maker_vip_bps),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeeRule {
    pub venue: String,
    pub instrument: Instrument,
    pub taker_bps: f64,
    pub maker_bps: f64,
    pub maker_vip_bps: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl FeeRule {
    fn fees(&self) -> InstrumentFees {
        InstrumentFees {
            taker_bps: self.taker_bps,
            maker_bps: self.maker_bps,
            maker_vip_bps: self.maker_vip_bps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeeDefaults {
    pub spot: InstrumentFees,
    pub perp: InstrumentFees,
    pub dex: InstrumentFees,
    pub unknown: InstrumentFees,
    pub strategy_roundtrip_side_multiplier: BTreeMap<String, f64>,
}

impl FeeDefaults {
    pub fn bucket(&self, instrument: Instrument) -> &InstrumentFees {
        match instrument {
            Instrument::Spot => &self.spot,
            Instrument::Perp => &self.perp,
            Instrument::Dex => &self.dex,
            Instrument::Unknown => &self.unknown,
        }
    }
}

/// The persisted fee-table artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeeTableFile {
    pub generated_at: String,
    pub version: String,
    pub defaults: FeeDefaults,
    pub profile_fee_mode: BTreeMap<String, String>,
    pub rules: Vec<FeeRule>,
}

// ── Baselines ───────────────────────────────────────────────────────

pub fn default_instrument_fees(instrument: Instrument) -> InstrumentFees {
    match instrument {
        Instrument::Spot => InstrumentFees {
            taker_bps: 10.0,
            maker_bps: 8.0,
            maker_vip_bps: 3.5,
        },
        Instrument::Perp => InstrumentFees {
            taker_bps: 5.5,
            maker_bps: 2.0,
            maker_vip_bps: 0.9,
        },
        Instrument::Dex => InstrumentFees {
            taker_bps: 6.0,
            maker_bps: 6.0,
            maker_vip_bps: 5.0,
        },
        Instrument::Unknown => InstrumentFees {
            taker_bps: 10.0,
            maker_bps: 8.0,
            maker_vip_bps: 4.0,
        },
    }
}

fn venue_baseline(venue: &str, instrument: Instrument) -> Option<InstrumentFees> {
    let fees = match (venue, instrument) {
        ("binance", Instrument::Spot) => InstrumentFees {
            taker_bps: 10.0,
            maker_bps: 8.0,
            maker_vip_bps: 2.8,
        },
        ("binance", Instrument::Perp) => InstrumentFees {
            taker_bps: 5.0,
            maker_bps: 2.0,
            maker_vip_bps: 0.8,
        },
        ("bybit", Instrument::Spot) => InstrumentFees {
            taker_bps: 10.0,
            maker_bps: 8.0,
            maker_vip_bps: 3.2,
        },
        ("bybit", Instrument::Perp) => InstrumentFees {
            taker_bps: 5.5,
            maker_bps: 2.0,
            maker_vip_bps: 1.0,
        },
        ("jupiter", Instrument::Dex) => InstrumentFees {
            taker_bps: 6.0,
            maker_bps: 6.0,
            maker_vip_bps: 5.0,
        },
        _ => return None,
    };
    Some(fees)
}

pub fn default_profile_fee_mode() -> BTreeMap<String, String> {
    [
        ("taker_default", "taker"),
        ("maker_inventory", "maker"),
        ("maker_inventory_vip", "maker_vip"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// How many round-trip sides the table charges per strategy. Spot families
/// embed one side per leg; carry families enter and exit both legs.
pub fn default_strategy_roundtrip_side_multiplier() -> BTreeMap<String, f64> {
    [
        (StrategyType::CexCex, 1.0),
        (StrategyType::CexDex, 1.0),
        (StrategyType::FundingCarryCexCex, 2.0),
        (StrategyType::PerpSpotBasis, 2.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.as_str().to_string(), v))
    .collect()
}

// ── Lookup ──────────────────────────────────────────────────────────

/// Read-optimized fee table used during a scoring run.
#[derive(Debug, Clone)]
pub struct FeeTable {
    rules: BTreeMap<(String, Instrument), InstrumentFees>,
    known_venues: BTreeSet<String>,
    defaults: FeeDefaults,
    profile_fee_mode: BTreeMap<String, String>,
}

impl FeeTable {
    pub fn from_file(file: &FeeTableFile) -> Self {
        let mut rules = BTreeMap::new();
        let mut known_venues = BTreeSet::new();
        for rule in &file.rules {
            let venue = rule.venue.trim().to_lowercase();
            if venue.is_empty() {
                continue;
            }
            known_venues.insert(venue.clone());
            rules.insert((venue, rule.instrument), rule.fees());
        }
        Self {
            rules,
            known_venues,
            defaults: file.defaults.clone(),
            profile_fee_mode: file.profile_fee_mode.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, InputError> {
        let file: FeeTableFile = crate::io::read_json(path)?;
        Ok(Self::from_file(&file))
    }

    pub fn canonical(&self, raw_venue: &str) -> String {
        canonical_venue(raw_venue, &self.known_venues)
    }

    /// Which fee column a profile pays, defaulting to taker.
    pub fn mode_for_profile(&self, profile: &str) -> FeeMode {
        self.profile_fee_mode
            .get(profile)
            .and_then(|raw| FeeMode::parse(raw))
            .unwrap_or(FeeMode::Taker)
    }

    /// Per-leg fee: specific rule, venue-unknown rule, instrument default,
    /// unknown default.
    pub fn fee_for(&self, raw_venue: &str, mode: FeeMode) -> f64 {
        let venue = self.canonical(raw_venue);
        let instrument = instrument_from_venue(raw_venue);

        let fees = self
            .rules
            .get(&(venue.clone(), instrument))
            .or_else(|| self.rules.get(&(venue, Instrument::Unknown)))
            .copied()
            .unwrap_or_else(|| *self.defaults.bucket(instrument));
        fees.rate(mode).max(0.0)
    }

    pub fn side_multiplier(&self, strategy: StrategyType) -> f64 {
        self.defaults
            .strategy_roundtrip_side_multiplier
            .get(strategy.as_str())
            .copied()
            .unwrap_or(1.0)
    }

    /// Round-trip fee total replacing a candidate's embedded fees.
    pub fn roundtrip_total_bps(&self, candidate: &Candidate, profile: &str) -> f64 {
        let mode = self.mode_for_profile(profile);
        let buy = self.fee_for(&candidate.buy_venue, mode);
        let sell = self.fee_for(&candidate.sell_venue, mode);
        ((buy + sell) * self.side_multiplier(candidate.strategy_type)).max(0.0)
    }
}

// ── Template generation ─────────────────────────────────────────────

/// Build/refresh the fee table from the current candidate universe.
/// Existing rules are preserved; new (venue, instrument) pairs get venue
/// baselines; manual entries outside the universe are kept.
pub fn build_template(candidates: &[Candidate], existing: Option<&FeeTableFile>) -> FeeTableFile {
    let known: BTreeSet<String> = existing
        .map(|file| {
            file.rules
                .iter()
                .map(|r| r.venue.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut existing_rules: BTreeMap<(String, Instrument), FeeRule> = BTreeMap::new();
    if let Some(file) = existing {
        for rule in &file.rules {
            let venue = rule.venue.trim().to_lowercase();
            if !venue.is_empty() {
                existing_rules.insert((venue, rule.instrument), rule.clone());
            }
        }
    }

    let mut seen_pairs: BTreeSet<(String, Instrument)> = BTreeSet::new();
    for candidate in candidates {
        for raw in [&candidate.buy_venue, &candidate.sell_venue] {
            seen_pairs.insert((canonical_venue(raw, &known), instrument_from_venue(raw)));
        }
    }

    let mut rules: Vec<FeeRule> = Vec::new();
    for (venue, instrument) in &seen_pairs {
        if let Some(rule) = existing_rules.get(&(venue.clone(), *instrument)) {
            rules.push(rule.clone());
            continue;
        }
        let baseline = venue_baseline(venue, *instrument)
            .unwrap_or_else(|| default_instrument_fees(*instrument));
        rules.push(FeeRule {
            venue: venue.clone(),
            instrument: *instrument,
            taker_bps: baseline.taker_bps,
            maker_bps: baseline.maker_bps,
            maker_vip_bps: baseline.maker_vip_bps,
            source: Some("template_baseline".to_string()),
        });
    }
    // Keep manual entries even if the current universe doesn't contain them.
    for (key, rule) in &existing_rules {
        if !seen_pairs.contains(key) {
            rules.push(rule.clone());
        }
    }
    sort_rules(&mut rules);

    let defaults = {
        let sanitize = |instrument: Instrument| {
            let baseline = default_instrument_fees(instrument);
            existing
                .map(|f| f.defaults.bucket(instrument).sanitized(&baseline))
                .unwrap_or(baseline)
        };
        let mut multiplier = default_strategy_roundtrip_side_multiplier();
        if let Some(file) = existing {
            for (k, v) in &file.defaults.strategy_roundtrip_side_multiplier {
                if *v >= 0.0 {
                    multiplier.insert(k.clone(), *v);
                }
            }
        }
        FeeDefaults {
            spot: sanitize(Instrument::Spot),
            perp: sanitize(Instrument::Perp),
            dex: sanitize(Instrument::Dex),
            unknown: sanitize(Instrument::Unknown),
            strategy_roundtrip_side_multiplier: multiplier,
        }
    };

    let mut profile_fee_mode = default_profile_fee_mode();
    if let Some(file) = existing {
        for (profile, mode) in &file.profile_fee_mode {
            if FeeMode::parse(mode).is_some() {
                profile_fee_mode.insert(profile.clone(), mode.trim().to_lowercase());
            }
        }
    }

    FeeTableFile {
        generated_at: utc_now_rfc3339(),
        version: VERSION.to_string(),
        defaults,
        profile_fee_mode,
        rules,
    }
}

fn sort_rules(rules: &mut [FeeRule]) {
    rules.sort_by(|a, b| {
        (a.venue.as_str(), a.instrument.as_str()).cmp(&(b.venue.as_str(), b.instrument.as_str()))
    });
}

// ── Authenticated overlay ───────────────────────────────────────────

fn sanitize_symbol(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if cleaned.is_empty() {
        "BTCUSDT".to_string()
    } else {
        cleaned
    }
}

/// A representative symbol per (venue, instrument), taken from the
/// candidate universe so fee queries hit markets we actually scan.
fn collect_symbols_by_venue(
    candidates: &[Candidate],
) -> BTreeMap<(CexVenue, Instrument), String> {
    let mut out: BTreeMap<(CexVenue, Instrument), String> = BTreeMap::new();

    for candidate in candidates {
        let symbol = sanitize_symbol(&candidate.symbol);
        for raw in [&candidate.buy_venue, &candidate.sell_venue] {
            let lowered = raw.to_lowercase();
            let venue = if lowered.contains("binance") {
                CexVenue::Binance
            } else if lowered.contains("bybit") {
                CexVenue::Bybit
            } else {
                continue;
            };
            let instrument = if ["perp", "future", "swap", "linear"]
                .iter()
                .any(|k| lowered.contains(k))
            {
                Instrument::Perp
            } else {
                Instrument::Spot
            };
            out.entry((venue, instrument)).or_insert(symbol.clone());
        }
    }

    for venue in CexVenue::all() {
        for instrument in [Instrument::Spot, Instrument::Perp] {
            out.entry((venue, instrument))
                .or_insert_with(|| "BTCUSDT".to_string());
        }
    }
    out
}

fn overlay_rule(
    rules: &mut Vec<FeeRule>,
    venue: &str,
    instrument: Instrument,
    taker_bps: f64,
    maker_bps: f64,
    source: &str,
) {
    let taker = round6(taker_bps.max(0.0));
    let maker = round6(maker_bps.max(0.0));

    if let Some(rule) = rules
        .iter_mut()
        .find(|r| r.venue == venue && r.instrument == instrument)
    {
        let existing_vip = if rule.maker_vip_bps >= 0.0 {
            rule.maker_vip_bps
        } else {
            maker
        };
        rule.taker_bps = taker;
        rule.maker_bps = maker;
        rule.maker_vip_bps = round6(existing_vip.min(maker));
        rule.source = Some(source.to_string());
        return;
    }

    rules.push(FeeRule {
        venue: venue.to_string(),
        instrument,
        taker_bps: taker,
        maker_bps: maker,
        maker_vip_bps: round6(maker),
        source: Some(source.to_string()),
    });
}

/// Replace template baselines with account-realized fees where credentials
/// allow. Returns failure notes; never errors past a single venue.
pub async fn overlay_authenticated(
    file: &mut FeeTableFile,
    source: &dyn SnapshotSource,
    candidates: &[Candidate],
) -> (usize, Vec<String>) {
    let symbols = collect_symbols_by_venue(candidates);
    let mut updated = 0;
    let mut failures = Vec::new();

    for venue in CexVenue::all() {
        let Some(creds) = Credentials::from_env(venue) else {
            failures.push(format!("{}_auth_missing", venue.name()));
            continue;
        };

        for instrument in [Instrument::Spot, Instrument::Perp] {
            let symbol = symbols
                .get(&(venue, instrument))
                .cloned()
                .unwrap_or_else(|| "BTCUSDT".to_string());

            match source
                .fetch_venue_fee_rate(venue, instrument, &symbol, &creds)
                .await
            {
                Ok(Some((taker_bps, maker_bps))) => {
                    overlay_rule(
                        &mut file.rules,
                        venue.name(),
                        instrument,
                        taker_bps,
                        maker_bps,
                        &format!("{}_authenticated_api", venue.name()),
                    );
                    updated += 1;
                }
                Ok(None) => {
                    failures.push(format!("{}_{}_no_data", venue.name(), instrument));
                }
                Err(e) => {
                    warn!(venue = %venue, %instrument, error = %e, "fee rate fetch failed");
                    failures.push(format!("{}_{}_error", venue.name(), instrument));
                }
            }
        }
    }

    file.generated_at = utc_now_rfc3339();
    file.version = VERSION.to_string();
    sort_rules(&mut file.rules);
    (updated, failures)
}

// ── Command ─────────────────────────────────────────────────────────

pub struct FeeTableConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub authenticated: bool,
}

/// The `fee-table` command: refresh the template from candidates, then
/// optionally overlay authenticated account fees.
pub fn run(config: &FeeTableConfig) -> Result<()> {
    let candidates: Vec<Candidate> = if config.input.exists() {
        crate::io::read_json_array(&config.input)?
    } else {
        Vec::new()
    };

    let existing: Option<FeeTableFile> = if config.output.exists() {
        Some(crate::io::read_json(&config.output)?)
    } else {
        None
    };

    let mut file = build_template(&candidates, existing.as_ref());

    if config.authenticated {
        let rt = tokio::runtime::Runtime::new()?;
        let (updated, failures) = rt.block_on(async {
            let source = LiveSource::new()?;
            anyhow::Ok(overlay_authenticated(&mut file, &source, &candidates).await)
        })?;
        println!("Authenticated rules updated: {updated}");
        if !failures.is_empty() {
            let mut notes: Vec<String> = failures.into_iter().collect();
            notes.sort();
            notes.dedup();
            println!("Auth notes: {}", notes.join(", "));
        }
    }

    crate::io::write_json_pretty(&config.output, &file)?;

    println!("Loaded candidates: {}", candidates.len());
    println!("Fee rules: {}", file.rules.len());
    println!("Wrote: {}", config.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_file() -> FeeTableFile {
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
            rules: vec![
                FeeRule {
                    venue: "binance".into(),
                    instrument: Instrument::Perp,
                    taker_bps: 5.0,
                    maker_bps: 2.0,
                    maker_vip_bps: 0.8,
                    source: None,
                },
                FeeRule {
                    venue: "bybit".into(),
                    instrument: Instrument::Spot,
                    taker_bps: 10.0,
                    maker_bps: 8.0,
                    maker_vip_bps: 3.2,
                    source: None,
                },
            ],
        }
    }

    #[test]
    fn lookup_hits_rule_then_defaults() {
        let table = FeeTable::from_file(&table_file());
        assert_eq!(table.fee_for("long_binance_perp", FeeMode::Taker), 5.0);
        assert_eq!(table.fee_for("short_bybit_spot", FeeMode::MakerVip), 3.2);
        // No binance spot rule: falls to the spot instrument default.
        assert_eq!(table.fee_for("binance", FeeMode::Taker), 10.0);
        // Unknown venue, dex instrument: dex default.
        assert_eq!(table.fee_for("orca", FeeMode::Taker), 6.0);
    }

    #[test]
    fn roundtrip_doubles_for_carry_strategies() {
        let table = FeeTable::from_file(&table_file());
        let candidate = Candidate {
            detected_at: String::new(),
            strategy_type: StrategyType::FundingCarryCexCex,
            symbol: "BTC/USDT".into(),
            buy_venue: "long_binance_perp".into(),
            sell_venue: "short_bybit_perp".into(),
            gross_edge_bps: 5.0,
            fees_bps: 0.0,
            slippage_bps: 0.0,
            latency_risk_bps: 0.0,
            transfer_delay_min: 0.0,
            size_usd: 10_000.0,
            notes: String::new(),
        };
        // bybit perp has no rule: perp default taker 5.5. (5.0 + 5.5) * 2.
        assert!((table.roundtrip_total_bps(&candidate, "taker_default") - 21.0).abs() < 1e-9);
    }

    #[test]
    fn template_seeds_baselines_from_candidates() {
        let candidate = Candidate {
            detected_at: String::new(),
            strategy_type: StrategyType::CexCex,
            symbol: "BTC/USDT".into(),
            buy_venue: "binance".into(),
            sell_venue: "bybit".into(),
            gross_edge_bps: 5.0,
            fees_bps: 17.5,
            slippage_bps: 2.0,
            latency_risk_bps: 1.0,
            transfer_delay_min: 5.0,
            size_usd: 10_000.0,
            notes: String::new(),
        };
        let file = build_template(&[candidate], None);
        assert_eq!(file.rules.len(), 2);
        let binance = file
            .rules
            .iter()
            .find(|r| r.venue == "binance" && r.instrument == Instrument::Spot)
            .unwrap();
        assert_eq!(binance.maker_vip_bps, 2.8);
        assert_eq!(binance.source.as_deref(), Some("template_baseline"));
    }

    #[test]
    fn overlay_caps_vip_at_maker() {
        let mut rules = vec![FeeRule {
            venue: "binance".into(),
            instrument: Instrument::Spot,
            taker_bps: 10.0,
            maker_bps: 8.0,
            maker_vip_bps: 2.8,
            source: None,
        }];
        overlay_rule(&mut rules, "binance", Instrument::Spot, 7.5, 2.0, "test");
        assert_eq!(rules[0].taker_bps, 7.5);
        assert_eq!(rules[0].maker_bps, 2.0);
        assert_eq!(rules[0].maker_vip_bps, 2.0);
    }
}
