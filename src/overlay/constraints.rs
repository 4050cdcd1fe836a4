//! Per-venue/asset constraint book: position caps, inventory, borrow
//! capacity, and leverage limits, with the gate logic the scorer applies.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fetch::{CexVenue, Credentials, LiveSource, SnapshotSource};
use crate::io::InputError;
use crate::model::quote::NormalizedQuote;
use crate::model::{Candidate, StrategyType, round2, round6, utc_now_rfc3339};

use super::{EPS, asset_from_symbol, canonical_venue};

pub const VERSION: &str = "execution_constraints_v1";

/// Wire value meaning "no position cap".
pub const UNBOUNDED_SENTINEL: f64 = 1e18;

const CORE_ASSETS: [&str; 3] = ["BTC", "ETH", "SOL"];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConstraintRule {
    pub venue: String,
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_position_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_inventory_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_borrow_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrow_rate_bps_per_hour: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_leverage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConstraintDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_position_usd: Option<f64>,
    #[serde(default)]
    pub available_inventory_usd: f64,
    #[serde(default)]
    pub max_borrow_usd: f64,
    #[serde(default = "default_borrow_rate")]
    pub borrow_rate_bps_per_hour: f64,
    /// Zero means no leverage cap.
    #[serde(default)]
    pub max_leverage: f64,
}

fn default_borrow_rate() -> f64 {
    1.0
}

impl Default for ConstraintDefaults {
    fn default() -> Self {
        Self {
            max_position_usd: Some(12_000.0),
            available_inventory_usd: 0.0,
            max_borrow_usd: 0.0,
            borrow_rate_bps_per_hour: 1.0,
            max_leverage: 0.0,
        }
    }
}

pub fn default_strategy_hold_hours() -> BTreeMap<String, f64> {
    [
        (StrategyType::CexCex, 0.20),
        (StrategyType::CexDex, 0.30),
        (StrategyType::FundingCarryCexCex, 8.0),
        (StrategyType::PerpSpotBasis, 8.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.as_str().to_string(), v))
    .collect()
}

/// Notional-at-risk multiple of `size_usd` per strategy: two-leg carry
/// families carry both legs' notional against the same equity.
pub fn default_strategy_leverage_multiplier() -> BTreeMap<String, f64> {
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

/// The persisted constraint artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConstraintFile {
    pub generated_at: String,
    pub version: String,
    #[serde(default)]
    pub defaults: ConstraintDefaults,
    #[serde(default = "default_strategy_hold_hours")]
    pub strategy_hold_hours: BTreeMap<String, f64>,
    #[serde(default = "default_strategy_leverage_multiplier")]
    pub strategy_leverage_notional_multiplier: BTreeMap<String, f64>,
    pub rules: Vec<ConstraintRule>,
}

// ── Resolution ──────────────────────────────────────────────────────

/// Limits for one leg after rule/defaults resolution and sentinel mapping.
#[derive(Debug, Clone, Copy)]
pub struct VenueLimits {
    /// `None` = unbounded.
    pub max_position_usd: Option<f64>,
    pub available_inventory_usd: f64,
    pub max_borrow_usd: f64,
    pub borrow_rate_bps_per_hour: f64,
    pub max_leverage: f64,
}

/// Constraint evaluation for one candidate: resolved limits, borrow math,
/// and the four gate flags.
#[derive(Debug, Clone)]
pub struct ConstraintAssessment {
    pub max_position_usd: Option<f64>,
    pub available_inventory_usd: f64,
    pub max_borrow_usd: f64,
    pub borrow_rate_bps_per_hour: f64,
    pub max_leverage: f64,
    pub hold_hours: f64,
    pub borrow_required_usd: f64,
    pub borrow_used_usd: f64,
    pub borrow_cost_bps: f64,
    pub leverage_notional_usd: f64,
    /// `None` when there is no equity base to divide by.
    pub leverage_used: Option<f64>,
    pub position_limit_exceeded: bool,
    pub inventory_unavailable: bool,
    pub borrow_limit_exceeded: bool,
    pub leverage_limit_exceeded: bool,
}

impl ConstraintAssessment {
    pub fn any_violation(&self) -> bool {
        self.position_limit_exceeded
            || self.inventory_unavailable
            || self.borrow_limit_exceeded
            || self.leverage_limit_exceeded
    }
}

/// Read-optimized constraint book used during a scoring run.
#[derive(Debug, Clone)]
pub struct ConstraintBook {
    rules: BTreeMap<(String, String), ConstraintRule>,
    known_venues: BTreeSet<String>,
    defaults: ConstraintDefaults,
    strategy_hold_hours: BTreeMap<String, f64>,
    strategy_leverage_multiplier: BTreeMap<String, f64>,
}

fn map_sentinel(cap: Option<f64>) -> Option<f64> {
    match cap {
        Some(v) if v >= UNBOUNDED_SENTINEL => None,
        other => other,
    }
}

impl ConstraintBook {
    pub fn from_file(file: &ConstraintFile) -> Self {
        let mut rules = BTreeMap::new();
        let mut known_venues = BTreeSet::new();
        for rule in &file.rules {
            let venue = rule.venue.trim().to_lowercase();
            let asset = rule.asset.trim().to_uppercase();
            if venue.is_empty() || asset.is_empty() {
                continue;
            }
            known_venues.insert(venue.clone());
            rules.insert((venue, asset), rule.clone());
        }
        Self {
            rules,
            known_venues,
            defaults: file.defaults.clone(),
            strategy_hold_hours: file.strategy_hold_hours.clone(),
            strategy_leverage_multiplier: file.strategy_leverage_notional_multiplier.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, InputError> {
        let file: ConstraintFile = crate::io::read_json(path)?;
        Ok(Self::from_file(&file))
    }

    fn limits_for(&self, raw_venue: &str, asset: &str) -> VenueLimits {
        let venue = canonical_venue(raw_venue, &self.known_venues);
        let rule = self.rules.get(&(venue, asset.to_string()));

        let d = &self.defaults;
        let cap = rule
            .and_then(|r| r.max_position_usd)
            .or(d.max_position_usd);
        VenueLimits {
            max_position_usd: map_sentinel(cap).map(|v| v.max(0.0)),
            available_inventory_usd: rule
                .and_then(|r| r.available_inventory_usd)
                .unwrap_or(d.available_inventory_usd)
                .max(0.0),
            max_borrow_usd: rule
                .and_then(|r| r.max_borrow_usd)
                .unwrap_or(d.max_borrow_usd)
                .max(0.0),
            borrow_rate_bps_per_hour: rule
                .and_then(|r| r.borrow_rate_bps_per_hour)
                .unwrap_or(d.borrow_rate_bps_per_hour)
                .max(0.0),
            max_leverage: rule
                .and_then(|r| r.max_leverage)
                .unwrap_or(d.max_leverage)
                .max(0.0),
        }
    }

    pub fn hold_hours(&self, strategy: StrategyType) -> f64 {
        self.strategy_hold_hours
            .get(strategy.as_str())
            .copied()
            .unwrap_or_else(|| {
                default_strategy_hold_hours()
                    .get(strategy.as_str())
                    .copied()
                    .unwrap_or(1.0)
            })
            .max(0.0)
    }

    pub fn leverage_multiplier(&self, strategy: StrategyType) -> f64 {
        self.strategy_leverage_multiplier
            .get(strategy.as_str())
            .copied()
            .unwrap_or(1.0)
            .max(0.0)
    }

    /// Evaluate all constraint gates for one candidate.
    ///
    /// Position cap is the tighter of the two legs. Inventory, borrow
    /// capacity, and borrow rate come from the sell side, the venue the
    /// position is funded from. The leverage cap is the smallest positive
    /// cap across legs; no positive cap means unconstrained.
    pub fn assess(&self, candidate: &Candidate) -> ConstraintAssessment {
        let asset = asset_from_symbol(&candidate.symbol);
        let buy = self.limits_for(&candidate.buy_venue, &asset);
        let sell = self.limits_for(&candidate.sell_venue, &asset);
        let size = candidate.size_usd;

        let max_position_usd = match (buy.max_position_usd, sell.max_position_usd) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        let available_inventory_usd = sell.available_inventory_usd;
        let max_borrow_usd = sell.max_borrow_usd;
        let borrow_rate_bps_per_hour = sell.borrow_rate_bps_per_hour;

        let max_leverage = [buy.max_leverage, sell.max_leverage]
            .into_iter()
            .filter(|&v| v > 0.0)
            .fold(0.0_f64, |acc, v| if acc == 0.0 { v } else { acc.min(v) });

        let position_limit_exceeded =
            max_position_usd.is_some_and(|cap| size > cap + EPS);

        let requires_inventory = candidate.strategy_type.requires_inventory();
        let borrow_required_usd = if requires_inventory {
            (size - available_inventory_usd).max(0.0)
        } else {
            0.0
        };
        let inventory_unavailable = requires_inventory
            && size > 0.0
            && available_inventory_usd <= 0.0
            && max_borrow_usd <= 0.0;
        let borrow_limit_exceeded = borrow_required_usd > max_borrow_usd + EPS;

        let hold_hours = self.hold_hours(candidate.strategy_type);
        let borrow_used_usd = borrow_required_usd.min(max_borrow_usd);
        let borrow_cost_bps = if size > 0.0 {
            (borrow_used_usd / size) * borrow_rate_bps_per_hour * hold_hours
        } else {
            0.0
        };

        let leverage_notional_usd = size * self.leverage_multiplier(candidate.strategy_type);
        let equity_base = available_inventory_usd.max(0.0);
        let leverage_used = if equity_base > 0.0 {
            Some(leverage_notional_usd / equity_base)
        } else {
            None
        };
        let leverage_limit_exceeded = max_leverage > 0.0
            && (equity_base <= 0.0
                || leverage_used.is_some_and(|used| used > max_leverage + EPS));

        ConstraintAssessment {
            max_position_usd,
            available_inventory_usd,
            max_borrow_usd,
            borrow_rate_bps_per_hour,
            max_leverage,
            hold_hours,
            borrow_required_usd,
            borrow_used_usd,
            borrow_cost_bps,
            leverage_notional_usd,
            leverage_used,
            position_limit_exceeded,
            inventory_unavailable,
            borrow_limit_exceeded,
            leverage_limit_exceeded,
        }
    }
}

// ── Template generation ─────────────────────────────────────────────

fn suggest_limits(max_size_usd: f64, asset: &str) -> ConstraintRule {
    let baseline = max_size_usd.max(1000.0);
    let borrow_rate = if CORE_ASSETS.contains(&asset) { 0.65 } else { 1.15 };

    ConstraintRule {
        venue: String::new(),
        asset: String::new(),
        max_position_usd: Some(round2(baseline * 1.4)),
        available_inventory_usd: Some(round2(baseline * 0.35)),
        max_borrow_usd: Some(round2(baseline * 0.75)),
        borrow_rate_bps_per_hour: Some(borrow_rate),
        max_leverage: None,
    }
}

/// Build/refresh the constraint template from the candidate universe.
pub fn build_template(
    candidates: &[Candidate],
    existing: Option<&ConstraintFile>,
) -> ConstraintFile {
    let known: BTreeSet<String> = existing
        .map(|file| {
            file.rules
                .iter()
                .map(|r| r.venue.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut existing_rules: BTreeMap<(String, String), ConstraintRule> = BTreeMap::new();
    if let Some(file) = existing {
        for rule in &file.rules {
            let venue = rule.venue.trim().to_lowercase();
            let asset = rule.asset.trim().to_uppercase();
            if !venue.is_empty() && !asset.is_empty() {
                existing_rules.insert((venue, asset), rule.clone());
            }
        }
    }

    let mut sizes_by_key: BTreeMap<(String, String), f64> = BTreeMap::new();
    for candidate in candidates {
        if candidate.size_usd <= 0.0 {
            continue;
        }
        let asset = asset_from_symbol(&candidate.symbol);
        for raw in [&candidate.buy_venue, &candidate.sell_venue] {
            let key = (canonical_venue(raw, &known), asset.clone());
            let entry = sizes_by_key.entry(key).or_insert(0.0);
            *entry = entry.max(candidate.size_usd);
        }
    }

    let mut rules: Vec<ConstraintRule> = Vec::new();
    for ((venue, asset), max_size) in &sizes_by_key {
        if let Some(rule) = existing_rules.get(&(venue.clone(), asset.clone())) {
            rules.push(rule.clone());
            continue;
        }
        let mut suggested = suggest_limits(*max_size, asset);
        suggested.venue = venue.clone();
        suggested.asset = asset.clone();
        rules.push(suggested);
    }
    // Keep legacy/manual entries no longer in the universe.
    for (key, rule) in &existing_rules {
        if !sizes_by_key.contains_key(key) {
            rules.push(rule.clone());
        }
    }
    sort_rules(&mut rules);

    let defaults = existing
        .map(|f| f.defaults.clone())
        .unwrap_or_default();

    let mut strategy_hold_hours = default_strategy_hold_hours();
    if let Some(file) = existing {
        for (k, v) in &file.strategy_hold_hours {
            strategy_hold_hours.insert(k.clone(), v.max(0.0));
        }
    }

    let mut strategy_leverage = default_strategy_leverage_multiplier();
    if let Some(file) = existing {
        for (k, v) in &file.strategy_leverage_notional_multiplier {
            strategy_leverage.insert(k.clone(), v.max(0.0));
        }
    }

    ConstraintFile {
        generated_at: utc_now_rfc3339(),
        version: VERSION.to_string(),
        defaults,
        strategy_hold_hours,
        strategy_leverage_notional_multiplier: strategy_leverage,
        rules,
    }
}

fn sort_rules(rules: &mut [ConstraintRule]) {
    rules.sort_by(|a, b| (a.venue.as_str(), a.asset.as_str()).cmp(&(b.venue.as_str(), b.asset.as_str())));
}

// ── Authenticated overlay ───────────────────────────────────────────

/// Median USD mid per asset from the normalized quote file; stables pin
/// to 1.0.
pub fn build_price_map(quotes: &[NormalizedQuote]) -> BTreeMap<String, f64> {
    let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for quote in quotes {
        if quote.mid_price <= 0.0 {
            continue;
        }
        if matches!(quote.quote.as_str(), "USDT" | "USDC" | "USD") {
            buckets
                .entry(quote.base.to_uppercase())
                .or_default()
                .push(quote.mid_price);
        }
    }

    let mut out: BTreeMap<String, f64> = [("USD", 1.0), ("USDT", 1.0), ("USDC", 1.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    for (asset, mut mids) in buckets {
        mids.sort_by(|a, b| a.total_cmp(b));
        out.entry(asset).or_insert(mids[mids.len() / 2]);
    }
    out
}

/// Replace template inventory with account-realized balances and tighten
/// position caps to `min(existing, inventory + max_borrow)`. Fail-soft per
/// venue; returns `(rules_updated, failure_notes)`.
pub async fn overlay_authenticated(
    file: &mut ConstraintFile,
    source: &dyn SnapshotSource,
    price_map: &BTreeMap<String, f64>,
    min_inventory_usd: f64,
) -> (usize, Vec<String>) {
    let mut inventory_by_venue: BTreeMap<&'static str, BTreeMap<String, f64>> = BTreeMap::new();
    let mut failures = Vec::new();

    for venue in CexVenue::all() {
        let Some(creds) = Credentials::from_env(venue) else {
            failures.push(format!("{}_auth_missing", venue.name()));
            continue;
        };
        match source.fetch_authenticated_balances(venue, &creds).await {
            Ok(balances) => {
                let mut usd_by_asset = BTreeMap::new();
                for (asset, qty) in balances {
                    let Some(&px) = price_map.get(&asset) else {
                        continue;
                    };
                    let usd = qty * px;
                    if usd >= min_inventory_usd {
                        usd_by_asset.insert(asset, round6(usd.max(0.0)));
                    }
                }
                inventory_by_venue.insert(venue.name(), usd_by_asset);
            }
            Err(e) => {
                warn!(venue = %venue, error = %e, "inventory fetch failed");
                failures.push(format!("{}_inventory_error", venue.name()));
            }
        }
    }

    let mut updated = 0;
    for rule in &mut file.rules {
        let venue = rule.venue.trim().to_lowercase();
        let asset = rule.asset.trim().to_uppercase();
        let Some(venue_inventory) = inventory_by_venue.get(venue.as_str()) else {
            continue;
        };
        if venue_inventory.is_empty() {
            continue;
        }

        let inv_usd = venue_inventory.get(&asset).copied().unwrap_or(0.0);
        let max_borrow = rule.max_borrow_usd.unwrap_or(0.0).max(0.0);
        let existing_cap = rule.max_position_usd.unwrap_or(0.0).max(0.0);

        let conservative_cap = inv_usd + max_borrow;
        let new_cap = if existing_cap > 0.0 {
            existing_cap.min(conservative_cap)
        } else {
            conservative_cap
        };

        rule.available_inventory_usd = Some(round6(inv_usd));
        rule.max_position_usd = Some(round6(new_cap.max(0.0)));
        updated += 1;
    }

    file.generated_at = utc_now_rfc3339();
    file.version = VERSION.to_string();
    sort_rules(&mut file.rules);
    (updated, failures)
}

// ── Command ─────────────────────────────────────────────────────────

pub struct ConstraintsConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quotes: PathBuf,
    pub authenticated: bool,
    pub min_inventory_usd: f64,
}

/// The `constraints` command: refresh the template from candidates, then
/// optionally overlay authenticated balances.
pub fn run(config: &ConstraintsConfig) -> Result<()> {
    let candidates: Vec<Candidate> = if config.input.exists() {
        crate::io::read_json_array(&config.input)?
    } else {
        Vec::new()
    };

    let existing: Option<ConstraintFile> = if config.output.exists() {
        Some(crate::io::read_json(&config.output)?)
    } else {
        None
    };

    let mut file = build_template(&candidates, existing.as_ref());

    if config.authenticated {
        let quotes: Vec<NormalizedQuote> = if config.quotes.exists() {
            crate::io::read_json_array(&config.quotes).unwrap_or_default()
        } else {
            Vec::new()
        };
        let price_map = build_price_map(&quotes);

        let rt = tokio::runtime::Runtime::new()?;
        let (updated, failures) = rt.block_on(async {
            let source = LiveSource::new()?;
            anyhow::Ok(
                overlay_authenticated(&mut file, &source, &price_map, config.min_inventory_usd)
                    .await,
            )
        })?;
        println!("Price map assets: {}", price_map.len());
        println!("Authenticated rules updated: {updated}");
        if !failures.is_empty() {
            let mut notes = failures;
            notes.sort();
            notes.dedup();
            println!("Auth notes: {}", notes.join(", "));
        }
    }

    crate::io::write_json_pretty(&config.output, &file)?;

    println!("Loaded candidates: {}", candidates.len());
    println!("Constraint rules: {}", file.rules.len());
    println!("Wrote: {}", config.output.display());
    Ok(())
}
