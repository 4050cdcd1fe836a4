//! The scoring run: load candidates and overlays, score in parallel,
//! emit shortlist + dashboard + rejection summary.

pub mod report;
pub mod score;
pub mod summary;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;

use crate::model::{Candidate, ExecutionProfile, utc_now_rfc3339};
use crate::overlay::constraints::ConstraintBook;
use crate::overlay::fee_table::FeeTable;

use score::{ScoredOpportunity, score_candidate, sort_shortlist};

/// Resolved per-run rules: profile values after CLI overrides and the
/// fee-table interaction of §4.3 (the profile's fee multiplier yields to 1
/// under the table unless explicitly overridden).
#[derive(Debug, Clone)]
pub struct ScanRules {
    pub profile_name: String,
    pub fee_multiplier: f64,
    pub slippage_multiplier: f64,
    pub latency_multiplier: f64,
    pub transfer_delay_multiplier: f64,
    pub transfer_penalty_bps_per_min: f64,
    pub min_net_edge_bps: f64,
    pub max_risk_score: f64,
    pub fee_table_enabled: bool,
    pub constraints_enabled: bool,
}

/// CLI-level overrides for individual rule fields.
#[derive(Debug, Clone, Default)]
pub struct RuleOverrides {
    pub fee_multiplier: Option<f64>,
    pub slippage_multiplier: Option<f64>,
    pub latency_multiplier: Option<f64>,
    pub transfer_delay_multiplier: Option<f64>,
    pub transfer_penalty_bps_per_min: Option<f64>,
    pub min_net_edge_bps: Option<f64>,
    pub max_risk_score: Option<f64>,
}

impl ScanRules {
    pub fn resolve(
        profile: &ExecutionProfile,
        overrides: &RuleOverrides,
        fee_table_enabled: bool,
        constraints_enabled: bool,
    ) -> Self {
        let fee_multiplier = overrides.fee_multiplier.unwrap_or(if fee_table_enabled {
            1.0
        } else {
            profile.fee_multiplier
        });

        Self {
            profile_name: profile.name.clone(),
            fee_multiplier,
            slippage_multiplier: overrides
                .slippage_multiplier
                .unwrap_or(profile.slippage_multiplier),
            latency_multiplier: overrides
                .latency_multiplier
                .unwrap_or(profile.latency_multiplier),
            transfer_delay_multiplier: overrides
                .transfer_delay_multiplier
                .unwrap_or(profile.transfer_delay_multiplier),
            transfer_penalty_bps_per_min: overrides
                .transfer_penalty_bps_per_min
                .unwrap_or(profile.transfer_penalty_bps_per_min),
            min_net_edge_bps: overrides.min_net_edge_bps.unwrap_or(profile.min_net_edge_bps),
            max_risk_score: overrides.max_risk_score.unwrap_or(profile.max_risk_score),
            fee_table_enabled,
            constraints_enabled,
        }
    }
}

pub struct ScanConfig {
    pub input: PathBuf,
    pub output_json: PathBuf,
    pub output_md: Option<PathBuf>,
    pub output_summary: Option<PathBuf>,
    pub execution_profile: String,
    pub constraints: Option<PathBuf>,
    pub fee_table: Option<PathBuf>,
    pub overrides: RuleOverrides,
}

/// Score all candidates. Candidates are independent and the tables are
/// read-only, so scoring fans out across a rayon pool.
pub fn score_all(
    candidates: &[Candidate],
    rules: &ScanRules,
    fee_table: Option<&FeeTable>,
    book: Option<&ConstraintBook>,
) -> Vec<ScoredOpportunity> {
    let mut scored: Vec<ScoredOpportunity> = candidates
        .par_iter()
        .map(|candidate| score_candidate(candidate, rules, fee_table, book))
        .collect();
    sort_shortlist(&mut scored);
    scored
}

/// The `scan` command. Exit is successful regardless of whether anything
/// qualified; only structurally invalid input errors out.
pub fn run(config: &ScanConfig) -> Result<()> {
    let Some(profile) = ExecutionProfile::by_name(&config.execution_profile) else {
        bail!(
            "Unknown execution profile `{}`. Valid profiles: {}",
            config.execution_profile,
            ExecutionProfile::names().join(", ")
        );
    };

    let candidates: Vec<Candidate> = crate::io::read_json_array(&config.input)
        .with_context(|| format!("loading candidates from {}", config.input.display()))?;

    let fee_table = config
        .fee_table
        .as_ref()
        .map(|path| {
            FeeTable::load(path).with_context(|| format!("loading fee table {}", path.display()))
        })
        .transpose()?;
    let book = config
        .constraints
        .as_ref()
        .map(|path| {
            ConstraintBook::load(path)
                .with_context(|| format!("loading constraints {}", path.display()))
        })
        .transpose()?;

    let rules = ScanRules::resolve(
        &profile,
        &config.overrides,
        fee_table.is_some(),
        book.is_some(),
    );

    let scored = score_all(&candidates, &rules, fee_table.as_ref(), book.as_ref());

    let run_at = utc_now_rfc3339();
    crate::io::write_json_pretty(&config.output_json, &scored)?;

    if let Some(path) = &config.output_md {
        let markdown = report::render_markdown(&scored, &rules, &run_at);
        crate::io::write_text(path, &markdown)?;
    }

    if let Some(path) = &config.output_summary {
        let summary = summary::build_summary(
            &scored,
            &rules,
            &config.input.display().to_string(),
            config.constraints.as_ref().map(|p| p.display().to_string()).as_deref(),
            config.fee_table.as_ref().map(|p| p.display().to_string()).as_deref(),
        );
        crate::io::write_json_pretty(path, &summary)?;
    }

    let qualified = scored.iter().filter(|s| s.is_qualified).count();
    println!("Scored {} candidates.", scored.len());
    println!("Qualified: {qualified}");
    println!("Wrote: {}", config.output_json.display());
    if let Some(path) = &config.output_md {
        println!("Wrote: {}", path.display());
    }
    if let Some(path) = &config.output_summary {
        println!("Wrote: {}", path.display());
    }
    Ok(())
}
