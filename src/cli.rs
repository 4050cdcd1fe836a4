use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Crypto-market opportunity scanner — build live arbitrage candidates,
/// overlay execution constraints and fees, and score a ranked shortlist.
#[derive(Parser)]
#[command(name = "arb-intel", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build normalized CEX quotes, depth slippage curves, and spot
    /// cross-venue candidates
    Cex {
        /// Symbols like BTCUSDT ETHUSDT (defaults to the scan universe)
        #[arg(long, num_args = 1..)]
        symbols: Option<Vec<String>>,

        /// Assumed scan size in USD
        #[arg(long, default_value = "10000.0")]
        size_usd: f64,

        /// USD tiers for the orderbook slippage curve
        #[arg(long, num_args = 1..)]
        size_tiers_usd: Option<Vec<f64>>,

        /// Estimated cross-venue transfer delay in minutes
        #[arg(long, default_value = "5.0")]
        transfer_delay_min: f64,

        /// Drop directions below this gross edge
        #[arg(long, default_value = "0.2")]
        min_gross_edge_bps: f64,

        #[arg(long, default_value = "data/normalized_quotes_cex_latest.json")]
        quotes_out: PathBuf,

        #[arg(long, default_value = "data/cex_depth_slippage_latest.json")]
        depth_out: PathBuf,

        #[arg(long, default_value = "data/opportunity_candidates.live.json")]
        candidates_out: PathBuf,
    },

    /// Build CEX-vs-DEX candidates (Binance/Bybit vs Jupiter)
    CexDex {
        /// Notional size for quoting and the friction model
        #[arg(long, default_value = "5000.0")]
        size_usd: f64,

        /// Jupiter quote slippage setting (bps)
        #[arg(long, default_value = "30")]
        slippage_bps: u32,

        /// Conservative cross-venue transfer delay in minutes
        #[arg(long, default_value = "12.0")]
        transfer_delay_min: f64,

        /// Drop directions below this gross edge
        #[arg(long, default_value = "0.2")]
        min_gross_edge_bps: f64,

        /// Reject DEX quotes that drift too far from the CEX reference mid
        #[arg(long, default_value = "400.0")]
        max_ref_deviation_bps: f64,

        /// Network friction model JSON for dynamic DEX fee adjustments
        #[arg(long, default_value = "data/network_friction.latest.json")]
        network_friction: PathBuf,

        /// Fallback Jupiter router fee bps when no network model exists
        #[arg(long, default_value = "4.0")]
        dex_router_fee_bps: f64,

        #[arg(long, default_value = "data/normalized_quotes_dex_latest.json")]
        dex_quotes_out: PathBuf,

        #[arg(long, default_value = "data/opportunity_candidates.cex_dex.live.json")]
        candidates_out: PathBuf,
    },

    /// Build cross-venue funding carry candidates from perp markets
    Funding {
        #[arg(long, num_args = 1..)]
        symbols: Option<Vec<String>>,

        #[arg(long, default_value = "10000.0")]
        size_usd: f64,

        #[arg(long, default_value = "0.4")]
        min_gross_edge_bps: f64,

        #[arg(long, default_value = "data/normalized_funding_latest.json")]
        funding_out: PathBuf,

        #[arg(long, default_value = "data/opportunity_candidates.funding.live.json")]
        candidates_out: PathBuf,
    },

    /// Build same-venue perp-spot basis candidates
    Basis {
        #[arg(long, num_args = 1..)]
        symbols: Option<Vec<String>>,

        #[arg(long, default_value = "10000.0")]
        size_usd: f64,

        /// Conservative fraction of observed basis assumed capturable in the
        /// next cycle
        #[arg(long, default_value = "0.22")]
        basis_capture_ratio: f64,

        #[arg(long, default_value = "0.2")]
        min_gross_edge_bps: f64,

        /// Transfer delay assumption: prepositioned or transfer
        #[arg(long, default_value = "prepositioned")]
        inventory_mode: String,

        #[arg(long, default_value = "data/normalized_basis_latest.json")]
        basis_out: PathBuf,

        #[arg(long, default_value = "data/opportunity_candidates.basis.live.json")]
        candidates_out: PathBuf,
    },

    /// Build the per-chain network friction model for DEX execution costs
    NetworkFriction {
        #[arg(long, default_value = "5000.0")]
        size_usd: f64,

        #[arg(long, default_value = "2")]
        dex_roundtrip_tx_legs: u32,

        #[arg(long, default_value = "250000")]
        solana_compute_units_per_leg: u64,

        #[arg(long, default_value = "180000")]
        evm_gas_units_per_leg: u64,

        #[arg(long, default_value = "4.0")]
        jupiter_router_fee_bps: f64,

        #[arg(long, default_value = "data/network_friction.latest.json")]
        output: PathBuf,
    },

    /// Merge candidate JSON arrays into one combined universe
    Merge {
        /// Input JSON files (arrays); missing files are skipped
        #[arg(long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long)]
        output: PathBuf,
    },

    /// Build/refresh the execution constraint book from candidates
    Constraints {
        #[arg(long, default_value = "data/opportunity_candidates.combined.live.json")]
        input: PathBuf,

        #[arg(long, default_value = "data/execution_constraints.latest.json")]
        output: PathBuf,

        /// Normalized quote file used to value balances in USD
        #[arg(long, default_value = "data/normalized_quotes_cex_latest.json")]
        quotes: PathBuf,

        /// Overlay template inventory with authenticated balances
        #[arg(long)]
        authenticated: bool,

        /// Drop balances below this USD value
        #[arg(long, default_value = "1.0")]
        min_inventory_usd: f64,
    },

    /// Build/refresh the execution fee table from candidates
    FeeTable {
        #[arg(long, default_value = "data/opportunity_candidates.combined.live.json")]
        input: PathBuf,

        #[arg(long, default_value = "data/execution_fee_table.latest.json")]
        output: PathBuf,

        /// Overlay template baselines with authenticated account fees
        #[arg(long)]
        authenticated: bool,
    },

    /// Score candidates into a ranked shortlist with rejection attribution
    Scan {
        #[arg(long, default_value = "data/opportunity_candidates.combined.live.json")]
        input: PathBuf,

        #[arg(long, default_value = "opportunities/shortlist-latest.json")]
        output_json: PathBuf,

        /// Markdown dashboard output
        #[arg(long)]
        output_md: Option<PathBuf>,

        /// Rejection summary output
        #[arg(long)]
        output_summary: Option<PathBuf>,

        /// taker_default, maker_inventory, or maker_inventory_vip
        #[arg(long, default_value = "taker_default")]
        execution_profile: String,

        /// Constraint book JSON; enables inventory/borrow/leverage gates
        #[arg(long)]
        constraints: Option<PathBuf>,

        /// Fee table JSON; replaces candidate-embedded fees
        #[arg(long)]
        fee_table: Option<PathBuf>,

        #[arg(long)]
        fee_multiplier: Option<f64>,

        #[arg(long)]
        slippage_multiplier: Option<f64>,

        #[arg(long)]
        latency_multiplier: Option<f64>,

        #[arg(long)]
        transfer_delay_multiplier: Option<f64>,

        #[arg(long)]
        transfer_penalty_bps_per_min: Option<f64>,

        #[arg(long)]
        min_net_edge_bps: Option<f64>,

        #[arg(long)]
        max_risk_score: Option<f64>,
    },

    /// Output the JSON schema for one of the persisted file formats
    Schema {
        /// candidate, shortlist, summary, fee-table, constraints, or
        /// network-friction
        #[arg(long, default_value = "candidate")]
        kind: String,
    },
}
