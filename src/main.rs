use clap::Parser;

use arb_intel::candidates::basis::{self, BasisConfig, BasisParams, InventoryMode};
use arb_intel::candidates::cex_cex::{self, CexCexConfig, CexCexParams};
use arb_intel::candidates::cex_dex::{self, CexDexConfig, CexDexParams};
use arb_intel::candidates::funding::{self, FundingConfig, FundingParams};
use arb_intel::candidates::{default_size_tiers_usd, default_symbols, merge};
use arb_intel::cli::{Cli, Command};
use arb_intel::friction::{self, FrictionParams};
use arb_intel::overlay::constraints::{self, ConstraintsConfig};
use arb_intel::overlay::fee_table::{self, FeeTableConfig};
use arb_intel::scan::{self, RuleOverrides, ScanConfig};
use arb_intel::schema;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Cex {
            symbols,
            size_usd,
            size_tiers_usd,
            transfer_delay_min,
            min_gross_edge_bps,
            quotes_out,
            depth_out,
            candidates_out,
        } => cex_cex::run(&CexCexConfig {
            symbols: symbols.unwrap_or_else(default_symbols),
            size_tiers_usd: size_tiers_usd.unwrap_or_else(default_size_tiers_usd),
            params: CexCexParams {
                size_usd,
                transfer_delay_min,
                min_gross_edge_bps,
            },
            quotes_out,
            depth_out,
            candidates_out,
        }),
        Command::CexDex {
            size_usd,
            slippage_bps,
            transfer_delay_min,
            min_gross_edge_bps,
            max_ref_deviation_bps,
            network_friction,
            dex_router_fee_bps,
            dex_quotes_out,
            candidates_out,
        } => cex_dex::run(&CexDexConfig {
            params: CexDexParams {
                size_usd,
                slippage_bps,
                transfer_delay_min,
                min_gross_edge_bps,
                max_ref_deviation_bps,
            },
            network_friction,
            dex_router_fee_bps,
            dex_quotes_out,
            candidates_out,
        }),
        Command::Funding {
            symbols,
            size_usd,
            min_gross_edge_bps,
            funding_out,
            candidates_out,
        } => funding::run(&FundingConfig {
            symbols: symbols.unwrap_or_else(default_symbols),
            params: FundingParams {
                size_usd,
                min_gross_edge_bps,
            },
            funding_out,
            candidates_out,
        }),
        Command::Basis {
            symbols,
            size_usd,
            basis_capture_ratio,
            min_gross_edge_bps,
            inventory_mode,
            basis_out,
            candidates_out,
        } => {
            let Some(inventory_mode) = InventoryMode::parse(&inventory_mode) else {
                anyhow::bail!(
                    "Unknown inventory mode `{inventory_mode}`. Valid modes: prepositioned, transfer"
                );
            };
            basis::run(&BasisConfig {
                symbols: symbols.unwrap_or_else(default_symbols),
                params: BasisParams {
                    size_usd,
                    min_gross_edge_bps,
                    basis_capture_ratio,
                    inventory_mode,
                },
                basis_out,
                candidates_out,
            })
        }
        Command::NetworkFriction {
            size_usd,
            dex_roundtrip_tx_legs,
            solana_compute_units_per_leg,
            evm_gas_units_per_leg,
            jupiter_router_fee_bps,
            output,
        } => friction::run(
            &FrictionParams {
                size_usd,
                dex_roundtrip_tx_legs,
                solana_compute_units_per_leg,
                evm_gas_units_per_leg,
                jupiter_router_fee_bps,
            },
            &output,
        ),
        Command::Merge { inputs, output } => merge::run(&inputs, &output),
        Command::Constraints {
            input,
            output,
            quotes,
            authenticated,
            min_inventory_usd,
        } => constraints::run(&ConstraintsConfig {
            input,
            output,
            quotes,
            authenticated,
            min_inventory_usd,
        }),
        Command::FeeTable {
            input,
            output,
            authenticated,
        } => fee_table::run(&FeeTableConfig {
            input,
            output,
            authenticated,
        }),
        Command::Scan {
            input,
            output_json,
            output_md,
            output_summary,
            execution_profile,
            constraints,
            fee_table,
            fee_multiplier,
            slippage_multiplier,
            latency_multiplier,
            transfer_delay_multiplier,
            transfer_penalty_bps_per_min,
            min_net_edge_bps,
            max_risk_score,
        } => scan::run(&ScanConfig {
            input,
            output_json,
            output_md,
            output_summary,
            execution_profile,
            constraints,
            fee_table,
            overrides: RuleOverrides {
                fee_multiplier,
                slippage_multiplier,
                latency_multiplier,
                transfer_delay_multiplier,
                transfer_penalty_bps_per_min,
                min_net_edge_bps,
                max_risk_score,
            },
        }),
        Command::Schema { kind } => schema::run(&kind),
    }
}
