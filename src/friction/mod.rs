//! Network-friction model: per-chain DEX transaction costs translated into
//! USD and bps at a canonical notional, exported as fee overrides for the
//! cex_dex builder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fetch::{Chain, CexVenue, GasSample, GasStat, SnapshotSource};
use crate::model::{round4, round6, round8, utc_now_rfc3339};

pub const VERSION: &str = "network_friction_v1";

/// Fallback Jupiter router fee. The single owner of this constant; the
/// cex_dex builder only ever sees it through [`DexFeeModel`].
pub const DEFAULT_DEX_ROUTER_FEE_BPS: f64 = 4.0;

const FALLBACK_SOL_USD: f64 = 150.0;
const FALLBACK_ETH_USD: f64 = 2500.0;
const FALLBACK_MATIC_USD: f64 = 0.9;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FrictionAssumptions {
    pub dex_roundtrip_tx_legs: u32,
    pub solana_compute_units_per_leg: u64,
    pub evm_gas_units_per_leg: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SolanaFriction {
    pub source: String,
    pub base_fee_lamports_per_tx: f64,
    pub priority_micro_lamports_per_cu_median: f64,
    pub priority_micro_lamports_per_cu_p75: f64,
    pub compute_units_per_leg: u64,
    pub dex_roundtrip_tx_legs: u32,
    pub sol_usd: f64,
    pub estimated_cost_usd_roundtrip: f64,
    pub estimated_cost_bps_roundtrip: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EvmFriction {
    pub source: String,
    pub gas_price_gwei: f64,
    pub gas_units_per_leg: u64,
    pub dex_roundtrip_tx_legs: u32,
    pub native_usd: f64,
    pub estimated_cost_usd_roundtrip: f64,
    pub estimated_cost_bps_roundtrip: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Networks {
    pub solana: SolanaFriction,
    pub polygon: EvmFriction,
    pub ethereum: EvmFriction,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DexFeeOverride {
    pub router_fee_bps: f64,
    pub network_fee_bps: f64,
    pub total_fee_bps: f64,
    pub network_model: String,
}

/// The persisted friction artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkFrictionFile {
    pub generated_at: String,
    pub version: String,
    pub size_usd: f64,
    pub assumptions: FrictionAssumptions,
    pub market_refs: BTreeMap<String, f64>,
    pub dex_fee_overrides: BTreeMap<String, DexFeeOverride>,
    pub networks: Networks,
    pub warnings: Vec<String>,
}

/// What the cex_dex builder actually consumes: router + network fee and
/// where the numbers came from.
#[derive(Debug, Clone)]
pub struct DexFeeModel {
    pub router_fee_bps: f64,
    pub network_fee_bps: f64,
    pub source: String,
}

impl DexFeeModel {
    pub fn static_fallback(router_fee_bps: f64) -> Self {
        Self {
            router_fee_bps: router_fee_bps.max(0.0),
            network_fee_bps: 0.0,
            source: "static_router_fee".to_string(),
        }
    }

    pub fn total_fee_bps(&self) -> f64 {
        self.router_fee_bps.max(0.0) + self.network_fee_bps.max(0.0)
    }
}

/// Load the Jupiter fee override from a friction file, degrading to the
/// static router fee on any problem.
pub fn load_dex_fee_model(path: &Path, fallback_router_fee_bps: f64) -> DexFeeModel {
    let fallback = DexFeeModel::static_fallback(fallback_router_fee_bps);

    let Ok(text) = std::fs::read_to_string(path) else {
        return fallback;
    };
    let Ok(file) = serde_json::from_str::<NetworkFrictionFile>(&text) else {
        warn!(path = %path.display(), "unreadable network friction file, using static router fee");
        return fallback;
    };
    let Some(override_) = file.dex_fee_overrides.get("jupiter") else {
        return fallback;
    };

    let router = if override_.router_fee_bps > 0.0 {
        override_.router_fee_bps
    } else {
        fallback.router_fee_bps
    };
    DexFeeModel {
        router_fee_bps: router,
        network_fee_bps: override_.network_fee_bps.max(0.0),
        source: format!("network_friction:{}", file.version),
    }
}

fn bps(cost_usd: f64, size_usd: f64) -> f64 {
    if size_usd <= 0.0 {
        return 0.0;
    }
    ((cost_usd / size_usd) * 10_000.0).max(0.0)
}

/// Builder parameters for the friction command.
#[derive(Debug, Clone)]
pub struct FrictionParams {
    pub size_usd: f64,
    pub dex_roundtrip_tx_legs: u32,
    pub solana_compute_units_per_leg: u64,
    pub evm_gas_units_per_leg: u64,
    pub jupiter_router_fee_bps: f64,
}

impl Default for FrictionParams {
    fn default() -> Self {
        Self {
            size_usd: 5000.0,
            dex_roundtrip_tx_legs: 2,
            solana_compute_units_per_leg: 250_000,
            evm_gas_units_per_leg: 180_000,
            jupiter_router_fee_bps: DEFAULT_DEX_ROUTER_FEE_BPS,
        }
    }
}

/// Median Binance mid per reference symbol, with documented fallbacks.
async fn reference_mids(source: &dyn SnapshotSource) -> (BTreeMap<String, f64>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut out = BTreeMap::new();

    match source.fetch_spot_book(CexVenue::Binance).await {
        Ok(quotes) => {
            for quote in quotes {
                let raw = quote.raw_symbol();
                if matches!(raw.as_str(), "SOLUSDT" | "ETHUSDT" | "MATICUSDT") {
                    out.insert(raw, quote.mid_price);
                }
            }
        }
        Err(e) => warnings.push(format!("binance_price_fetch_failed: {e:#}")),
    }

    for (symbol, fallback) in [
        ("SOLUSDT", FALLBACK_SOL_USD),
        ("ETHUSDT", FALLBACK_ETH_USD),
        ("MATICUSDT", FALLBACK_MATIC_USD),
    ] {
        if !out.contains_key(symbol) {
            out.insert(symbol.to_string(), fallback);
            warnings.push(format!("{symbol}_fallback_used"));
        }
    }

    (out, warnings)
}

fn solana_cost(sample: &GasStat, sol_usd: f64, params: &FrictionParams) -> SolanaFriction {
    let (base_fee_lamports_per_tx, priority_micro_lamports_per_cu_median, priority_micro_lamports_per_cu_p75) =
        match &sample.sample {
            GasSample::Solana {
                base_fee_lamports_per_tx,
                priority_micro_lamports_per_cu_median,
                priority_micro_lamports_per_cu_p75,
            } => (
                *base_fee_lamports_per_tx,
                *priority_micro_lamports_per_cu_median,
                *priority_micro_lamports_per_cu_p75,
            ),
            GasSample::Evm { .. } => (crate::fetch::gas::SOLANA_BASE_FEE_LAMPORTS, 0.0, 0.0),
        };

    let priority_lamports_per_leg = (priority_micro_lamports_per_cu_median
        * params.solana_compute_units_per_leg as f64)
        / 1_000_000.0;
    let total_lamports =
        params.dex_roundtrip_tx_legs as f64 * (base_fee_lamports_per_tx + priority_lamports_per_leg);
    let cost_usd = total_lamports / 1_000_000_000.0 * sol_usd;

    SolanaFriction {
        source: sample.source.clone(),
        base_fee_lamports_per_tx,
        priority_micro_lamports_per_cu_median: round6(priority_micro_lamports_per_cu_median),
        priority_micro_lamports_per_cu_p75: round6(priority_micro_lamports_per_cu_p75),
        compute_units_per_leg: params.solana_compute_units_per_leg,
        dex_roundtrip_tx_legs: params.dex_roundtrip_tx_legs,
        sol_usd: round8(sol_usd),
        estimated_cost_usd_roundtrip: round8(cost_usd),
        estimated_cost_bps_roundtrip: round8(bps(cost_usd, params.size_usd)),
        warnings: sample.warnings.clone(),
    }
}

fn evm_cost(sample: &GasStat, native_usd: f64, params: &FrictionParams) -> EvmFriction {
    let gas_price_gwei = match &sample.sample {
        GasSample::Evm { gas_price_gwei } => *gas_price_gwei,
        GasSample::Solana { .. } => 0.0,
    };

    let total_gas_units = params.dex_roundtrip_tx_legs as f64 * params.evm_gas_units_per_leg as f64;
    let cost_native = gas_price_gwei * 1e-9 * total_gas_units;
    let cost_usd = cost_native * native_usd;

    EvmFriction {
        source: sample.source.clone(),
        gas_price_gwei: round8(gas_price_gwei),
        gas_units_per_leg: params.evm_gas_units_per_leg,
        dex_roundtrip_tx_legs: params.dex_roundtrip_tx_legs,
        native_usd: round8(native_usd),
        estimated_cost_usd_roundtrip: round8(cost_usd),
        estimated_cost_bps_roundtrip: round8(bps(cost_usd, params.size_usd)),
        warnings: sample.warnings.clone(),
    }
}

/// Assemble the friction model from live gas samples and reference mids.
pub async fn build(source: &dyn SnapshotSource, params: &FrictionParams) -> Result<NetworkFrictionFile> {
    let (mids, price_warnings) = reference_mids(source).await;
    let sol_usd = mids["SOLUSDT"];
    let eth_usd = mids["ETHUSDT"];
    let matic_usd = mids["MATICUSDT"];

    let solana_stat = source.fetch_network_gas(Chain::Solana).await?;
    let polygon_stat = source.fetch_network_gas(Chain::Polygon).await?;
    let ethereum_stat = source.fetch_network_gas(Chain::Ethereum).await?;

    let solana = solana_cost(&solana_stat, sol_usd, params);
    let polygon = evm_cost(&polygon_stat, matic_usd, params);
    let ethereum = evm_cost(&ethereum_stat, eth_usd, params);

    let router_fee = params.jupiter_router_fee_bps.max(0.0);
    let network_fee = solana.estimated_cost_bps_roundtrip;

    let mut dex_fee_overrides = BTreeMap::new();
    dex_fee_overrides.insert(
        "jupiter".to_string(),
        DexFeeOverride {
            router_fee_bps: round8(router_fee),
            network_fee_bps: round8(network_fee),
            total_fee_bps: round8(router_fee + network_fee),
            network_model: "solana".to_string(),
        },
    );

    let market_refs = mids
        .into_iter()
        .map(|(symbol, mid)| (symbol, round8(mid)))
        .collect();

    Ok(NetworkFrictionFile {
        generated_at: utc_now_rfc3339(),
        version: VERSION.to_string(),
        size_usd: round4(params.size_usd),
        assumptions: FrictionAssumptions {
            dex_roundtrip_tx_legs: params.dex_roundtrip_tx_legs,
            solana_compute_units_per_leg: params.solana_compute_units_per_leg,
            evm_gas_units_per_leg: params.evm_gas_units_per_leg,
        },
        market_refs,
        dex_fee_overrides,
        networks: Networks {
            solana,
            polygon,
            ethereum,
        },
        warnings: price_warnings,
    })
}

/// The `network-friction` command: build the model and write it out.
pub fn run(params: &FrictionParams, output: &PathBuf) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let file = rt.block_on(async {
        let source = crate::fetch::LiveSource::new()?;
        build(&source, params).await
    })?;

    crate::io::write_json_pretty(output, &file)?;

    let jupiter = &file.dex_fee_overrides["jupiter"];
    println!("Wrote: {}", output.display());
    println!(
        "Jupiter fee bps => router={:.4}, network={:.6}, total={:.6}",
        jupiter.router_fee_bps, jupiter.network_fee_bps, jupiter.total_fee_bps
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bps_clamps_and_scales() {
        assert_eq!(bps(5.0, 5000.0), 10.0);
        assert_eq!(bps(5.0, 0.0), 0.0);
        assert_eq!(bps(-5.0, 5000.0), 0.0);
    }

    #[test]
    fn dex_fee_model_totals_clamp_negative_components() {
        let model = DexFeeModel {
            router_fee_bps: 4.0,
            network_fee_bps: -1.0,
            source: "test".into(),
        };
        assert_eq!(model.total_fee_bps(), 4.0);
    }
}
