//! Per-chain gas-rate samples. Every fetch degrades to a documented
//! fallback sample instead of erroring; the friction model records the
//! degradation through `source` and `warnings`.

use serde::Deserialize;
use tracing::warn;

use super::{Chain, GasSample, GasStat};

const SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const POLYGON_GAS_URL: &str = "https://gasstation.polygon.technology/v2";
const ETH_GAS_URL: &str = "https://beaconcha.in/api/v1/execution/gasnow";

pub const SOLANA_BASE_FEE_LAMPORTS: f64 = 5_000.0;
const POLYGON_FALLBACK_GWEI: f64 = 120.0;
const ETH_FALLBACK_WEI: f64 = 30_000_000_000.0;

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut ranked = values.to_vec();
    ranked.sort_by(|a, b| a.total_cmp(b));
    if ranked.len() == 1 {
        return ranked[0];
    }
    let idx = (ranked.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = idx.floor() as usize;
    let hi = (lo + 1).min(ranked.len() - 1);
    let frac = idx - lo as f64;
    ranked[lo] * (1.0 - frac) + ranked[hi] * frac
}

#[derive(Debug, Deserialize)]
struct SolanaFeeRow {
    #[serde(rename = "prioritizationFee")]
    prioritization_fee: f64,
}

#[derive(Debug, Deserialize)]
struct SolanaRpcResponse {
    #[serde(default)]
    result: Vec<SolanaFeeRow>,
}

/// Recent prioritization-fee distribution (micro-lamports per CU).
pub async fn fetch_solana(client: &reqwest::Client) -> GasStat {
    let mut warnings = Vec::new();
    let mut source = "live".to_string();
    let mut median_fee = 0.0;
    let mut p75_fee = 0.0;

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getRecentPrioritizationFees",
        "params": [[]],
    });

    let fetched = async {
        let r: SolanaRpcResponse = client
            .post(SOLANA_RPC_URL)
            .timeout(super::dex_timeout())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        anyhow::Ok(r)
    }
    .await;

    match fetched {
        Ok(payload) => {
            let mut samples: Vec<f64> = payload
                .result
                .iter()
                .map(|row| row.prioritization_fee)
                .filter(|fee| *fee >= 0.0)
                .collect();
            if samples.is_empty() {
                warnings.push("solana_priority_fee_samples_empty".to_string());
            } else {
                p75_fee = percentile(&samples, 0.75);
                median_fee = median(&mut samples);
            }
        }
        Err(e) => {
            warn!(error = %e, "solana priority fee fetch failed");
            source = "fallback".to_string();
            warnings.push(format!("solana_priority_fee_fetch_failed: {e:#}"));
        }
    }

    GasStat {
        chain: Chain::Solana,
        source,
        sample: GasSample::Solana {
            base_fee_lamports_per_tx: SOLANA_BASE_FEE_LAMPORTS,
            priority_micro_lamports_per_cu_median: median_fee,
            priority_micro_lamports_per_cu_p75: p75_fee,
        },
        warnings,
    }
}

#[derive(Debug, Deserialize)]
struct PolygonStandard {
    #[serde(rename = "maxFee")]
    max_fee: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PolygonGasPayload {
    standard: Option<PolygonStandard>,
}

/// Gas-station standard maxFee in gwei.
pub async fn fetch_polygon(client: &reqwest::Client) -> GasStat {
    let mut warnings = Vec::new();
    let mut source = "live".to_string();
    let mut max_fee_gwei = POLYGON_FALLBACK_GWEI;

    let fetched = async {
        let r: PolygonGasPayload = client
            .get(POLYGON_GAS_URL)
            .timeout(super::dex_timeout())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        anyhow::Ok(r)
    }
    .await;

    match fetched {
        Ok(payload) => {
            let fee = payload.standard.and_then(|s| s.max_fee).unwrap_or(0.0);
            if fee > 0.0 {
                max_fee_gwei = fee;
            } else {
                warnings.push("polygon_max_fee_invalid_fallback_used".to_string());
            }
        }
        Err(e) => {
            warn!(error = %e, "polygon gas fetch failed");
            source = "fallback".to_string();
            warnings.push(format!("polygon_gas_fetch_failed: {e:#}"));
        }
    }

    GasStat {
        chain: Chain::Polygon,
        source,
        sample: GasSample::Evm {
            gas_price_gwei: max_fee_gwei,
        },
        warnings,
    }
}

#[derive(Debug, Deserialize)]
struct GasNowData {
    standard: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GasNowPayload {
    data: Option<GasNowData>,
}

/// gasnow standard price; the endpoint reports wei.
pub async fn fetch_ethereum(client: &reqwest::Client) -> GasStat {
    let mut warnings = Vec::new();
    let mut source = "live".to_string();
    let mut gas_wei = ETH_FALLBACK_WEI;

    let fetched = async {
        let r: GasNowPayload = client
            .get(ETH_GAS_URL)
            .timeout(super::dex_timeout())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        anyhow::Ok(r)
    }
    .await;

    match fetched {
        Ok(payload) => {
            let wei = payload.data.and_then(|d| d.standard).unwrap_or(0.0);
            if wei > 0.0 {
                gas_wei = wei;
            } else {
                warnings.push("eth_gas_invalid_fallback_used".to_string());
            }
        }
        Err(e) => {
            warn!(error = %e, "ethereum gas fetch failed");
            source = "fallback".to_string();
            warnings.push(format!("eth_gas_fetch_failed: {e:#}"));
        }
    }

    GasStat {
        chain: Chain::Ethereum,
        source,
        sample: GasSample::Evm {
            gas_price_gwei: gas_wei / 1e9,
        },
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_and_even_sets() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [0.0, 10.0];
        assert_eq!(percentile(&values, 0.75), 7.5);
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&[5.0], 0.75), 5.0);
    }
}
