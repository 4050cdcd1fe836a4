//! Jupiter router quotes: price a token both ways at a USD notional.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::model::quote::DexQuote;

use super::{DexToken, retry};

const QUOTE_URL: &str = "https://lite-api.jup.ag/swap/v1/quote";

pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDC_DECIMALS: u32 = 6;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "outAmount")]
    out_amount: Option<String>,
    #[serde(rename = "priceImpactPct")]
    price_impact_pct: Option<String>,
    #[serde(rename = "routePlan", default)]
    route_plan: Vec<serde_json::Value>,
}

async fn fetch_quote(
    client: &reqwest::Client,
    input_mint: &str,
    output_mint: &str,
    amount_atomic: u64,
    slippage_bps: u32,
) -> Result<QuoteResponse> {
    let url = format!(
        "{QUOTE_URL}?inputMint={input_mint}&outputMint={output_mint}\
         &amount={amount_atomic}&slippageBps={slippage_bps}&restrictIntermediateTokens=true"
    );
    retry(1, || {
        let client = client.clone();
        let url = url.clone();
        async move {
            let r = client
                .get(&url)
                .timeout(super::dex_timeout())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(r)
        }
    })
    .await
    .context("fetching jupiter quote")
}

fn atomic_out(raw: Option<&str>) -> Option<f64> {
    let value: f64 = raw?.trim().parse().ok()?;
    if value > 0.0 { Some(value) } else { None }
}

/// Router reports impact as a fraction; negative or unparseable values
/// contribute zero.
fn impact_bps(raw: Option<&str>) -> f64 {
    let Some(fraction) = raw.and_then(|s| s.trim().parse::<f64>().ok()) else {
        return 0.0;
    };
    if fraction <= 0.0 {
        0.0
    } else {
        fraction * 10_000.0
    }
}

/// Quote both legs at the USD notional anchored by the CEX reference mid:
/// sell `base -> USDC` gives the DEX bid, buy `USDC -> base` the DEX ask.
/// Returns `Ok(None)` when the router produced no usable route.
pub async fn fetch_two_way_quote(
    client: &reqwest::Client,
    detected_at: &str,
    token: &DexToken,
    ref_mid: f64,
    size_usd: f64,
    slippage_bps: u32,
) -> Result<Option<DexQuote>> {
    if ref_mid <= 0.0 || size_usd <= 0.0 {
        return Ok(None);
    }

    let base_amount = (size_usd / ref_mid).max(0.0001);
    let base_amount_atomic = (base_amount * 10f64.powi(token.decimals as i32)) as u64;
    let usdc_amount_atomic = (size_usd * 10f64.powi(USDC_DECIMALS as i32)) as u64;
    if base_amount_atomic == 0 || usdc_amount_atomic == 0 {
        return Ok(None);
    }

    let sell_quote = fetch_quote(client, &token.mint, USDC_MINT, base_amount_atomic, slippage_bps)
        .await?;
    let buy_quote = fetch_quote(client, USDC_MINT, &token.mint, usdc_amount_atomic, slippage_bps)
        .await?;

    let (Some(out_usdc_atomic), Some(out_base_atomic)) = (
        atomic_out(sell_quote.out_amount.as_deref()),
        atomic_out(buy_quote.out_amount.as_deref()),
    ) else {
        debug!(token = %token.base, "jupiter returned no route");
        return Ok(None);
    };

    let out_usdc = out_usdc_atomic / 10f64.powi(USDC_DECIMALS as i32);
    let out_base = out_base_atomic / 10f64.powi(token.decimals as i32);
    if out_usdc <= 0.0 || out_base <= 0.0 {
        return Ok(None);
    }

    let dex_bid = out_usdc / base_amount;
    let dex_ask = size_usd / out_base;
    let dex_mid = (dex_bid + dex_ask) / 2.0;
    let raw_spread_bps = ((dex_ask - dex_bid) / dex_mid) * 10_000.0;
    let reference_deviation_bps = (dex_mid - ref_mid).abs() / ref_mid * 10_000.0;

    Ok(Some(DexQuote {
        detected_at: detected_at.to_string(),
        venue: "jupiter".to_string(),
        market: "solana-spot".to_string(),
        symbol: format!("{}/USDC", token.base),
        base: token.base.clone(),
        quote: "USDC".to_string(),
        bid_price: crate::model::round10(dex_bid),
        ask_price: crate::model::round10(dex_ask),
        mid_price: crate::model::round10(dex_mid),
        spread_bps: crate::model::round6(raw_spread_bps.max(0.0)),
        raw_spread_bps: crate::model::round6(raw_spread_bps),
        crossed_quote: raw_spread_bps < -1.0,
        buy_leg_price_impact_bps: crate::model::round6(impact_bps(
            buy_quote.price_impact_pct.as_deref(),
        )),
        sell_leg_price_impact_bps: crate::model::round6(impact_bps(
            sell_quote.price_impact_pct.as_deref(),
        )),
        route_hops_buy: buy_quote.route_plan.len(),
        route_hops_sell: sell_quote.route_plan.len(),
        cex_reference_mid: crate::model::round10(ref_mid),
        reference_deviation_bps: crate::model::round6(reference_deviation_bps),
        scan_size_usd: crate::model::round2(size_usd),
    }))
}
