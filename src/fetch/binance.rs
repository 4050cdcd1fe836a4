//! Binance spot + USD-M futures adapters, public and signed.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::model::depth::DepthLadder;
use crate::model::funding::{FundingSnapshot, PerpTicker};
use crate::model::quote::{Market, NormalizedQuote, safe_positive};

use super::{Credentials, retry};

const SPOT_HOST: &str = "https://api.binance.com";
const FUTURES_HOST: &str = "https://fapi.binance.com";

// ── Public market data ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BookTickerRow {
    symbol: String,
    #[serde(rename = "bidPrice")]
    bid_price: String,
    #[serde(rename = "askPrice")]
    ask_price: String,
}

pub async fn fetch_spot_book(
    client: &reqwest::Client,
    detected_at: &str,
) -> Result<Vec<NormalizedQuote>> {
    let url = format!("{SPOT_HOST}/api/v3/ticker/bookTicker");
    let rows: Vec<BookTickerRow> = retry(1, || {
        let client = client.clone();
        let url = url.clone();
        async move {
            let r = client
                .get(&url)
                .timeout(super::market_timeout())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(r)
        }
    })
    .await
    .context("fetching binance spot bookTicker")?;

    let mut out = Vec::new();
    for row in rows {
        let (Some(bid), Some(ask)) = (safe_positive(&row.bid_price), safe_positive(&row.ask_price))
        else {
            continue;
        };
        if let Some(quote) =
            NormalizedQuote::from_book(detected_at, "binance", Market::Spot, &row.symbol, bid, ask)
        {
            out.push(quote);
        }
    }
    debug!(rows = out.len(), "normalized binance spot book");
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct DepthPayload {
    #[serde(default)]
    bids: Vec<Vec<String>>,
    #[serde(default)]
    asks: Vec<Vec<String>>,
}

pub async fn fetch_orderbook(client: &reqwest::Client, symbol: &str) -> Result<DepthLadder> {
    let url = format!("{SPOT_HOST}/api/v3/depth?symbol={symbol}&limit=100");
    let payload: DepthPayload = retry(1, || {
        let client = client.clone();
        let url = url.clone();
        async move {
            let r = client
                .get(&url)
                .timeout(super::market_timeout())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(r)
        }
    })
    .await
    .with_context(|| format!("fetching binance depth for {symbol}"))?;

    Ok(DepthLadder::new(
        parse_levels(&payload.bids),
        parse_levels(&payload.asks),
    ))
}

pub(crate) fn parse_levels(rows: &[Vec<String>]) -> Vec<(f64, f64)> {
    rows.iter()
        .filter_map(|row| {
            if row.len() < 2 {
                return None;
            }
            Some((safe_positive(&row[0])?, safe_positive(&row[1])?))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct PremiumIndexRow {
    symbol: String,
    #[serde(rename = "markPrice")]
    mark_price: String,
    #[serde(rename = "indexPrice")]
    index_price: Option<String>,
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,
    #[serde(rename = "nextFundingTime")]
    next_funding_time: i64,
}

/// Perp mark/funding snapshots from the premiumIndex endpoint. The endpoint
/// carries no top-of-book, so those fields stay unset.
pub async fn fetch_perp_snapshots(
    client: &reqwest::Client,
    detected_at: &str,
    now_ms: i64,
) -> Result<Vec<FundingSnapshot>> {
    let url = format!("{FUTURES_HOST}/fapi/v1/premiumIndex");
    let rows: Vec<PremiumIndexRow> = retry(1, || {
        let client = client.clone();
        let url = url.clone();
        async move {
            let r = client
                .get(&url)
                .timeout(super::market_timeout())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(r)
        }
    })
    .await
    .context("fetching binance premiumIndex")?;

    let mut out = Vec::new();
    for row in rows {
        let Some(mark) = safe_positive(&row.mark_price) else {
            continue;
        };
        let Ok(funding_rate) = row.last_funding_rate.trim().parse::<f64>() else {
            continue;
        };
        let ticker = PerpTicker {
            funding_rate,
            mark_price: mark,
            index_price: row.index_price.as_deref().and_then(safe_positive),
            bid_price: None,
            ask_price: None,
            next_funding_ms: row.next_funding_time,
        };
        if let Some(snap) =
            FundingSnapshot::from_ticker(detected_at, now_ms, "binance", &row.symbol, &ticker)
        {
            out.push(snap);
        }
    }
    debug!(rows = out.len(), "normalized binance perp snapshots");
    Ok(out)
}

// ── Signed endpoints ────────────────────────────────────────────────

/// Signed GET against Binance: HMAC-SHA256 over the query string, key in
/// `X-MBX-APIKEY`. Futures paths route to the futures host.
async fn signed_get(
    client: &reqwest::Client,
    path: &str,
    params: &[(&str, String)],
    creds: &Credentials,
) -> Result<serde_json::Value> {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let mut query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(&format!("timestamp={timestamp}&recvWindow=5000"));

    let mut mac = Hmac::<Sha256>::new_from_slice(creds.api_secret.as_bytes())
        .context("invalid binance secret")?;
    mac.update(query.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    let host = if path.starts_with("/fapi") {
        FUTURES_HOST
    } else {
        SPOT_HOST
    };
    let url = format!("{host}{path}?{query}&signature={signature}");

    let value = client
        .get(&url)
        .timeout(super::auth_timeout())
        .header("X-MBX-APIKEY", &creds.api_key)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(value)
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    #[serde(default)]
    balances: Vec<AccountBalance>,
}

/// Free + locked quantity per asset, zero rows dropped.
pub async fn fetch_account_balances(
    client: &reqwest::Client,
    creds: &Credentials,
) -> Result<Vec<(String, f64)>> {
    let value = signed_get(client, "/api/v3/account", &[], creds)
        .await
        .context("fetching binance account")?;
    let payload: AccountPayload = serde_json::from_value(value)?;

    let mut out = Vec::new();
    for row in payload.balances {
        let free: f64 = row.free.trim().parse().unwrap_or(0.0);
        let locked: f64 = row.locked.trim().parse().unwrap_or(0.0);
        let qty = free + locked;
        if qty > 0.0 && !row.asset.trim().is_empty() {
            out.push((row.asset.trim().to_uppercase(), qty));
        }
    }
    Ok(out)
}

fn rate_to_bps(raw: &serde_json::Value) -> Option<f64> {
    let rate = match raw {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    Some(crate::model::round6(rate.max(0.0) * 10_000.0))
}

/// `(taker_bps, maker_bps)` from the spot tradeFee endpoint.
pub async fn fetch_spot_fee(
    client: &reqwest::Client,
    symbol: &str,
    creds: &Credentials,
) -> Result<Option<(f64, f64)>> {
    let value = signed_get(
        client,
        "/sapi/v1/asset/tradeFee",
        &[("symbol", symbol.to_string())],
        creds,
    )
    .await
    .context("fetching binance spot fee")?;

    let Some(row) = value.as_array().and_then(|rows| rows.first()) else {
        return Ok(None);
    };
    let taker = row.get("takerCommission").and_then(rate_to_bps);
    let maker = row.get("makerCommission").and_then(rate_to_bps);
    Ok(taker.zip(maker))
}

/// `(taker_bps, maker_bps)` from the futures commissionRate endpoint.
pub async fn fetch_perp_fee(
    client: &reqwest::Client,
    symbol: &str,
    creds: &Credentials,
) -> Result<Option<(f64, f64)>> {
    let value = signed_get(
        client,
        "/fapi/v1/commissionRate",
        &[("symbol", symbol.to_string())],
        creds,
    )
    .await
    .context("fetching binance perp fee")?;

    let taker = value.get("takerCommissionRate").and_then(rate_to_bps);
    let maker = value.get("makerCommissionRate").and_then(rate_to_bps);
    Ok(taker.zip(maker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_levels_skips_malformed_rows() {
        let rows = vec![
            vec!["100.5".to_string(), "2.0".to_string()],
            vec!["bad".to_string(), "2.0".to_string()],
            vec!["99.0".to_string()],
            vec!["98.0".to_string(), "0".to_string()],
        ];
        let parsed = parse_levels(&rows);
        assert_eq!(parsed, vec![(100.5, 2.0)]);
    }

    #[test]
    fn rate_to_bps_handles_strings_and_numbers() {
        assert_eq!(rate_to_bps(&serde_json::json!("0.001")), Some(10.0));
        assert_eq!(rate_to_bps(&serde_json::json!(0.00075)), Some(7.5));
        assert_eq!(rate_to_bps(&serde_json::json!(null)), None);
    }
}
