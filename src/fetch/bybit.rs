//! Bybit v5 adapters, public and signed.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::model::depth::DepthLadder;
use crate::model::funding::{FundingSnapshot, PerpTicker};
use crate::model::quote::{Market, NormalizedQuote, safe_positive};

use super::{Credentials, binance::parse_levels, retry};

const HOST: &str = "https://api.bybit.com";

// ── Public market data ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct V5Response<T> {
    #[serde(rename = "retCode", default)]
    ret_code: i64,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    #[serde(default)]
    list: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct TickerRow {
    symbol: String,
    #[serde(rename = "bid1Price")]
    bid1_price: Option<String>,
    #[serde(rename = "ask1Price")]
    ask1_price: Option<String>,
    #[serde(rename = "markPrice")]
    mark_price: Option<String>,
    #[serde(rename = "indexPrice")]
    index_price: Option<String>,
    #[serde(rename = "fundingRate")]
    funding_rate: Option<String>,
    #[serde(rename = "nextFundingTime")]
    next_funding_time: Option<String>,
}

async fn fetch_tickers(client: &reqwest::Client, category: &str) -> Result<Vec<TickerRow>> {
    let url = format!("{HOST}/v5/market/tickers?category={category}");
    let payload: V5Response<ListResult<TickerRow>> = retry(1, || {
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
    .with_context(|| format!("fetching bybit {category} tickers"))?;

    if payload.ret_code != 0 {
        anyhow::bail!("bybit tickers retCode {}", payload.ret_code);
    }
    Ok(payload.result.map(|r| r.list).unwrap_or_default())
}

pub async fn fetch_spot_book(
    client: &reqwest::Client,
    detected_at: &str,
) -> Result<Vec<NormalizedQuote>> {
    let rows = fetch_tickers(client, "spot").await?;

    let mut out = Vec::new();
    for row in rows {
        let bid = row.bid1_price.as_deref().and_then(safe_positive);
        let ask = row.ask1_price.as_deref().and_then(safe_positive);
        let (Some(bid), Some(ask)) = (bid, ask) else {
            continue;
        };
        if let Some(quote) =
            NormalizedQuote::from_book(detected_at, "bybit", Market::Spot, &row.symbol, bid, ask)
        {
            out.push(quote);
        }
    }
    debug!(rows = out.len(), "normalized bybit spot book");
    Ok(out)
}

/// Linear-perp funding snapshots; the tickers endpoint carries top-of-book,
/// mark, index, and funding in one payload.
pub async fn fetch_perp_snapshots(
    client: &reqwest::Client,
    detected_at: &str,
    now_ms: i64,
) -> Result<Vec<FundingSnapshot>> {
    let rows = fetch_tickers(client, "linear").await?;

    let mut out = Vec::new();
    for row in rows {
        let Some(mark) = row.mark_price.as_deref().and_then(safe_positive) else {
            continue;
        };
        let Some(funding_rate) = row
            .funding_rate
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
        else {
            continue;
        };
        let Some(next_funding_ms) = row
            .next_funding_time
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
        else {
            continue;
        };

        let bid = row.bid1_price.as_deref().and_then(safe_positive);
        let ask = row.ask1_price.as_deref().and_then(safe_positive);
        // Drop rows with a crossed visible book, keep book-less rows.
        if let (Some(b), Some(a)) = (bid, ask) {
            if a <= b {
                continue;
            }
        }

        let ticker = PerpTicker {
            funding_rate,
            mark_price: mark,
            index_price: row.index_price.as_deref().and_then(safe_positive),
            bid_price: bid,
            ask_price: ask,
            next_funding_ms,
        };
        if let Some(snap) =
            FundingSnapshot::from_ticker(detected_at, now_ms, "bybit", &row.symbol, &ticker)
        {
            out.push(snap);
        }
    }
    debug!(rows = out.len(), "normalized bybit perp snapshots");
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct OrderbookResult {
    #[serde(rename = "b", default)]
    bids: Vec<Vec<String>>,
    #[serde(rename = "a", default)]
    asks: Vec<Vec<String>>,
}

pub async fn fetch_orderbook(client: &reqwest::Client, symbol: &str) -> Result<DepthLadder> {
    let url = format!("{HOST}/v5/market/orderbook?category=spot&symbol={symbol}&limit=200");
    let payload: V5Response<OrderbookResult> = retry(1, || {
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
    .with_context(|| format!("fetching bybit orderbook for {symbol}"))?;

    if payload.ret_code != 0 {
        anyhow::bail!("bybit orderbook retCode {}", payload.ret_code);
    }
    let result = payload.result.unwrap_or(OrderbookResult {
        bids: Vec::new(),
        asks: Vec::new(),
    });
    Ok(DepthLadder::new(
        parse_levels(&result.bids),
        parse_levels(&result.asks),
    ))
}

// ── Signed endpoints ────────────────────────────────────────────────

/// Signed GET against Bybit v5: HMAC-SHA256 over
/// `timestamp + api_key + recv_window + query`, carried in headers.
async fn signed_get(
    client: &reqwest::Client,
    path: &str,
    params: &[(&str, String)],
    creds: &Credentials,
) -> Result<serde_json::Value> {
    let timestamp = chrono::Utc::now().timestamp_millis().to_string();
    let recv_window = "5000";
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let pre_sign = format!("{timestamp}{}{recv_window}{query}", creds.api_key);
    let mut mac = Hmac::<Sha256>::new_from_slice(creds.api_secret.as_bytes())
        .context("invalid bybit secret")?;
    mac.update(pre_sign.as_bytes());
    let sign = hex::encode(mac.finalize().into_bytes());

    let url = if query.is_empty() {
        format!("{HOST}{path}")
    } else {
        format!("{HOST}{path}?{query}")
    };

    let value = client
        .get(&url)
        .timeout(super::auth_timeout())
        .header("X-BAPI-API-KEY", &creds.api_key)
        .header("X-BAPI-TIMESTAMP", &timestamp)
        .header("X-BAPI-RECV-WINDOW", recv_window)
        .header("X-BAPI-SIGN", &sign)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(value)
}

/// Unified-account wallet balances as raw asset quantities.
pub async fn fetch_wallet_balances(
    client: &reqwest::Client,
    creds: &Credentials,
) -> Result<Vec<(String, f64)>> {
    let value = signed_get(
        client,
        "/v5/account/wallet-balance",
        &[("accountType", "UNIFIED".to_string())],
        creds,
    )
    .await
    .context("fetching bybit wallet balance")?;

    if value.get("retCode").and_then(|v| v.as_i64()).unwrap_or(-1) != 0 {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let blocks = value
        .pointer("/result/list")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    for block in blocks {
        let coins = block
            .get("coin")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for coin in coins {
            let asset = coin
                .get("coin")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_uppercase();
            let qty = coin
                .get("walletBalance")
                .and_then(|v| v.as_str())
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
            if !asset.is_empty() && qty > 0.0 {
                out.push((asset, qty));
            }
        }
    }
    Ok(out)
}

/// Account `(taker_bps, maker_bps)` for one category/symbol.
pub async fn fetch_fee_rate(
    client: &reqwest::Client,
    category: &str,
    symbol: &str,
    creds: &Credentials,
) -> Result<Option<(f64, f64)>> {
    let value = signed_get(
        client,
        "/v5/account/fee-rate",
        &[
            ("category", category.to_string()),
            ("symbol", symbol.to_string()),
        ],
        creds,
    )
    .await
    .context("fetching bybit fee rate")?;

    if value.get("retCode").and_then(|v| v.as_i64()).unwrap_or(-1) != 0 {
        return Ok(None);
    }
    let Some(row) = value
        .pointer("/result/list")
        .and_then(|v| v.as_array())
        .and_then(|rows| rows.first())
    else {
        return Ok(None);
    };

    let to_bps = |key: &str| -> Option<f64> {
        let rate = row.get(key)?.as_str()?.trim().parse::<f64>().ok()?;
        Some(crate::model::round6(rate.max(0.0) * 10_000.0))
    };
    Ok(to_bps("takerFeeRate").zip(to_bps("makerFeeRate")))
}
