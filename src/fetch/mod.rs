//! Live snapshot sources. All venue I/O happens behind [`SnapshotSource`];
//! the builders and overlays never touch HTTP directly, which keeps them
//! testable against mock sources.

pub mod binance;
pub mod bybit;
pub mod gas;
pub mod jupiter;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::model::Instrument;
use crate::model::depth::DepthLadder;
use crate::model::funding::FundingSnapshot;
use crate::model::quote::{DexQuote, NormalizedQuote};

/// Centralized exchanges the scanner covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CexVenue {
    Binance,
    Bybit,
}

impl CexVenue {
    pub fn all() -> [CexVenue; 2] {
        [CexVenue::Binance, CexVenue::Bybit]
    }

    pub fn name(&self) -> &'static str {
        match self {
            CexVenue::Binance => "binance",
            CexVenue::Bybit => "bybit",
        }
    }
}

impl fmt::Display for CexVenue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Chains the network-friction model prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Solana,
    Polygon,
    Ethereum,
}

impl Chain {
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Polygon => "polygon",
            Chain::Ethereum => "ethereum",
        }
    }
}

/// API credentials for authenticated venue endpoints.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    /// Read `<VENUE>_API_KEY` / `<VENUE>_API_SECRET` from the environment.
    pub fn from_env(venue: CexVenue) -> Option<Self> {
        let prefix = match venue {
            CexVenue::Binance => "BINANCE",
            CexVenue::Bybit => "BYBIT",
        };
        let api_key = std::env::var(format!("{prefix}_API_KEY")).ok()?;
        let api_secret = std::env::var(format!("{prefix}_API_SECRET")).ok()?;
        let api_key = api_key.trim().to_string();
        let api_secret = api_secret.trim().to_string();
        if api_key.is_empty() || api_secret.is_empty() {
            return None;
        }
        Some(Self { api_key, api_secret })
    }
}

/// A DEX-routable token: CEX symbol for the reference mid plus the on-chain
/// mint the router quotes against.
#[derive(Debug, Clone)]
pub struct DexToken {
    pub symbol: String,
    pub base: String,
    pub mint: String,
    pub decimals: u32,
}

/// Default Jupiter-routable universe.
pub fn default_dex_tokens() -> Vec<DexToken> {
    vec![
        DexToken {
            symbol: "SOLUSDT".to_string(),
            base: "SOL".to_string(),
            mint: "So11111111111111111111111111111111111111112".to_string(),
            decimals: 9,
        },
        DexToken {
            symbol: "BTCUSDT".to_string(),
            base: "BTC".to_string(),
            mint: "9n4nbM75f5Ui33ZbPYXn59EwSgE8CGsHtAeTH5YFeJ9E".to_string(),
            decimals: 6,
        },
    ]
}

/// One gas-rate sample for a chain. Fetch failures degrade to the fallback
/// sample with `source == "fallback"` rather than erroring.
#[derive(Debug, Clone)]
pub struct GasStat {
    pub chain: Chain,
    /// `"live"` or `"fallback"`.
    pub source: String,
    pub sample: GasSample,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum GasSample {
    Solana {
        base_fee_lamports_per_tx: f64,
        priority_micro_lamports_per_cu_median: f64,
        priority_micro_lamports_per_cu_p75: f64,
    },
    Evm {
        gas_price_gwei: f64,
    },
}

/// The injected fetcher contract the core consumes. Implementations must be
/// fail-soft internally where the endpoint allows partial data; hard errors
/// are reserved for whole-fetch failures the caller will degrade on.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_spot_book(&self, venue: CexVenue) -> Result<Vec<NormalizedQuote>>;

    async fn fetch_depth(&self, venue: CexVenue, symbol: &str) -> Result<DepthLadder>;

    async fn fetch_perp(&self, venue: CexVenue) -> Result<Vec<FundingSnapshot>>;

    /// Price a token on the DEX router both ways at a USD notional.
    /// `Ok(None)` means the router returned no usable route.
    async fn fetch_dex_quote(
        &self,
        token: &DexToken,
        ref_mid: f64,
        size_usd: f64,
        slippage_bps: u32,
    ) -> Result<Option<DexQuote>>;

    /// Raw asset quantities held on the venue; USD valuation is the
    /// overlay's job.
    async fn fetch_authenticated_balances(
        &self,
        venue: CexVenue,
        creds: &Credentials,
    ) -> Result<Vec<(String, f64)>>;

    /// Account-realized `(taker_bps, maker_bps)` for one venue/instrument.
    async fn fetch_venue_fee_rate(
        &self,
        venue: CexVenue,
        instrument: Instrument,
        symbol: &str,
        creds: &Credentials,
    ) -> Result<Option<(f64, f64)>>;

    async fn fetch_network_gas(&self, chain: Chain) -> Result<GasStat>;
}

/// Maximum in-flight venue requests per source.
const MAX_CONCURRENT_FETCHES: usize = 8;

const MARKET_TIMEOUT: Duration = Duration::from_secs(12);
const DEX_TIMEOUT: Duration = Duration::from_secs(15);
const AUTH_TIMEOUT: Duration = Duration::from_secs(8);

/// Live implementation over public and signed venue endpoints.
pub struct LiveSource {
    client: reqwest::Client,
    limiter: Arc<Semaphore>,
}

impl LiveSource {
    pub fn new() -> Result<Self> {
        use anyhow::Context;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("arb-intel/0.1")
            .build()
            .context("creating HTTP client")?;
        Ok(Self {
            client,
            limiter: Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES)),
        })
    }

    async fn permit(&self) -> tokio::sync::SemaphorePermit<'_> {
        // Only fails if the semaphore is closed, which we never do.
        self.limiter.acquire().await.expect("fetch limiter closed")
    }
}

#[async_trait]
impl SnapshotSource for LiveSource {
    async fn fetch_spot_book(&self, venue: CexVenue) -> Result<Vec<NormalizedQuote>> {
        let _permit = self.permit().await;
        let detected_at = crate::model::utc_now_rfc3339();
        match venue {
            CexVenue::Binance => binance::fetch_spot_book(&self.client, &detected_at).await,
            CexVenue::Bybit => bybit::fetch_spot_book(&self.client, &detected_at).await,
        }
    }

    async fn fetch_depth(&self, venue: CexVenue, symbol: &str) -> Result<DepthLadder> {
        let _permit = self.permit().await;
        match venue {
            CexVenue::Binance => binance::fetch_orderbook(&self.client, symbol).await,
            CexVenue::Bybit => bybit::fetch_orderbook(&self.client, symbol).await,
        }
    }

    async fn fetch_perp(&self, venue: CexVenue) -> Result<Vec<FundingSnapshot>> {
        let _permit = self.permit().await;
        let detected_at = crate::model::utc_now_rfc3339();
        let now_ms = chrono::Utc::now().timestamp_millis();
        match venue {
            CexVenue::Binance => {
                binance::fetch_perp_snapshots(&self.client, &detected_at, now_ms).await
            }
            CexVenue::Bybit => bybit::fetch_perp_snapshots(&self.client, &detected_at, now_ms).await,
        }
    }

    async fn fetch_dex_quote(
        &self,
        token: &DexToken,
        ref_mid: f64,
        size_usd: f64,
        slippage_bps: u32,
    ) -> Result<Option<DexQuote>> {
        let _permit = self.permit().await;
        let detected_at = crate::model::utc_now_rfc3339();
        jupiter::fetch_two_way_quote(&self.client, &detected_at, token, ref_mid, size_usd, slippage_bps)
            .await
    }

    async fn fetch_authenticated_balances(
        &self,
        venue: CexVenue,
        creds: &Credentials,
    ) -> Result<Vec<(String, f64)>> {
        let _permit = self.permit().await;
        match venue {
            CexVenue::Binance => binance::fetch_account_balances(&self.client, creds).await,
            CexVenue::Bybit => bybit::fetch_wallet_balances(&self.client, creds).await,
        }
    }

    async fn fetch_venue_fee_rate(
        &self,
        venue: CexVenue,
        instrument: Instrument,
        symbol: &str,
        creds: &Credentials,
    ) -> Result<Option<(f64, f64)>> {
        let _permit = self.permit().await;
        match venue {
            CexVenue::Binance => match instrument {
                Instrument::Perp => binance::fetch_perp_fee(&self.client, symbol, creds).await,
                _ => binance::fetch_spot_fee(&self.client, symbol, creds).await,
            },
            CexVenue::Bybit => {
                let category = match instrument {
                    Instrument::Perp => "linear",
                    _ => "spot",
                };
                bybit::fetch_fee_rate(&self.client, category, symbol, creds).await
            }
        }
    }

    async fn fetch_network_gas(&self, chain: Chain) -> Result<GasStat> {
        let _permit = self.permit().await;
        Ok(match chain {
            Chain::Solana => gas::fetch_solana(&self.client).await,
            Chain::Polygon => gas::fetch_polygon(&self.client).await,
            Chain::Ethereum => gas::fetch_ethereum(&self.client).await,
        })
    }
}

/// Retry an async operation with exponential backoff.
pub async fn retry<T, F, Fut>(max_retries: u32, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..=max_retries {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_err = Some(e);
                if attempt < max_retries {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err.expect("retry loop ran at least once"))
}

pub(crate) fn market_timeout() -> Duration {
    MARKET_TIMEOUT
}

pub(crate) fn dex_timeout() -> Duration {
    DEX_TIMEOUT
}

pub(crate) fn auth_timeout() -> Duration {
    AUTH_TIMEOUT
}
