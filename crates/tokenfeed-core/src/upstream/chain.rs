use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bigdecimal::BigDecimal;
use tracing::{debug, instrument};

use crate::catalog::{self, ChainId};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::config::{CacheTtls, Settings};
use crate::error::UpstreamError;
use crate::http_client::{check_status, HttpClient, HttpRequest};
use crate::read_through::ReadThrough;
use crate::retry::RetryPolicy;
use crate::{ChainPriceFeedReading, SourceId, TokenAddress, TokenSupplyReading, UtcDateTime};

use super::rpc::{self, Selector, DECIMALS, LATEST_ROUND_DATA, TOTAL_SUPPLY};
use super::{UpstreamGuard, UpstreamHealth};

#[derive(Debug, Clone, PartialEq)]
pub struct ChainUpstreamConfig {
    pub rpc_url: String,
    pub ttls: CacheTtls,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
}

impl ChainUpstreamConfig {
    pub fn from_settings(settings: &Settings, chain: ChainId) -> Self {
        Self {
            rpc_url: settings.rpc_url(chain).to_owned(),
            ttls: settings.cache,
            breaker: settings.breaker,
            retry: settings.retry.clone(),
        }
    }
}

/// Read-only contract calls against one chain's RPC endpoint.
///
/// Every instance has its own breaker and caches, so a dead endpoint on one
/// chain only fails calls addressed to that chain.
#[derive(Clone)]
pub struct ChainUpstream {
    inner: Arc<ChainInner>,
}

struct ChainInner {
    chain: ChainId,
    upstream: String,
    http: Arc<dyn HttpClient>,
    rpc_url: String,
    guard: UpstreamGuard,
    feeds: ReadThrough<ChainPriceFeedReading>,
    supplies: ReadThrough<TokenSupplyReading>,
    next_request_id: AtomicU64,
}

impl std::fmt::Debug for ChainUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainUpstream")
            .field("chain", &self.inner.chain)
            .field("guard", &self.inner.guard)
            .finish_non_exhaustive()
    }
}

impl ChainUpstream {
    pub fn new(chain: ChainId, http: Arc<dyn HttpClient>, config: ChainUpstreamConfig) -> Self {
        let upstream = format!("{chain}-rpc");
        let capacity = config.ttls.capacity;

        Self {
            inner: Arc::new(ChainInner {
                chain,
                guard: UpstreamGuard::new(upstream.clone(), config.breaker, config.retry),
                upstream,
                http,
                rpc_url: config.rpc_url,
                feeds: ReadThrough::new(capacity, config.ttls.price),
                supplies: ReadThrough::new(capacity, config.ttls.token),
                next_request_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn chain(&self) -> ChainId {
        self.inner.chain
    }

    pub fn health(&self) -> UpstreamHealth {
        self.inner.guard.health()
    }

    /// Latest answer of the price feed for `pair` (`BASE/QUOTE`, any case).
    #[instrument(skip(self), fields(chain = %self.inner.chain), level = "debug")]
    pub async fn fetch_feed_reading(&self, pair: &str) -> Result<ChainPriceFeedReading, UpstreamError> {
        let chain = self.inner.chain;
        let pair = pair.trim().to_ascii_uppercase();
        let feed = catalog::feed_address(chain, &pair).ok_or_else(|| UpstreamError::UnsupportedPair {
            chain: chain.to_string(),
            pair: pair.clone(),
        })?;
        let key = format!("feed:{pair}");
        let this = self.clone();

        self.inner
            .feeds
            .get_or_fetch(&key, move || async move {
                let round = this.call(feed, LATEST_ROUND_DATA).await?;
                let round = rpc::round_data(&this.inner.upstream, &round)?;
                let decimals = this.call(feed, DECIMALS).await?;
                let decimals = rpc::decimals(&this.inner.upstream, &decimals)?;

                Ok(ChainPriceFeedReading {
                    pair,
                    price: BigDecimal::new(round.answer, i64::from(decimals)),
                    decimals,
                    feed_address: feed.to_owned(),
                    chain,
                    observed_at: this.timestamp(round.updated_at)?,
                    round_id: Some(round.round_id),
                    started_at: Some(this.timestamp(round.started_at)?),
                    source: SourceId::Chainlink,
                })
            })
            .await
    }

    /// ERC-20 total supply normalized by the token's decimals.
    #[instrument(skip(self), fields(chain = %self.inner.chain), level = "debug")]
    pub async fn fetch_supply(&self, token_address: &str) -> Result<TokenSupplyReading, UpstreamError> {
        let chain = self.inner.chain;
        let token_address = TokenAddress::parse(token_address)?;
        let key = format!("supply:{}", token_address.canonical());
        let this = self.clone();

        self.inner
            .supplies
            .get_or_fetch(&key, move || async move {
                let to = token_address.as_str();
                let supply = this.call(to, TOTAL_SUPPLY).await?;
                let supply = rpc::words(&this.inner.upstream, &supply, 1)?[0];
                let supply = rpc::uint(supply);
                let decimals = this.call(to, DECIMALS).await?;
                let decimals = rpc::decimals(&this.inner.upstream, &decimals)?;

                Ok(TokenSupplyReading {
                    total_supply: BigDecimal::new(supply, i64::from(decimals)),
                    token_address,
                    chain,
                    decimals,
                    observed_at: UtcDateTime::now(),
                    circulating_supply: None,
                    max_supply: None,
                    source: SourceId::Erc20,
                })
            })
            .await
    }

    async fn call(&self, to: &str, selector: Selector) -> Result<Vec<u8>, UpstreamError> {
        let inner = &self.inner;
        let timeout = inner.guard.retry_policy().attempt_timeout;
        let resource = format!("{} contract {to}", inner.chain);

        inner
            .guard
            .call(|| {
                let request_id = inner.next_request_id.fetch_add(1, Ordering::Relaxed);
                let body = rpc::eth_call_body(request_id, to, selector);
                let request = HttpRequest::post_json(inner.rpc_url.as_str(), &body).with_timeout(timeout);
                let resource = resource.as_str();
                async move {
                    let response = inner.http.execute(request).await?;
                    let response = check_status(&inner.upstream, resource, response)?;
                    rpc::decode_call_result(&inner.upstream, &response.body).map_err(|error| {
                        debug!(call = selector.name, %error, "eth_call failed");
                        error
                    })
                }
            })
            .await
    }

    fn timestamp(&self, seconds: u128) -> Result<UtcDateTime, UpstreamError> {
        i64::try_from(seconds)
            .ok()
            .and_then(|seconds| UtcDateTime::from_unix_seconds(seconds).ok())
            .ok_or_else(|| {
                UpstreamError::malformed(&self.inner.upstream, format!("bad round timestamp {seconds}"))
            })
    }
}
