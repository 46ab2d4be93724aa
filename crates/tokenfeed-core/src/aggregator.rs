//! Unified, failure-isolated entry point over every upstream.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::catalog::{self, ChainId, CHAINS, DEXES};
use crate::config::Settings;
use crate::error::UpstreamError;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::upstream::{
    ChainUpstream, ChainUpstreamConfig, PriceUpstream, PriceUpstreamConfig, QuoteSource,
    UpstreamHealth,
};
use crate::{
    ChainInfo, ChainPriceFeedReading, DexInfo, HistoryPoint, MarketSnapshot, PriceQuote,
    SearchResult, TokenDetail, TokenId, TokenSupplyReading, TrendingEntry,
};

/// History window fetched alongside the detail in [`AggregatorService::comprehensive_detail`].
pub const COMPREHENSIVE_HISTORY_DAYS: u32 = 7;

const BEST_QUOTE_CURRENCY: &str = "usd";

/// One piece of a partial aggregation that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    pub component: &'static str,
    pub error: UpstreamError,
}

impl Serialize for PartialFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PartialFailure", 3)?;
        state.serialize_field("component", self.component)?;
        state.serialize_field("code", self.error.code())?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}

/// Detail plus recent history; either may be missing, with the reason in `failures`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComprehensiveDetail {
    pub id: TokenId,
    pub detail: Option<TokenDetail>,
    pub history: Option<Vec<HistoryPoint>>,
    pub failures: Vec<PartialFailure>,
}

impl ComprehensiveDetail {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns one price upstream and one chain upstream per supported chain.
///
/// Construct once per process and share by reference; every operation is
/// `&self` and safe to call concurrently.
pub struct AggregatorService {
    price: PriceUpstream,
    chains: BTreeMap<ChainId, ChainUpstream>,
    quote_sources: Vec<Arc<dyn QuoteSource>>,
    rpc_urls: BTreeMap<ChainId, String>,
}

impl std::fmt::Debug for AggregatorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorService")
            .field("price", &self.price)
            .field("chains", &self.chains.keys().collect::<Vec<_>>())
            .field(
                "quote_sources",
                &self.quote_sources.iter().map(|source| source.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AggregatorService {
    /// Production graph: one reqwest client shared by every upstream.
    pub fn from_settings(settings: &Settings) -> Result<Self, UpstreamError> {
        Self::builder()
            .settings(settings.clone())
            .http_client(Arc::new(ReqwestHttpClient::new()?))
            .build()
    }

    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    pub fn price_upstream(&self) -> &PriceUpstream {
        &self.price
    }

    pub fn chain_upstream(&self, chain: &str) -> Result<&ChainUpstream, UpstreamError> {
        let chain: ChainId = chain.parse()?;
        self.chains
            .get(&chain)
            .ok_or_else(|| UpstreamError::UnsupportedChain {
                chain: chain.to_string(),
            })
    }

    /// First successful quote across the configured sources, in order.
    pub async fn best_quote(&self, id: &str) -> Result<PriceQuote, UpstreamError> {
        let mut last_error = None;

        for source in &self.quote_sources {
            match source.quote(id, BEST_QUOTE_CURRENCY).await {
                Ok(quote) => return Ok(quote),
                Err(error) => {
                    debug!(source = %source.id(), %error, "quote source failed");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            UpstreamError::invalid_request("no quote sources are configured")
        }))
    }

    /// Detail and 7-day history fetched concurrently; one failing never fails the other.
    pub async fn comprehensive_detail(&self, id: &str) -> Result<ComprehensiveDetail, UpstreamError> {
        let id = TokenId::parse(id)?;
        let (detail, history) = tokio::join!(
            self.price.fetch_detail(id.as_str()),
            self.price
                .fetch_history(id.as_str(), COMPREHENSIVE_HISTORY_DAYS),
        );

        let mut failures = Vec::new();
        let detail = keep_partial("detail", detail, &mut failures);
        let history = keep_partial("history", history, &mut failures);
        for failure in &failures {
            warn!(
                id = %id,
                component = failure.component,
                code = failure.error.code(),
                error = %failure.error,
                "partial aggregation"
            );
        }

        Ok(ComprehensiveDetail {
            id,
            detail,
            history,
            failures,
        })
    }

    pub fn list_supported_chains(&self) -> Vec<ChainInfo> {
        CHAINS
            .iter()
            .map(|spec| ChainInfo {
                chain_id: spec.id,
                network_id: spec.network_id,
                name: spec.name.to_owned(),
                symbol: spec.native_symbol.to_owned(),
                rpc_url: self
                    .rpc_urls
                    .get(&spec.id)
                    .cloned()
                    .unwrap_or_else(|| spec.default_rpc_url.to_owned()),
                explorer_url: spec.explorer_url.to_owned(),
                is_testnet: spec.is_testnet,
                supported_dexes: spec.supported_dexes.iter().map(|dex| (*dex).to_owned()).collect(),
                wrapped_native: spec.wrapped_native.to_owned(),
                price_feeds: catalog::price_feeds(spec.id)
                    .iter()
                    .map(|(pair, _)| (*pair).to_owned())
                    .collect(),
            })
            .collect()
    }

    pub fn list_supported_dexes(&self) -> Vec<DexInfo> {
        DEXES.iter().map(DexInfo::from).collect()
    }

    pub async fn quote(&self, id: &str, vs_currency: &str) -> Result<PriceQuote, UpstreamError> {
        self.price.fetch_quote(id, vs_currency).await
    }

    pub async fn quotes<S: AsRef<str>>(
        &self,
        ids: &[S],
        vs_currency: &str,
    ) -> Result<Vec<PriceQuote>, UpstreamError> {
        self.price.fetch_quotes(ids, vs_currency).await
    }

    pub async fn detail(&self, id: &str) -> Result<TokenDetail, UpstreamError> {
        self.price.fetch_detail(id).await
    }

    pub async fn history(&self, id: &str, days: u32) -> Result<Vec<HistoryPoint>, UpstreamError> {
        self.price.fetch_history(id, days).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, UpstreamError> {
        self.price.search(query).await
    }

    pub async fn trending(&self, limit: usize) -> Result<Vec<TrendingEntry>, UpstreamError> {
        self.price.fetch_trending(limit).await
    }

    pub async fn market_snapshot(&self) -> Result<MarketSnapshot, UpstreamError> {
        self.price.fetch_market_snapshot().await
    }

    pub async fn feed_reading(
        &self,
        pair: &str,
        chain: &str,
    ) -> Result<ChainPriceFeedReading, UpstreamError> {
        self.chain_upstream(chain)?.fetch_feed_reading(pair).await
    }

    pub async fn supply(
        &self,
        token_address: &str,
        chain: &str,
    ) -> Result<TokenSupplyReading, UpstreamError> {
        self.chain_upstream(chain)?.fetch_supply(token_address).await
    }

    /// Breaker state of every upstream. Never touches the network.
    pub fn health_report(&self) -> Vec<UpstreamHealth> {
        std::iter::once(self.price.health())
            .chain(self.chains.values().map(ChainUpstream::health))
            .collect()
    }
}

fn keep_partial<T>(
    component: &'static str,
    outcome: Result<T, UpstreamError>,
    failures: &mut Vec<PartialFailure>,
) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(error) => {
            failures.push(PartialFailure { component, error });
            None
        }
    }
}

/// Assembles an [`AggregatorService`]; tests inject a scripted [`HttpClient`] here.
#[derive(Default)]
pub struct AggregatorBuilder {
    settings: Settings,
    http: Option<Arc<dyn HttpClient>>,
    fallback_sources: Vec<Arc<dyn QuoteSource>>,
    unthrottled: bool,
}

impl AggregatorBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Extra quote source consulted by `best_quote` after the price upstream.
    pub fn fallback_quote_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.fallback_sources.push(source);
        self
    }

    /// Skip the local request budget on the price upstream.
    pub fn without_throttle(mut self) -> Self {
        self.unthrottled = true;
        self
    }

    /// Fails only when no client was injected and the reqwest client
    /// cannot be built.
    pub fn build(self) -> Result<AggregatorService, UpstreamError> {
        let settings = self.settings;
        let http = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new()?) as Arc<dyn HttpClient>,
        };

        let mut price_config = PriceUpstreamConfig::from(&settings);
        if self.unthrottled {
            price_config.throttle = None;
        }
        let price = PriceUpstream::new(Arc::clone(&http), price_config);

        let chains = ChainId::ALL
            .into_iter()
            .map(|chain| {
                let config = ChainUpstreamConfig::from_settings(&settings, chain);
                (chain, ChainUpstream::new(chain, Arc::clone(&http), config))
            })
            .collect();

        let primary: Arc<dyn QuoteSource> = Arc::new(price.clone());
        let mut quote_sources = vec![primary];
        quote_sources.extend(self.fallback_sources);

        Ok(AggregatorService {
            price,
            chains,
            quote_sources,
            rpc_urls: settings.rpc_urls,
        })
    }
}
