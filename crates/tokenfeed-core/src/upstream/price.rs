use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::config::{CacheTtls, Settings, ThrottleSettings, DEFAULT_COINGECKO_BASE_URL};
use crate::error::{UpstreamError, ValidationError};
use crate::http_client::{check_status, decode_json, HttpAuth, HttpClient, HttpRequest};
use crate::read_through::ReadThrough;
use crate::retry::RetryPolicy;
use crate::throttling::RequestThrottle;
use crate::{
    HistoryPoint, MarketSnapshot, PriceQuote, SearchResult, SourceId, TokenDetail, TokenId,
    TrendingEntry, UtcDateTime,
};

use super::coingecko::{
    self, CoinDetailPayload, CoinInfo, GlobalPayload, MarketChartPayload, SearchPayload,
    SimplePricePayload, TrendingPayload, UPSTREAM,
};
use super::{QuoteSource, UpstreamGuard, UpstreamHealth};

const API_KEY_HEADER: &str = "x-cg-pro-api-key";

#[derive(Clone, PartialEq)]
pub struct PriceUpstreamConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub ttls: CacheTtls,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
    /// `None` disables the local request budget.
    pub throttle: Option<ThrottleSettings>,
}

impl Default for PriceUpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_COINGECKO_BASE_URL),
            api_key: None,
            ttls: CacheTtls::default(),
            breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
            throttle: Some(ThrottleSettings::default()),
        }
    }
}

impl std::fmt::Debug for PriceUpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceUpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("ttls", &self.ttls)
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .field("throttle", &self.throttle)
            .finish()
    }
}

impl From<&Settings> for PriceUpstreamConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            base_url: settings.coingecko_base_url.clone(),
            api_key: settings.coingecko_api_key.clone(),
            ttls: settings.cache,
            breaker: settings.breaker,
            retry: settings.retry.clone(),
            throttle: Some(settings.throttle),
        }
    }
}

/// Client for the CoinGecko market-data API.
///
/// Cheap to clone; clones share caches, breaker and request budget.
#[derive(Clone)]
pub struct PriceUpstream {
    inner: Arc<PriceInner>,
}

struct PriceInner {
    http: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    guard: UpstreamGuard,
    quotes: ReadThrough<PriceQuote>,
    coin_info: ReadThrough<CoinInfo>,
    coin_list: ReadThrough<Arc<HashMap<String, CoinInfo>>>,
    details: ReadThrough<TokenDetail>,
    history: ReadThrough<Vec<HistoryPoint>>,
    market: ReadThrough<MarketSnapshot>,
}

impl std::fmt::Debug for PriceUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceUpstream")
            .field("base_url", &self.inner.base_url)
            .field("guard", &self.inner.guard)
            .finish_non_exhaustive()
    }
}

impl PriceUpstream {
    pub fn new(http: Arc<dyn HttpClient>, config: PriceUpstreamConfig) -> Self {
        let ttls = config.ttls;
        let capacity = ttls.capacity;
        let mut guard = UpstreamGuard::new(UPSTREAM, config.breaker, config.retry);
        if let Some(throttle) = config.throttle {
            guard = guard.with_throttle(RequestThrottle::per_minute(
                throttle.per_minute,
                throttle.burst,
            ));
        }
        let auth = match config.api_key {
            Some(key) => HttpAuth::header(API_KEY_HEADER, key),
            None => HttpAuth::None,
        };

        Self {
            inner: Arc::new(PriceInner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                auth,
                guard,
                quotes: ReadThrough::new(capacity, ttls.price),
                coin_info: ReadThrough::new(capacity, ttls.token),
                coin_list: ReadThrough::new(capacity, ttls.token),
                details: ReadThrough::new(capacity, ttls.price),
                history: ReadThrough::new(capacity, ttls.history),
                market: ReadThrough::new(capacity, ttls.market),
            }),
        }
    }

    pub fn health(&self) -> UpstreamHealth {
        self.inner.guard.health()
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_quote(&self, id: &str, vs_currency: &str) -> Result<PriceQuote, UpstreamError> {
        let id = TokenId::parse(id)?;
        let vs_currency = normalize_currency(vs_currency)?;
        let key = format!("quote:{id}:{vs_currency}");
        let this = self.clone();

        self.inner
            .quotes
            .get_or_fetch(&key, move || async move { this.load_quote(id, vs_currency).await })
            .await
    }

    /// Batch quote. Ids the upstream does not know are left out of the result.
    #[instrument(skip(self, ids), level = "debug")]
    pub async fn fetch_quotes<S: AsRef<str>>(
        &self,
        ids: &[S],
        vs_currency: &str,
    ) -> Result<Vec<PriceQuote>, UpstreamError> {
        let mut parsed: Vec<TokenId> = Vec::with_capacity(ids.len());
        for raw in ids {
            let id = TokenId::parse(raw.as_ref())?;
            if !parsed.contains(&id) {
                parsed.push(id);
            }
        }
        if parsed.is_empty() {
            return Err(ValidationError::EmptyTokenList.into());
        }
        let vs_currency = normalize_currency(vs_currency)?;

        let joined = parsed.iter().map(TokenId::as_str).collect::<Vec<_>>().join(",");
        let payload: SimplePricePayload = self
            .get_json("/simple/price", &simple_price_query(&joined, &vs_currency), "coins")
            .await?;
        let catalog = self.coin_list().await?;
        let observed_at = UtcDateTime::now();

        let quotes = parsed
            .iter()
            .filter_map(|id| payload.get(id.as_str()).map(|entry| (id, entry)))
            .map(|(id, entry)| {
                let info = catalog.get(id.as_str()).cloned().unwrap_or_default();
                coingecko::quote_from_simple_price(id, &vs_currency, entry, &info, observed_at)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(requested = parsed.len(), returned = quotes.len(), "batch quote");
        Ok(quotes)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_detail(&self, id: &str) -> Result<TokenDetail, UpstreamError> {
        let id = TokenId::parse(id)?;
        let key = format!("detail:{id}");
        let this = self.clone();

        self.inner
            .details
            .get_or_fetch(&key, move || async move {
                let payload: CoinDetailPayload = this
                    .get_json(
                        &format!("/coins/{id}"),
                        &[
                            ("localization", "false"),
                            ("tickers", "false"),
                            ("community_data", "false"),
                            ("developer_data", "false"),
                        ],
                        &format!("coin '{id}'"),
                    )
                    .await?;
                coingecko::detail_from_payload(&id, payload, UtcDateTime::now())
            })
            .await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_history(&self, id: &str, days: u32) -> Result<Vec<HistoryPoint>, UpstreamError> {
        let id = TokenId::parse(id)?;
        if days == 0 {
            return Err(ValidationError::ZeroHistoryDays.into());
        }
        let key = format!("history:{id}:{days}");
        let this = self.clone();

        self.inner
            .history
            .get_or_fetch(&key, move || async move {
                let days = days.to_string();
                let payload: MarketChartPayload = this
                    .get_json(
                        &format!("/coins/{id}/market_chart"),
                        &[("vs_currency", "usd"), ("days", days.as_str())],
                        &format!("coin '{id}'"),
                    )
                    .await?;
                coingecko::history_from_chart(payload)
            })
            .await
    }

    /// Free-text coin search; at most [`super::SEARCH_RESULT_LIMIT`] results, never cached.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, UpstreamError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }

        let payload: SearchPayload = self.get_json("/search", &[("query", query)], "search").await?;
        Ok(coingecko::search_results(payload))
    }

    /// Trending coins, each priced in USD through [`Self::fetch_quote`].
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_trending(&self, limit: usize) -> Result<Vec<TrendingEntry>, UpstreamError> {
        if limit == 0 {
            return Err(ValidationError::ZeroLimit.into());
        }

        let payload: TrendingPayload = self.get_json("/search/trending", &[], "trending").await?;
        let items = coingecko::trending_items(payload, limit);
        let mut entries = Vec::with_capacity(items.len());

        for (position, item) in items.into_iter().enumerate() {
            let id = TokenId::parse(&item.id)
                .map_err(|e| UpstreamError::malformed(UPSTREAM, format!("trending entry: {e}")))?;
            let quote = self.fetch_quote(id.as_str(), "usd").await?;
            let search_score = coingecko::search_score(&item)?;

            entries.push(TrendingEntry {
                id,
                symbol: item.symbol.to_uppercase(),
                name: item.name,
                rank: u32::try_from(position + 1).unwrap_or(u32::MAX),
                price: quote.price,
                change_24h: quote.change_24h,
                volume_24h: quote.volume_24h,
                search_score,
            });
        }

        Ok(entries)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_market_snapshot(&self) -> Result<MarketSnapshot, UpstreamError> {
        let this = self.clone();

        self.inner
            .market
            .get_or_fetch("market:global", move || async move {
                let payload: GlobalPayload = this.get_json("/global", &[], "global market").await?;
                coingecko::snapshot_from_global(payload, UtcDateTime::now())
            })
            .await
    }

    async fn load_quote(&self, id: TokenId, vs_currency: String) -> Result<PriceQuote, UpstreamError> {
        let payload: SimplePricePayload = self
            .get_json(
                "/simple/price",
                &simple_price_query(id.as_str(), &vs_currency),
                &format!("coin '{id}'"),
            )
            .await?;
        let entry = payload
            .get(id.as_str())
            .ok_or_else(|| UpstreamError::not_found(format!("coin '{id}'")))?;
        let info = self.coin_info(&id).await?;

        coingecko::quote_from_simple_price(&id, &vs_currency, entry, &info, UtcDateTime::now())
    }

    async fn coin_info(&self, id: &TokenId) -> Result<CoinInfo, UpstreamError> {
        let key = format!("info:{id}");
        let this = self.clone();
        let id = id.clone();

        self.inner
            .coin_info
            .get_or_fetch(&key, move || async move {
                this.get_json(
                    &format!("/coins/{id}"),
                    &[
                        ("localization", "false"),
                        ("tickers", "false"),
                        ("market_data", "false"),
                    ],
                    &format!("coin '{id}'"),
                )
                .await
            })
            .await
    }

    async fn coin_list(&self) -> Result<Arc<HashMap<String, CoinInfo>>, UpstreamError> {
        let this = self.clone();

        self.inner
            .coin_list
            .get_or_fetch("coins:list", move || async move {
                let coins: Vec<CoinInfo> = this.get_json("/coins/list", &[], "coin list").await?;
                Ok(Arc::new(
                    coins.into_iter().map(|coin| (coin.id.clone(), coin)).collect(),
                ))
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        resource: &str,
    ) -> Result<T, UpstreamError> {
        let inner = &self.inner;
        let url = endpoint(&inner.base_url, path, query);
        let timeout = inner.guard.retry_policy().attempt_timeout;

        inner
            .guard
            .call(|| {
                let request = HttpRequest::get(url.as_str())
                    .with_auth(&inner.auth)
                    .with_timeout(timeout);
                async move {
                    let response = inner.http.execute(request).await?;
                    let response = check_status(UPSTREAM, resource, response)?;
                    decode_json(UPSTREAM, &response.body)
                }
            })
            .await
    }
}

impl QuoteSource for PriceUpstream {
    fn id(&self) -> SourceId {
        SourceId::Coingecko
    }

    fn quote<'a>(
        &'a self,
        id: &'a str,
        vs_currency: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PriceQuote, UpstreamError>> + Send + 'a>> {
        Box::pin(self.fetch_quote(id, vs_currency))
    }
}

fn simple_price_query<'a>(ids: &'a str, vs_currency: &'a str) -> [(&'static str, &'a str); 5] {
    [
        ("ids", ids),
        ("vs_currencies", vs_currency),
        ("include_24hr_change", "true"),
        ("include_market_cap", "true"),
        ("include_24hr_vol", "true"),
    ]
}

fn endpoint(base_url: &str, path: &str, query: &[(&str, &str)]) -> String {
    let mut url = format!("{base_url}{path}");
    for (index, (name, value)) in query.iter().enumerate() {
        url.push(if index == 0 { '?' } else { '&' });
        url.push_str(name);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

/// Lowercase currency code such as `usd` or `eur`.
fn normalize_currency(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim().to_ascii_lowercase();
    if code.is_empty() || !code.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidCurrency {
            value: raw.to_owned(),
        });
    }
    Ok(code)
}
