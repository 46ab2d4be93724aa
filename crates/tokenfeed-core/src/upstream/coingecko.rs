//! Wire shapes of the CoinGecko v3 API and their mapping into domain records.
//!
//! Numbers are decoded as [`serde_json::Number`] and converted to
//! [`BigDecimal`] through their textual form exactly once, here.
//!
//! Field defaults when the upstream omits a value (or sends `null`):
//!
//! | Record | Field | Missing value becomes |
//! |--------|-------|-----------------------|
//! | `PriceQuote` | `price` | error: malformed response |
//! | `PriceQuote` | `change_24h`, `market_cap`, `volume_24h` | `Some(0)` |
//! | `PriceQuote` | `symbol`, `name` | empty string |
//! | `TokenDetail` | `current_price` | `0` |
//! | `TokenDetail` | every other numeric field | `Some(0)` |
//! | `TokenDetail` | `max_supply`, `market_cap_rank`, `image_url`, `ath_date`, `atl_date` | `None` |
//! | `HistoryPoint` | `price` | sample dropped |
//! | `HistoryPoint` | `market_cap`, `volume` | `None` |
//! | `SearchResult` | `relevance_score` | `1` |
//! | `TrendingEntry` | `search_score` | `0` |
//! | `MarketSnapshot` | every numeric field | `0` |

use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::Number;
use tracing::debug;

use crate::error::UpstreamError;
use crate::{
    HistoryPoint, MarketSnapshot, PriceQuote, SearchResult, SourceId, TokenDetail, TokenId,
    UtcDateTime,
};

pub(crate) const UPSTREAM: &str = "coingecko";

/// Search results beyond this many are dropped.
pub const SEARCH_RESULT_LIMIT: usize = 10;

/// `/simple/price` entry: `{ "usd": 1.0, "usd_24h_change": -0.5, ... }`.
pub(crate) type SimplePriceEntry = HashMap<String, Option<Number>>;
pub(crate) type SimplePricePayload = HashMap<String, SimplePriceEntry>;

/// Per-currency map such as `market_data.current_price`.
type CurrencyMap = HashMap<String, Option<Number>>;

/// Symbol and name of a coin, from `/coins/{id}` or `/coins/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct CoinInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoinDetailPayload {
    #[serde(default, deserialize_with = "null_as_empty")]
    symbol: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    name: String,
    #[serde(default)]
    image: Option<ImagePayload>,
    #[serde(default)]
    market_data: Option<MarketDataPayload>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    #[serde(default)]
    large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketDataPayload {
    #[serde(default)]
    current_price: Option<CurrencyMap>,
    #[serde(default)]
    market_cap: Option<CurrencyMap>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    fully_diluted_valuation: Option<CurrencyMap>,
    #[serde(default)]
    total_volume: Option<CurrencyMap>,
    #[serde(default)]
    high_24h: Option<CurrencyMap>,
    #[serde(default)]
    low_24h: Option<CurrencyMap>,
    #[serde(default)]
    price_change_24h: Option<Number>,
    #[serde(default)]
    price_change_percentage_24h: Option<Number>,
    #[serde(default)]
    price_change_percentage_7d: Option<Number>,
    #[serde(default)]
    price_change_percentage_30d: Option<Number>,
    #[serde(default)]
    circulating_supply: Option<Number>,
    #[serde(default)]
    total_supply: Option<Number>,
    #[serde(default)]
    max_supply: Option<Number>,
    #[serde(default)]
    ath: Option<CurrencyMap>,
    #[serde(default)]
    ath_date: Option<HashMap<String, Option<String>>>,
    #[serde(default)]
    atl: Option<CurrencyMap>,
    #[serde(default)]
    atl_date: Option<HashMap<String, Option<String>>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarketChartPayload {
    #[serde(default)]
    prices: Vec<(Number, Option<Number>)>,
    #[serde(default)]
    market_caps: Vec<(Number, Option<Number>)>,
    #[serde(default)]
    total_volumes: Vec<(Number, Option<Number>)>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchPayload {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    symbol: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    name: String,
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrendingPayload {
    #[serde(default)]
    coins: Vec<TrendingCoin>,
}

#[derive(Debug, Deserialize)]
struct TrendingCoin {
    item: TrendingItem,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrendingItem {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub score: Option<Number>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GlobalPayload {
    data: Option<GlobalData>,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    #[serde(default)]
    total_market_cap: Option<CurrencyMap>,
    #[serde(default)]
    total_volume: Option<CurrencyMap>,
    #[serde(default)]
    market_cap_change_percentage_24h_usd: Option<Number>,
    #[serde(default)]
    market_cap_percentage: Option<CurrencyMap>,
    #[serde(default)]
    active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    markets: Option<u64>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Convert one JSON number to a decimal.
pub(crate) fn decimal(number: &Number) -> Result<BigDecimal, UpstreamError> {
    BigDecimal::from_str(&number.to_string())
        .map_err(|e| UpstreamError::malformed(UPSTREAM, format!("unparsable number {number}: {e}")))
}

/// Missing or `null` becomes `Some(0)`.
fn zero_if_absent(field: Option<&Number>) -> Result<Option<BigDecimal>, UpstreamError> {
    field
        .map(decimal)
        .transpose()
        .map(|value| Some(value.unwrap_or_default()))
}

/// Missing or `null` stays `None`.
fn absent_if_missing(field: Option<&Number>) -> Result<Option<BigDecimal>, UpstreamError> {
    field.map(decimal).transpose()
}

fn field<'a>(entry: &'a HashMap<String, Option<Number>>, key: &str) -> Option<&'a Number> {
    entry.get(key).and_then(Option::as_ref)
}

fn usd(map: &Option<CurrencyMap>) -> Option<&Number> {
    map.as_ref().and_then(|values| field(values, "usd"))
}

fn usd_date(map: &Option<HashMap<String, Option<String>>>) -> Option<UtcDateTime> {
    map.as_ref()
        .and_then(|dates| dates.get("usd"))
        .and_then(Option::as_deref)
        .and_then(|raw| UtcDateTime::parse(raw).ok())
}

pub(crate) fn quote_from_simple_price(
    id: &TokenId,
    vs_currency: &str,
    entry: &SimplePriceEntry,
    info: &CoinInfo,
    observed_at: UtcDateTime,
) -> Result<PriceQuote, UpstreamError> {
    let price = field(entry, vs_currency).ok_or_else(|| {
        UpstreamError::malformed(UPSTREAM, format!("no '{vs_currency}' price for '{id}'"))
    })?;

    Ok(PriceQuote {
        id: id.clone(),
        symbol: info.symbol.to_uppercase(),
        name: info.name.clone(),
        vs_currency: vs_currency.to_owned(),
        price: decimal(price)?,
        change_24h: zero_if_absent(field(entry, &format!("{vs_currency}_24h_change")))?,
        market_cap: zero_if_absent(field(entry, &format!("{vs_currency}_market_cap")))?,
        volume_24h: zero_if_absent(field(entry, &format!("{vs_currency}_24h_vol")))?,
        observed_at,
        source: SourceId::Coingecko,
    })
}

pub(crate) fn detail_from_payload(
    id: &TokenId,
    payload: CoinDetailPayload,
    observed_at: UtcDateTime,
) -> Result<TokenDetail, UpstreamError> {
    let market = payload.market_data.unwrap_or_default();

    Ok(TokenDetail {
        id: id.clone(),
        symbol: payload.symbol.to_uppercase(),
        name: payload.name,
        image_url: payload.image.and_then(|image| image.large),
        current_price: zero_if_absent(usd(&market.current_price))?.unwrap_or_default(),
        market_cap: zero_if_absent(usd(&market.market_cap))?,
        market_cap_rank: market.market_cap_rank,
        fully_diluted_valuation: zero_if_absent(usd(&market.fully_diluted_valuation))?,
        total_volume: zero_if_absent(usd(&market.total_volume))?,
        high_24h: zero_if_absent(usd(&market.high_24h))?,
        low_24h: zero_if_absent(usd(&market.low_24h))?,
        price_change_24h: zero_if_absent(market.price_change_24h.as_ref())?,
        price_change_percentage_24h: zero_if_absent(market.price_change_percentage_24h.as_ref())?,
        price_change_percentage_7d: zero_if_absent(market.price_change_percentage_7d.as_ref())?,
        price_change_percentage_30d: zero_if_absent(market.price_change_percentage_30d.as_ref())?,
        circulating_supply: zero_if_absent(market.circulating_supply.as_ref())?,
        total_supply: zero_if_absent(market.total_supply.as_ref())?,
        max_supply: absent_if_missing(market.max_supply.as_ref())?,
        ath: zero_if_absent(usd(&market.ath))?,
        ath_date: usd_date(&market.ath_date),
        atl: zero_if_absent(usd(&market.atl))?,
        atl_date: usd_date(&market.atl_date),
        observed_at,
        source: SourceId::Coingecko,
    })
}

/// Zip the chart series by position and sort ascending by time.
pub(crate) fn history_from_chart(
    payload: MarketChartPayload,
) -> Result<Vec<HistoryPoint>, UpstreamError> {
    let mut points = Vec::with_capacity(payload.prices.len());

    for (index, (stamp, price)) in payload.prices.iter().enumerate() {
        let Some(price) = price else {
            continue;
        };
        let side = |series: &[(Number, Option<Number>)]| {
            series
                .get(index)
                .and_then(|(_, value)| value.as_ref())
                .map(decimal)
                .transpose()
        };

        points.push(HistoryPoint {
            timestamp: chart_timestamp(stamp)?,
            price: decimal(price)?,
            market_cap: side(payload.market_caps.as_slice())?,
            volume: side(payload.total_volumes.as_slice())?,
        });
    }

    points.sort_by_key(|point| point.timestamp);
    Ok(points)
}

fn chart_timestamp(stamp: &Number) -> Result<UtcDateTime, UpstreamError> {
    let millis = stamp
        .as_i64()
        .or_else(|| stamp.as_f64().map(|value| value as i64))
        .ok_or_else(|| UpstreamError::malformed(UPSTREAM, format!("bad chart timestamp {stamp}")))?;
    UtcDateTime::from_unix_millis(millis)
        .map_err(|e| UpstreamError::malformed(UPSTREAM, e.to_string()))
}

pub(crate) fn search_results(payload: SearchPayload) -> Vec<SearchResult> {
    payload
        .coins
        .into_iter()
        .filter_map(|coin| {
            let id = match TokenId::parse(&coin.id) {
                Ok(id) => id,
                Err(error) => {
                    debug!(id = %coin.id, %error, "skipping search hit with unusable id");
                    return None;
                }
            };
            Some(SearchResult {
                id,
                symbol: coin.symbol.to_uppercase(),
                name: coin.name,
                image_url: coin.large,
                market_cap_rank: coin.market_cap_rank,
                relevance_score: BigDecimal::from(1),
            })
        })
        .take(SEARCH_RESULT_LIMIT)
        .collect()
}

pub(crate) fn trending_items(payload: TrendingPayload, limit: usize) -> Vec<TrendingItem> {
    payload
        .coins
        .into_iter()
        .map(|coin| coin.item)
        .take(limit)
        .collect()
}

pub(crate) fn search_score(item: &TrendingItem) -> Result<BigDecimal, UpstreamError> {
    Ok(zero_if_absent(item.score.as_ref())?.unwrap_or_default())
}

pub(crate) fn snapshot_from_global(
    payload: GlobalPayload,
    observed_at: UtcDateTime,
) -> Result<MarketSnapshot, UpstreamError> {
    let data = payload
        .data
        .ok_or_else(|| UpstreamError::malformed(UPSTREAM, "global payload has no 'data' object"))?;
    let dominance = |coin: &str| {
        data.market_cap_percentage
            .as_ref()
            .and_then(|shares| field(shares, coin))
    };

    Ok(MarketSnapshot {
        total_market_cap: zero_if_absent(usd(&data.total_market_cap))?.unwrap_or_default(),
        total_volume_24h: zero_if_absent(usd(&data.total_volume))?.unwrap_or_default(),
        market_cap_change_24h: zero_if_absent(data.market_cap_change_percentage_24h_usd.as_ref())?
            .unwrap_or_default(),
        btc_dominance: zero_if_absent(dominance("btc"))?.unwrap_or_default(),
        eth_dominance: zero_if_absent(dominance("eth"))?.unwrap_or_default(),
        active_count: data.active_cryptocurrencies.unwrap_or(0),
        market_count: data.markets.unwrap_or(0),
        observed_at,
    })
}
