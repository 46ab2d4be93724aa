use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{ChainId, DexSpec, FeeSchedule};
use crate::{SourceId, TokenAddress, TokenId, UtcDateTime};

/// Spot price of one coin in one quote currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub id: TokenId,
    pub symbol: String,
    pub name: String,
    /// Quote currency of `price`, lowercase (`usd` unless requested otherwise).
    pub vs_currency: String,
    pub price: BigDecimal,
    /// 24h change in percent.
    pub change_24h: Option<BigDecimal>,
    pub market_cap: Option<BigDecimal>,
    pub volume_24h: Option<BigDecimal>,
    pub observed_at: UtcDateTime,
    pub source: SourceId,
}

/// Full market profile of one coin, priced in USD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDetail {
    pub id: TokenId,
    pub symbol: String,
    pub name: String,
    pub image_url: Option<String>,
    pub current_price: BigDecimal,
    pub market_cap: Option<BigDecimal>,
    pub market_cap_rank: Option<u32>,
    pub fully_diluted_valuation: Option<BigDecimal>,
    pub total_volume: Option<BigDecimal>,
    pub high_24h: Option<BigDecimal>,
    pub low_24h: Option<BigDecimal>,
    pub price_change_24h: Option<BigDecimal>,
    pub price_change_percentage_24h: Option<BigDecimal>,
    pub price_change_percentage_7d: Option<BigDecimal>,
    pub price_change_percentage_30d: Option<BigDecimal>,
    pub circulating_supply: Option<BigDecimal>,
    pub total_supply: Option<BigDecimal>,
    pub max_supply: Option<BigDecimal>,
    pub ath: Option<BigDecimal>,
    pub ath_date: Option<UtcDateTime>,
    pub atl: Option<BigDecimal>,
    pub atl_date: Option<UtcDateTime>,
    pub observed_at: UtcDateTime,
    pub source: SourceId,
}

/// One sample of a USD price chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: UtcDateTime,
    pub price: BigDecimal,
    pub market_cap: Option<BigDecimal>,
    pub volume: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: TokenId,
    pub symbol: String,
    pub name: String,
    pub image_url: Option<String>,
    pub market_cap_rank: Option<u32>,
    pub relevance_score: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub id: TokenId,
    pub symbol: String,
    pub name: String,
    /// 1-based position in the upstream's trending list.
    pub rank: u32,
    pub price: BigDecimal,
    pub change_24h: Option<BigDecimal>,
    pub volume_24h: Option<BigDecimal>,
    pub search_score: BigDecimal,
}

/// Whole-market totals, priced in USD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub total_market_cap: BigDecimal,
    pub total_volume_24h: BigDecimal,
    /// Market cap change over 24h in percent.
    pub market_cap_change_24h: BigDecimal,
    pub btc_dominance: BigDecimal,
    pub eth_dominance: BigDecimal,
    pub active_count: u64,
    pub market_count: u64,
    pub observed_at: UtcDateTime,
}

/// Latest answer of an on-chain price feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPriceFeedReading {
    pub pair: String,
    pub price: BigDecimal,
    pub decimals: u8,
    pub feed_address: String,
    pub chain: ChainId,
    /// When the feed last updated its answer.
    pub observed_at: UtcDateTime,
    pub round_id: Option<u128>,
    pub started_at: Option<UtcDateTime>,
    pub source: SourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSupplyReading {
    pub token_address: TokenAddress,
    pub chain: ChainId,
    pub total_supply: BigDecimal,
    pub decimals: u8,
    pub observed_at: UtcDateTime,
    pub circulating_supply: Option<BigDecimal>,
    pub max_supply: Option<BigDecimal>,
    pub source: SourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: ChainId,
    pub network_id: u64,
    pub name: String,
    pub symbol: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub is_testnet: bool,
    pub supported_dexes: Vec<String>,
    pub wrapped_native: String,
    /// Pairs with an on-chain price feed on this chain.
    pub price_feeds: Vec<String>,
}

/// Fee schedule as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeeStructure {
    SwapFee { swap_fee: String },
    FeeTiers { fee_tiers: Vec<String> },
}

impl From<FeeSchedule> for FeeStructure {
    fn from(value: FeeSchedule) -> Self {
        match value {
            FeeSchedule::Flat(fee) => Self::SwapFee {
                swap_fee: fee.to_owned(),
            },
            FeeSchedule::Tiered(tiers) => Self::FeeTiers {
                fee_tiers: tiers.iter().map(|tier| (*tier).to_owned()).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexInfo {
    pub dex_id: String,
    pub name: String,
    pub website: String,
    pub supported_chains: Vec<ChainId>,
    pub factory_address: String,
    pub router_address: String,
    pub fee_structure: FeeStructure,
}

impl From<&DexSpec> for DexInfo {
    fn from(spec: &DexSpec) -> Self {
        Self {
            dex_id: spec.id.to_owned(),
            name: spec.name.to_owned(),
            website: spec.website.to_owned(),
            supported_chains: spec.supported_chains.to_vec(),
            factory_address: spec.factory_address.to_owned(),
            router_address: spec.router_address.to_owned(),
            fee_structure: spec.fees.into(),
        }
    }
}
