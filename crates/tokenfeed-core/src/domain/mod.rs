//! # Domain Records
//!
//! Value objects produced by the upstream clients. Every record is built
//! fresh from one upstream payload and never mutated afterwards; caches hand
//! out clones.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PriceQuote`] | Spot price with 24h change, market cap and volume |
//! | [`TokenDetail`] | Full market profile including supply and ATH/ATL |
//! | [`HistoryPoint`] | One sample of a price chart |
//! | [`SearchResult`] | Coin matched by a free-text query |
//! | [`TrendingEntry`] | Ranked trending coin with its current quote |
//! | [`MarketSnapshot`] | Whole-market totals and dominance |
//! | [`ChainPriceFeedReading`] | Latest answer of an on-chain price feed |
//! | [`TokenSupplyReading`] | ERC-20 total supply normalized by decimals |
//! | [`ChainInfo`] / [`DexInfo`] | Projections of the static catalog |
//! | [`TokenId`] / [`TokenAddress`] | Validated identifiers |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Monetary and quantity fields are [`bigdecimal::BigDecimal`]; nothing is
//! ever stored as binary floating point.

mod identifiers;
mod models;
mod timestamp;

pub use identifiers::{TokenAddress, TokenId};
pub use models::{
    ChainInfo, ChainPriceFeedReading, DexInfo, FeeStructure, HistoryPoint, MarketSnapshot,
    PriceQuote, SearchResult, TokenDetail, TokenSupplyReading, TrendingEntry,
};
pub use timestamp::UtcDateTime;
