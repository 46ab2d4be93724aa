//! CLI argument definitions for tokenfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Spot price of one coin (best available source) |
//! | `quotes` | Batch spot prices |
//! | `detail` | Full market profile of one coin |
//! | `history` | USD price chart |
//! | `search` | Free-text coin search |
//! | `trending` | Trending coins with current prices |
//! | `market` | Whole-market snapshot |
//! | `feed` | On-chain price feed reading |
//! | `supply` | ERC-20 total supply |
//! | `report` | Detail plus 7-day history, tolerating partial failure |
//! | `chains` | Supported chains |
//! | `dexes` | Supported DEXes |
//! | `health` | Breaker state per upstream |
//!
//! # Examples
//!
//! ```bash
//! tokenfeed quote bitcoin
//! tokenfeed quotes bitcoin ethereum --vs eur --pretty
//! tokenfeed feed ETH/USD --chain polygon
//! RUST_LOG=tokenfeed=debug tokenfeed report ethereum
//! ```

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "tokenfeed",
    version,
    about = "Resilient token price and on-chain market data",
    long_about = "Fetches prices, market data and on-chain readings through per-upstream \
circuit breakers, retries and TTL caches. Configuration comes from TOKENFEED_* \
environment variables; logs go to stderr (RUST_LOG)."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Spot price of one coin in USD, first successful source wins.
    Quote(QuoteArgs),
    /// Spot prices of several coins in one request.
    Quotes(QuotesArgs),
    /// Full market profile of one coin.
    Detail(CoinArgs),
    /// USD price chart of one coin.
    History(HistoryArgs),
    /// Search coins by name or symbol.
    Search(SearchArgs),
    /// Trending coins with their current USD quote.
    Trending(TrendingArgs),
    /// Whole-market totals and dominance.
    Market,
    /// Latest answer of an on-chain price feed.
    Feed(FeedArgs),
    /// ERC-20 total supply normalized by decimals.
    Supply(SupplyArgs),
    /// Detail plus 7-day history; missing pieces are reported, not fatal.
    Report(CoinArgs),
    /// Supported chains with RPC endpoint and price feeds.
    Chains,
    /// Supported DEXes and their fee schedules.
    Dexes,
    /// Breaker state of every upstream (no network access).
    Health,
}

#[derive(Debug, Clone, Args)]
pub struct CoinArgs {
    /// Price-API coin id such as `bitcoin`.
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    pub id: String,

    /// Quote currency; anything other than USD bypasses source fallback.
    #[arg(long = "vs")]
    pub vs_currency: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct QuotesArgs {
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,

    #[arg(long = "vs", default_value = "usd")]
    pub vs_currency: String,
}

#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    pub id: String,

    #[arg(long, default_value_t = 7)]
    pub days: u32,
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    pub query: String,
}

#[derive(Debug, Clone, Args)]
pub struct TrendingArgs {
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Clone, Args)]
pub struct FeedArgs {
    /// Feed pair such as `ETH/USD`.
    pub pair: String,

    #[arg(long, default_value = "ethereum")]
    pub chain: String,
}

#[derive(Debug, Clone, Args)]
pub struct SupplyArgs {
    /// Token contract address (`0x` + 40 hex digits).
    pub address: String,

    #[arg(long, default_value = "ethereum")]
    pub chain: String,
}
