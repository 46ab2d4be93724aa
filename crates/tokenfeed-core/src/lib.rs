//! # Tokenfeed Core
//!
//! Resilient aggregation layer for cryptocurrency prices and on-chain market
//! data.
//!
//! ## Overview
//!
//! - **Typed upstream clients** for a CoinGecko-shaped pricing API and for
//!   per-chain JSON-RPC endpoints (price feeds, ERC-20 supply)
//! - **Per-upstream circuit breaking**: a failing chain never degrades the
//!   pricing API or another chain
//! - **Retrying transport** with exponential backoff and a dedicated
//!   rate-limit cooldown
//! - **Read-through TTL caches** with single-flight request coalescing
//! - **Aggregator** with best-source selection and partial-result merging
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregator`] | Unified entry point over every upstream |
//! | [`cache`] | Bounded TTL cache |
//! | [`catalog`] | Static chain, DEX and price-feed tables |
//! | [`circuit_breaker`] | Closed/Open/HalfOpen breaker with permits |
//! | [`config`] | `TOKENFEED_*` environment settings |
//! | [`domain`] | Domain records and validated identifiers |
//! | [`error`] | Error taxonomy |
//! | [`http_client`] | HTTP client abstraction and status classification |
//! | [`read_through`] | Cache-aside reads with request coalescing |
//! | [`retry`] | Backoff schedules and the retry loop |
//! | [`single_flight`] | Per-key in-flight deduplication |
//! | [`source`] | Record provenance identifiers |
//! | [`throttling`] | Client-side request budget |
//! | [`upstream`] | Pricing API and chain RPC clients |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokenfeed_core::{AggregatorService, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AggregatorService::from_settings(&Settings::from_env()?)?;
//!
//!     let quote = service.best_quote("bitcoin").await?;
//!     println!("{} {}", quote.symbol, quote.price);
//!
//!     let report = service.comprehensive_detail("ethereum").await?;
//!     for failure in &report.failures {
//!         eprintln!("missing {}: {}", failure.component, failure.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Call Path
//!
//! ```text
//! ┌────────────────────┐
//! │ AggregatorService  │
//! └─────────┬──────────┘
//!           ▼
//! ┌────────────────────┐     ┌──────────────────┐
//! │ ReadThrough        │────▶│ ExpiringCache    │
//! │ (single-flight)    │     └──────────────────┘
//! └─────────┬──────────┘
//!           ▼ miss
//! ┌────────────────────┐     ┌──────────────────┐
//! │ UpstreamGuard      │────▶│ Circuit Breaker  │
//! │                    │────▶│ Retry / Throttle │
//! └─────────┬──────────┘     └──────────────────┘
//!           ▼
//! ┌────────────────────┐
//! │ HttpClient         │
//! └────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use tokenfeed_core::{UpstreamError, UpstreamErrorKind};
//!
//! fn should_alert(error: &UpstreamError) -> bool {
//!     match error.kind() {
//!         UpstreamErrorKind::CircuitOpen | UpstreamErrorKind::RetriesExhausted => true,
//!         UpstreamErrorKind::NotFound | UpstreamErrorKind::InvalidRequest => false,
//!         _ => error.counts_against_upstream(),
//!     }
//! }
//! ```

pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod read_through;
pub mod retry;
pub mod single_flight;
pub mod source;
pub mod throttling;
pub mod upstream;

// Aggregation
pub use aggregator::{
    AggregatorBuilder, AggregatorService, ComprehensiveDetail, PartialFailure,
    COMPREHENSIVE_HISTORY_DAYS,
};

// Resilience primitives
pub use cache::ExpiringCache;
pub use circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use read_through::ReadThrough;
pub use retry::{Backoff, RetryPolicy, RetryingTransport};
pub use single_flight::SingleFlight;
pub use throttling::RequestThrottle;

// Static catalog
pub use catalog::{ChainId, ChainSpec, DexSpec, FeeSchedule};

// Configuration
pub use config::{CacheTtls, Settings, ThrottleSettings};

// Domain models
pub use domain::{
    ChainInfo, ChainPriceFeedReading, DexInfo, FeeStructure, HistoryPoint, MarketSnapshot,
    PriceQuote, SearchResult, TokenAddress, TokenDetail, TokenId, TokenSupplyReading,
    TrendingEntry, UtcDateTime,
};

// Error types
pub use error::{
    ConfigError, TransientError, TransientKind, UpstreamError, UpstreamErrorKind, ValidationError,
};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Upstream clients
pub use upstream::{
    ChainUpstream, ChainUpstreamConfig, PriceUpstream, PriceUpstreamConfig, QuoteSource,
    UpstreamGuard, UpstreamHealth, SEARCH_RESULT_LIMIT,
};

// Source identifiers
pub use source::SourceId;
