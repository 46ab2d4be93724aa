//! Typed clients for the external systems the aggregator depends on.
//!
//! Each client owns one [`UpstreamGuard`] (breaker, retry schedule, optional
//! request budget) and one read-through cache per operation class. Nothing
//! is shared between client instances, so one chain's failing RPC endpoint
//! never affects another chain or the price API.

mod chain;
pub(crate) mod coingecko;
mod guard;
mod price;
mod rpc;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::circuit_breaker::CircuitState;
use crate::error::UpstreamError;
use crate::{PriceQuote, SourceId};

pub use chain::{ChainUpstream, ChainUpstreamConfig};
pub use coingecko::SEARCH_RESULT_LIMIT;
pub use guard::UpstreamGuard;
pub use price::{PriceUpstream, PriceUpstreamConfig};

/// Anything that can price a coin by id; ordered lists of these back `best_quote`.
pub trait QuoteSource: Send + Sync {
    fn id(&self) -> SourceId;

    fn quote<'a>(
        &'a self,
        id: &'a str,
        vs_currency: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PriceQuote, UpstreamError>> + Send + 'a>>;
}

/// Breaker view of one upstream, read without network access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamHealth {
    pub upstream: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

impl UpstreamGuard {
    pub fn health(&self) -> UpstreamHealth {
        UpstreamHealth {
            upstream: self.name().to_owned(),
            state: self.state(),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}
