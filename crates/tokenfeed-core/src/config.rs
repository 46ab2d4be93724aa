//! Process settings read from `TOKENFEED_*` environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TOKENFEED_COINGECKO_BASE_URL` | `https://api.coingecko.com/api/v3` |
//! | `TOKENFEED_COINGECKO_API_KEY` | unset |
//! | `TOKENFEED_<CHAIN>_RPC_URL` | public endpoint per chain |
//! | `TOKENFEED_CACHE_PRICE_TTL_SECS` | 300 |
//! | `TOKENFEED_CACHE_MARKET_TTL_SECS` | 600 |
//! | `TOKENFEED_CACHE_TOKEN_TTL_SECS` | 3600 |
//! | `TOKENFEED_CACHE_HISTORY_TTL_SECS` | 86400 |
//! | `TOKENFEED_CACHE_CAPACITY` | 1000 |
//! | `TOKENFEED_BREAKER_FAILURE_THRESHOLD` | 5 |
//! | `TOKENFEED_BREAKER_RECOVERY_TIMEOUT_SECS` | 60 |
//! | `TOKENFEED_RETRY_ATTEMPTS` | 3 |
//! | `TOKENFEED_RETRY_BASE_DELAY_MS` | 1000 |
//! | `TOKENFEED_RETRY_BACKOFF` | 2.0 |
//! | `TOKENFEED_RETRY_MAX_DELAY_MS` | 10000 |
//! | `TOKENFEED_RATE_LIMIT_COOLDOWN_SECS` | 60 |
//! | `TOKENFEED_REQUEST_TIMEOUT_SECS` | 30 |
//! | `TOKENFEED_RATE_LIMIT_PER_MINUTE` | 100 |
//! | `TOKENFEED_RATE_LIMIT_BURST` | 20 |

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::ChainId;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::retry::{Backoff, RetryPolicy};

const PREFIX: &str = "TOKENFEED_";
pub const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// TTL per data class plus the shared entry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub price: Duration,
    pub market: Duration,
    pub token: Duration,
    pub history: Duration,
    pub capacity: usize,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            price: Duration::from_secs(300),
            market: Duration::from_secs(600),
            token: Duration::from_secs(3_600),
            history: Duration::from_secs(86_400),
            capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSettings {
    pub per_minute: u32,
    pub burst: u32,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            per_minute: 100,
            burst: 20,
        }
    }
}

/// Fully resolved settings for building an aggregator.
#[derive(Clone, PartialEq)]
pub struct Settings {
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,
    pub rpc_urls: BTreeMap<ChainId, String>,
    pub cache: CacheTtls,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
    pub throttle: ThrottleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coingecko_base_url: String::from(DEFAULT_COINGECKO_BASE_URL),
            coingecko_api_key: None,
            rpc_urls: ChainId::ALL
                .into_iter()
                .map(|chain| (chain, String::from(chain.spec().default_rpc_url)))
                .collect(),
            cache: CacheTtls::default(),
            breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
            throttle: ThrottleSettings::default(),
        }
    }
}

// The API key must never reach logs.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("coingecko_base_url", &self.coingecko_base_url)
            .field(
                "coingecko_api_key",
                &self.coingecko_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("rpc_urls", &self.rpc_urls)
            .field("cache", &self.cache)
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .field("throttle", &self.throttle)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through `lookup`, which receives full variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };
        let defaults = Self::default();

        let mut rpc_urls = defaults.rpc_urls;
        for chain in ChainId::ALL {
            if let Some(url) = vars.string(&format!("{}_RPC_URL", chain.env_name())) {
                rpc_urls.insert(chain, url);
            }
        }

        let cache = CacheTtls {
            price: vars.secs("CACHE_PRICE_TTL_SECS", defaults.cache.price)?,
            market: vars.secs("CACHE_MARKET_TTL_SECS", defaults.cache.market)?,
            token: vars.secs("CACHE_TOKEN_TTL_SECS", defaults.cache.token)?,
            history: vars.secs("CACHE_HISTORY_TTL_SECS", defaults.cache.history)?,
            capacity: vars.parsed("CACHE_CAPACITY", defaults.cache.capacity)?,
        };

        let breaker = CircuitBreakerConfig {
            failure_threshold: vars
                .parsed("BREAKER_FAILURE_THRESHOLD", defaults.breaker.failure_threshold)?,
            recovery_timeout: vars.secs(
                "BREAKER_RECOVERY_TIMEOUT_SECS",
                defaults.breaker.recovery_timeout,
            )?,
        };

        let multiplier: f64 = vars.parsed("RETRY_BACKOFF", 2.0)?;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(vars.invalid("RETRY_BACKOFF", multiplier.to_string()));
        }
        let retry = RetryPolicy {
            max_attempts: vars.parsed("RETRY_ATTEMPTS", defaults.retry.max_attempts)?,
            backoff: Backoff::Exponential {
                base: vars.millis("RETRY_BASE_DELAY_MS", Duration::from_secs(1))?,
                factor: multiplier,
                max: vars.millis("RETRY_MAX_DELAY_MS", Duration::from_secs(10))?,
                jitter: false,
            },
            rate_limit_cooldown: vars.secs(
                "RATE_LIMIT_COOLDOWN_SECS",
                defaults.retry.rate_limit_cooldown,
            )?,
            attempt_timeout: vars.secs("REQUEST_TIMEOUT_SECS", defaults.retry.attempt_timeout)?,
        };
        if retry.max_attempts == 0 {
            return Err(vars.invalid("RETRY_ATTEMPTS", "0"));
        }

        let throttle = ThrottleSettings {
            per_minute: vars.parsed("RATE_LIMIT_PER_MINUTE", defaults.throttle.per_minute)?,
            burst: vars.parsed("RATE_LIMIT_BURST", defaults.throttle.burst)?,
        };

        Ok(Self {
            coingecko_base_url: vars
                .string("COINGECKO_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.coingecko_base_url),
            coingecko_api_key: vars.string("COINGECKO_API_KEY"),
            rpc_urls,
            cache,
            breaker,
            retry,
            throttle,
        })
    }

    pub fn rpc_url(&self, chain: ChainId) -> &str {
        self.rpc_urls
            .get(&chain)
            .map(String::as_str)
            .unwrap_or(chain.spec().default_rpc_url)
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value of `TOKENFEED_<name>`.
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{PREFIX}{name}"))
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| self.invalid(name, raw)),
        }
    }

    fn secs(&self, name: &str, default: Duration) -> Result<Duration, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| self.invalid(name, raw)),
        }
    }

    fn millis(&self, name: &str, default: Duration) -> Result<Duration, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| self.invalid(name, raw)),
        }
    }

    fn invalid(&self, name: &str, value: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            key: format!("{PREFIX}{name}"),
            value: value.into(),
        }
    }
}
