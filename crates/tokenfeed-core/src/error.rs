use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Input validation errors raised before any upstream is contacted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("token id cannot be empty")]
    EmptyTokenId,
    #[error("token id contains invalid character '{ch}' at index {index}")]
    TokenIdInvalidChar { ch: char, index: usize },
    #[error("at least one token id is required")]
    EmptyTokenList,
    #[error("quote currency must be a non-empty alphanumeric code: '{value}'")]
    InvalidCurrency { value: String },
    #[error("search query cannot be empty")]
    EmptyQuery,
    #[error("token address must be 0x followed by 40 hex digits: '{value}'")]
    InvalidAddress { value: String },
    #[error("history window must be at least one day")]
    ZeroHistoryDays,
    #[error("limit must be greater than zero")]
    ZeroLimit,
    #[error("unknown chain '{value}'")]
    UnknownChain { value: String },
    #[error("unknown source '{value}'")]
    InvalidSource { value: String },
    #[error("invalid RFC3339 timestamp: '{value}'")]
    InvalidTimestamp { value: String },
    #[error("unix timestamp out of range: {value}")]
    TimestampOutOfRange { value: i128 },
}

/// Configuration errors raised while reading settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Transient failure classification used by retry and breaker logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Network,
    Timeout,
    RateLimited,
    ServerError { status: u16 },
}

impl Display for TransientKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Timeout => f.write_str("timeout"),
            Self::RateLimited => f.write_str("rate limited"),
            Self::ServerError { status } => write!(f, "server error {status}"),
        }
    }
}

/// A failure likely to succeed when retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransientError {
    pub kind: TransientKind,
    pub message: String,
}

impl TransientError {
    pub fn new(kind: TransientKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransientKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransientKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(TransientKind::RateLimited, message)
    }

    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::new(TransientKind::ServerError { status }, message)
    }

    pub const fn is_rate_limit(&self) -> bool {
        matches!(self.kind, TransientKind::RateLimited)
    }
}

/// Coarse error classification for callers that only branch on category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    NotFound,
    UnsupportedPair,
    UnsupportedChain,
    Transient,
    RetriesExhausted,
    CircuitOpen,
    MalformedResponse,
    InvalidRequest,
}

/// Every failure an upstream operation can surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("pair '{pair}' has no price feed on {chain}")]
    UnsupportedPair { chain: String, pair: String },

    #[error("chain '{chain}' is not supported")]
    UnsupportedChain { chain: String },

    #[error("transient upstream failure ({0})")]
    Transient(#[from] TransientError),

    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: TransientError },

    #[error("circuit breaker for {upstream} is open")]
    CircuitOpen { upstream: String },

    #[error("malformed response from {upstream}: {message}")]
    MalformedResponse { upstream: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl UpstreamError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn malformed(upstream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            upstream: upstream.into(),
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub const fn kind(&self) -> UpstreamErrorKind {
        match self {
            Self::NotFound { .. } => UpstreamErrorKind::NotFound,
            Self::UnsupportedPair { .. } => UpstreamErrorKind::UnsupportedPair,
            Self::UnsupportedChain { .. } => UpstreamErrorKind::UnsupportedChain,
            Self::Transient(_) => UpstreamErrorKind::Transient,
            Self::RetriesExhausted { .. } => UpstreamErrorKind::RetriesExhausted,
            Self::CircuitOpen { .. } => UpstreamErrorKind::CircuitOpen,
            Self::MalformedResponse { .. } => UpstreamErrorKind::MalformedResponse,
            Self::InvalidRequest(_) => UpstreamErrorKind::InvalidRequest,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind() {
            UpstreamErrorKind::NotFound => "upstream.not_found",
            UpstreamErrorKind::UnsupportedPair => "upstream.unsupported_pair",
            UpstreamErrorKind::UnsupportedChain => "upstream.unsupported_chain",
            UpstreamErrorKind::Transient => "upstream.transient",
            UpstreamErrorKind::RetriesExhausted => "upstream.retries_exhausted",
            UpstreamErrorKind::CircuitOpen => "upstream.circuit_open",
            UpstreamErrorKind::MalformedResponse => "upstream.malformed_response",
            UpstreamErrorKind::InvalidRequest => "upstream.invalid_request",
        }
    }

    /// Only transient failures are retried.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Failures that say the upstream itself is unhealthy and feed the breaker.
    pub const fn counts_against_upstream(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RetriesExhausted { .. })
    }

    /// The transient cause, either direct or wrapped by retry exhaustion.
    pub fn transient_cause(&self) -> Option<&TransientError> {
        match self {
            Self::Transient(error) => Some(error),
            Self::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}

impl From<ValidationError> for UpstreamError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::UnknownChain { value } => Self::UnsupportedChain { chain: value },
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}
