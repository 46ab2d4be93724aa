use thiserror::Error;
use tokenfeed_core::{UpstreamErrorKind, ValidationError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] tokenfeed_core::ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] tokenfeed_core::UpstreamError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Validation(_) => 2,
            Self::Upstream(error) => match error.kind() {
                UpstreamErrorKind::InvalidRequest
                | UpstreamErrorKind::UnsupportedChain
                | UpstreamErrorKind::UnsupportedPair => 2,
                _ => 3,
            },
            Self::Serialization(_) => 4,
        }
    }
}
