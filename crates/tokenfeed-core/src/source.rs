use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Where a record's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Coingecko,
    Chainlink,
    Erc20,
}

impl SourceId {
    pub const ALL: [Self; 3] = [Self::Coingecko, Self::Chainlink, Self::Erc20];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coingecko => "coingecko",
            Self::Chainlink => "chainlink",
            Self::Erc20 => "erc20",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "coingecko" => Ok(Self::Coingecko),
            "chainlink" => Ok(Self::Chainlink),
            "erc20" => Ok(Self::Erc20),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_sources() {
        for source in SourceId::ALL {
            assert_eq!(source.as_str().parse::<SourceId>(), Ok(source));
        }
        assert!("dex".parse::<SourceId>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let encoded = serde_json::to_string(&SourceId::Coingecko).expect("serializes");
        assert_eq!(encoded, "\"coingecko\"");
    }
}
