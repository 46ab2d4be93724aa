use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Normalized price-upstream coin identifier (e.g. `bitcoin`, `avalanche-2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Parse and normalize an identifier to lowercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTokenId);
        }

        let normalized = trimmed.to_ascii_lowercase();
        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.');
            if !valid {
                return Err(ValidationError::TokenIdInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TokenId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for TokenId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TokenId> for String {
    fn from(value: TokenId) -> Self {
        value.0
    }
}

/// EVM contract address: `0x` followed by 40 hex digits, case preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let valid = trimmed.len() == 42
            && (trimmed.starts_with("0x") || trimmed.starts_with("0X"))
            && trimmed[2..].chars().all(|ch| ch.is_ascii_hexdigit());
        if !valid {
            return Err(ValidationError::InvalidAddress {
                value: trimmed.to_owned(),
            });
        }

        Ok(Self(format!("0x{}", &trimmed[2..])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form, used where two spellings of one address must compare equal.
    pub fn canonical(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl Display for TokenAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TokenAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TokenAddress> for String {
    fn from(value: TokenAddress) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ids_are_trimmed_and_lowercased() {
        let parsed = TokenId::parse(" Avalanche-2 ").expect("id should parse");
        assert_eq!(parsed.as_str(), "avalanche-2");
    }

    #[test]
    fn token_ids_reject_empty_and_url_characters() {
        assert_eq!(TokenId::parse("  "), Err(ValidationError::EmptyTokenId));
        assert!(matches!(
            TokenId::parse("bitcoin,ethereum"),
            Err(ValidationError::TokenIdInvalidChar { ch: ',', index: 7 })
        ));
        assert!(TokenId::parse("../admin").is_err());
    }

    #[test]
    fn addresses_require_prefix_and_forty_hex_digits() {
        let address = TokenAddress::parse("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
            .expect("address should parse");
        assert_eq!(address.canonical(), "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

        for bad in [
            "A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB4",
            "0xZ0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        ] {
            assert!(matches!(
                TokenAddress::parse(bad),
                Err(ValidationError::InvalidAddress { .. })
            ));
        }
    }
}
