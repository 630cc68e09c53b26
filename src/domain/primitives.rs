//! Domain primitives: entity ids, currency codes and pairs, index types, Side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct PrimitiveParseError {
    pub kind: &'static str,
    pub value: String,
}

impl PrimitiveParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a tradeable instrument (bond, ETF, crypto asset).
    InstrumentId
);
entity_id!(
    /// Identifier of a rental contract.
    ContractId
);
entity_id!(
    /// Identifier of a buy/sell transaction.
    TransactionId
);

/// ISO-like currency code, stored upper-case (e.g. "USD", "ARS").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CurrencyCode(String);

impl TryFrom<String> for CurrencyCode {
    type Error = PrimitiveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl CurrencyCode {
    pub fn new(code: &str) -> Self {
        CurrencyCode(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PrimitiveParseError::new("currency code", s));
        }
        Ok(CurrencyCode::new(trimmed))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency pair quoted as units of `quote` per one unit of `base` ("USD/ARS").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CurrencyPair {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(base: CurrencyCode, quote: CurrencyCode) -> Self {
        Self { base, quote }
    }

    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl FromStr for CurrencyPair {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| PrimitiveParseError::new("currency pair", s))?;
        let base = base
            .parse()
            .map_err(|_| PrimitiveParseError::new("currency pair", s))?;
        let quote = quote
            .parse()
            .map_err(|_| PrimitiveParseError::new("currency pair", s))?;
        Ok(CurrencyPair { base, quote })
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = PrimitiveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(value: CurrencyPair) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Published index series identifier (e.g. "CPI", "ICL"), stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct IndexType(String);

impl From<String> for IndexType {
    fn from(value: String) -> Self {
        IndexType::new(&value)
    }
}

impl From<IndexType> for String {
    fn from(value: IndexType) -> Self {
        value.0
    }
}

impl IndexType {
    pub fn new(name: &str) -> Self {
        IndexType(name.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade side: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(PrimitiveParseError::new("side", s)),
        }
    }
}

/// Where a fact came from. Manual entries outrank scraped ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Manual,
    Scraped,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::Scraped => "scraped",
        }
    }
}

impl FromStr for Source {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Source::Manual),
            "scraped" => Ok(Source::Scraped),
            _ => Err(PrimitiveParseError::new("source", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
    }

    #[test]
    fn test_currency_pair_parse_and_inverse() {
        let pair: CurrencyPair = "usd/ars".parse().unwrap();
        assert_eq!(pair.to_string(), "USD/ARS");
        assert_eq!(pair.inverse().to_string(), "ARS/USD");
        assert!(!pair.is_identity());
    }

    #[test]
    fn test_currency_pair_rejects_garbage() {
        assert!("USDARS".parse::<CurrencyPair>().is_err());
        assert!("USD/".parse::<CurrencyPair>().is_err());
    }

    #[test]
    fn test_index_type_is_uppercased() {
        assert_eq!(IndexType::new(" cpi ").as_str(), "CPI");
    }

    #[test]
    fn test_string_backed_serde_normalizes() {
        let pair: CurrencyPair = serde_json::from_str("\"usd/ars\"").unwrap();
        assert_eq!(serde_json::to_string(&pair).unwrap(), "\"USD/ARS\"");
        let index: IndexType = serde_json::from_str("\"icl\"").unwrap();
        assert_eq!(index, IndexType::new("ICL"));
        assert!(serde_json::from_str::<CurrencyCode>("\"U$D\"").is_err());
    }
}
