use crate::domain::{CurrencyCode, CurrencyPair, IndexType};
use crate::engine::DEFAULT_LOOKBACK_DAYS;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub fx_lookback_days: u32,
    /// Primary and secondary currencies rental rows are normalized into.
    pub reporting_currencies: [CurrencyCode; 2],
    pub devaluation_pair: CurrencyPair,
    /// Index whose prints feed the accumulated-inflation column of
    /// fixed-percentage contracts.
    pub reference_inflation_index: IndexType,
    pub regeneration_concurrency: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let default_lookback = DEFAULT_LOOKBACK_DAYS.to_string();
        let fx_lookback_days = env_map
            .get("FX_LOOKBACK_DAYS")
            .map(|s| s.as_str())
            .unwrap_or(&default_lookback)
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "FX_LOOKBACK_DAYS".to_string(),
                    "must be a non-negative integer".to_string(),
                )
            })?;

        let reporting_currencies = parse_reporting_currencies(
            env_map
                .get("REPORTING_CURRENCIES")
                .map(|s| s.as_str())
                .unwrap_or("USD,ARS"),
        )?;

        let devaluation_pair = env_map
            .get("DEVALUATION_PAIR")
            .map(|s| s.as_str())
            .unwrap_or("USD/ARS")
            .parse::<CurrencyPair>()
            .map_err(|e| ConfigError::InvalidValue("DEVALUATION_PAIR".to_string(), e.to_string()))?;

        let reference_inflation_index = match env_map
            .get("REFERENCE_INFLATION_INDEX")
            .map(|s| s.trim())
            .unwrap_or("CPI")
        {
            "" => {
                return Err(ConfigError::InvalidValue(
                    "REFERENCE_INFLATION_INDEX".to_string(),
                    "must not be empty".to_string(),
                ))
            }
            name => IndexType::new(name),
        };

        let regeneration_concurrency = match env_map
            .get("REGENERATION_CONCURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("4")
            .parse::<usize>()
        {
            Ok(n) if n >= 1 => n,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "REGENERATION_CONCURRENCY".to_string(),
                    "must be an integer >= 1".to_string(),
                ))
            }
        };

        Ok(Config {
            port,
            database_path,
            fx_lookback_days,
            reporting_currencies,
            devaluation_pair,
            reference_inflation_index,
            regeneration_concurrency,
        })
    }

    /// Defaults for everything but the database location.
    pub fn with_database_path(database_path: impl Into<String>) -> Self {
        Config {
            port: 8080,
            database_path: database_path.into(),
            fx_lookback_days: DEFAULT_LOOKBACK_DAYS,
            reporting_currencies: [CurrencyCode::new("USD"), CurrencyCode::new("ARS")],
            devaluation_pair: CurrencyPair::new(CurrencyCode::new("USD"), CurrencyCode::new("ARS")),
            reference_inflation_index: IndexType::new("CPI"),
            regeneration_concurrency: 4,
        }
    }
}

fn parse_reporting_currencies(raw: &str) -> Result<[CurrencyCode; 2], ConfigError> {
    let invalid = |detail: String| {
        ConfigError::InvalidValue("REPORTING_CURRENCIES".to_string(), detail)
    };

    let codes = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<CurrencyCode>().map_err(|e| invalid(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    match <[CurrencyCode; 2]>::try_from(codes) {
        Ok(pair) => Ok(pair),
        Err(codes) => Err(invalid(format!(
            "expected exactly two comma-separated codes, got {}",
            codes.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.fx_lookback_days, 10);
        assert_eq!(
            config.reporting_currencies,
            [CurrencyCode::new("USD"), CurrencyCode::new("ARS")]
        );
        assert_eq!(config.devaluation_pair.to_string(), "USD/ARS");
        assert_eq!(config.reference_inflation_index, IndexType::new("CPI"));
        assert_eq!(config.regeneration_concurrency, 4);
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_reporting_currencies_need_exactly_two() {
        let mut env_map = setup_required_env();
        env_map.insert("REPORTING_CURRENCIES".to_string(), "USD".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "REPORTING_CURRENCIES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_reporting_currencies_are_normalized() {
        let mut env_map = setup_required_env();
        env_map.insert("REPORTING_CURRENCIES".to_string(), " eur , usd ".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.reporting_currencies,
            [CurrencyCode::new("EUR"), CurrencyCode::new("USD")]
        );
    }

    #[test]
    fn test_invalid_devaluation_pair() {
        let mut env_map = setup_required_env();
        env_map.insert("DEVALUATION_PAIR".to_string(), "USDARS".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEVALUATION_PAIR"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("REGENERATION_CONCURRENCY".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "REGENERATION_CONCURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
