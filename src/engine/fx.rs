use crate::domain::{CurrencyCode, CurrencyPair, Decimal, FxQuote};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::EngineError;

/// Look-back window used when no same-day quote exists.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;

/// How a rate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateFallback {
    Identity,
    Exact,
    LookBack,
    /// Look-back window exhausted; globally latest quote used.
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRate {
    pub rate: Decimal,
    /// Date of the quote actually used, `None` for identity pairs.
    pub quoted_on: Option<NaiveDate>,
    pub fallback: RateFallback,
    /// True when the inverse pair's series was used.
    pub inverted: bool,
}

/// Resolves historical exchange rates from an explicit quote set.
///
/// There is no notion of a "current" rate: every lookup names its as-of date.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRateResolver {
    series: HashMap<CurrencyPair, BTreeMap<NaiveDate, Decimal>>,
    lookback_days: u32,
}

impl ExchangeRateResolver {
    pub fn new(quotes: impl IntoIterator<Item = FxQuote>, lookback_days: u32) -> Self {
        let mut resolver = Self {
            series: HashMap::new(),
            lookback_days,
        };
        for quote in quotes {
            resolver.insert(quote);
        }
        resolver
    }

    /// Add or replace one quote. Non-positive rates are dropped.
    pub fn insert(&mut self, quote: FxQuote) {
        if !quote.rate.is_positive() {
            warn!(pair = %quote.pair, date = %quote.date, rate = %quote.rate, "Ignoring non-positive FX quote");
            return;
        }
        self.series
            .entry(quote.pair)
            .or_default()
            .insert(quote.date, quote.rate);
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    /// Best-known rate for `pair` as of `date`.
    ///
    /// # Errors
    /// `NoRateAvailable` only when neither the pair nor its inverse has any quote.
    pub fn rate(&self, date: NaiveDate, pair: &CurrencyPair) -> Result<Decimal, EngineError> {
        self.resolve(date, pair).map(|r| r.rate)
    }

    /// Like [`rate`](Self::rate), reporting which quote was used.
    pub fn resolve(&self, date: NaiveDate, pair: &CurrencyPair) -> Result<ResolvedRate, EngineError> {
        if pair.is_identity() {
            return Ok(ResolvedRate {
                rate: Decimal::one(),
                quoted_on: None,
                fallback: RateFallback::Identity,
                inverted: false,
            });
        }

        if let Some(history) = self.series.get(pair) {
            if let Some((quoted_on, rate, fallback)) = self.lookup(history, date) {
                return Ok(ResolvedRate {
                    rate,
                    quoted_on: Some(quoted_on),
                    fallback,
                    inverted: false,
                });
            }
        }

        if let Some(history) = self.series.get(&pair.inverse()) {
            if let Some((quoted_on, rate, fallback)) = self.lookup(history, date) {
                if let Some(inverse) = Decimal::one().checked_div(rate) {
                    return Ok(ResolvedRate {
                        rate: inverse,
                        quoted_on: Some(quoted_on),
                        fallback,
                        inverted: true,
                    });
                }
            }
        }

        Err(EngineError::NoRateAvailable { pair: pair.clone() })
    }

    /// Convert `amount` from one currency to another at the rate as of `date`.
    ///
    /// Full precision is kept; rounding happens where amounts are persisted.
    pub fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Decimal, EngineError> {
        let pair = CurrencyPair::new(from.clone(), to.clone());
        Ok(amount * self.rate(date, &pair)?)
    }

    fn lookup(
        &self,
        history: &BTreeMap<NaiveDate, Decimal>,
        date: NaiveDate,
    ) -> Option<(NaiveDate, Decimal, RateFallback)> {
        if let Some(rate) = history.get(&date) {
            return Some((date, *rate, RateFallback::Exact));
        }

        let window_start = date
            .checked_sub_days(Days::new(self.lookback_days as u64))
            .unwrap_or(NaiveDate::MIN);
        if let Some((quoted_on, rate)) = history.range(window_start..date).next_back() {
            return Some((*quoted_on, *rate, RateFallback::LookBack));
        }

        history
            .last_key_value()
            .map(|(quoted_on, rate)| (*quoted_on, *rate, RateFallback::Latest))
    }
}
