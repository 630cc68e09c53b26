//! Published index prints and FX quotes.

use crate::domain::{CurrencyPair, Decimal, IndexType, Source, YearMonth};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A monthly index print (e.g. CPI monthly variation, in percent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPoint {
    pub index_type: IndexType,
    /// Month the print refers to; stored as its first day.
    pub month: YearMonth,
    /// Monthly variation in percent.
    pub value: Decimal,
    /// Year-over-year variation in percent, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interannual_value: Option<Decimal>,
    pub source: Source,
}

/// A daily FX quote: units of `pair.quote` per unit of `pair.base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxQuote {
    pub pair: CurrencyPair,
    pub date: NaiveDate,
    pub rate: Decimal,
    pub source: Source,
}

/// Outcome of comparing an incoming fact against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertDecision {
    Insert,
    Replace,
    /// A scraped value tried to overwrite a manual one.
    KeepExisting,
}

/// Manual entries are never overwritten by scraped ones unless the operator
/// forces it.
pub fn decide_upsert(existing: Option<Source>, incoming: Source, force: bool) -> UpsertDecision {
    match (existing, incoming) {
        (None, _) => UpsertDecision::Insert,
        (Some(Source::Manual), Source::Scraped) if !force => UpsertDecision::KeepExisting,
        (Some(_), _) => UpsertDecision::Replace,
    }
}
