//! Fixed-income instrument terms.

use crate::domain::{CurrencyCode, Decimal, InstrumentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One partial principal repayment of a custom amortization schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationStep {
    pub date: NaiveDate,
    /// Percentage of the *original* principal repaid on `date`.
    pub percent_of_principal: Decimal,
}

/// How principal is repaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "steps", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Amortization {
    /// Whole principal at maturity.
    Bullet,
    /// Configured partial repayments; percentages must sum to 100.
    CustomSchedule(Vec<AmortizationStep>),
}

impl Amortization {
    pub fn mode_str(&self) -> &'static str {
        match self {
            Amortization::Bullet => "BULLET",
            Amortization::CustomSchedule(_) => "CUSTOM_SCHEDULE",
        }
    }
}

/// Contractual coupon and principal terms of a bond-like instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedIncomeTerms {
    /// Principal the generated schedule is expressed against.
    pub face_value: Decimal,
    pub emission_date: NaiveDate,
    /// Annual coupon rate in percent (8 means 8% a year).
    pub coupon_rate: Decimal,
    pub payment_frequency_months: u32,
    pub maturity_date: NaiveDate,
    pub amortization: Amortization,
}

/// A holding that can be traded. Equities, ETFs and crypto assets carry no
/// fixed-income terms and therefore no contractual schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: InstrumentId,
    pub ticker: String,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_income: Option<FixedIncomeTerms>,
}
