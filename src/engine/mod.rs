//! Pure computation engines: FIFO matching, fixed-income schedules, indexed
//! rental schedules and exchange-rate resolution.
//!
//! Nothing in here touches storage. Every generator is a deterministic function
//! of its inputs and returns typed errors without attempting recovery.

use crate::domain::{ContractId, CurrencyCode, CurrencyPair, Decimal, InstrumentId, TransactionId, YearMonth};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod fifo;
pub mod fixed_income;
pub mod fx;
pub mod rental;

pub use fifo::{match_fifo, FifoMatcher, PositionSummary};
pub use fixed_income::{generate_fixed_income_schedule, scale_schedule};
pub use fx::{ExchangeRateResolver, DEFAULT_LOOKBACK_DAYS};
pub use rental::{generate_rental_schedule, IndexHistory, RentalContext};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("insufficient position in instrument {instrument} on {date}: selling {requested}, holding {available}")]
    InsufficientPosition {
        instrument: InstrumentId,
        date: NaiveDate,
        requested: Decimal,
        available: Decimal,
    },
    #[error("no exchange rate available for {pair}")]
    NoRateAvailable { pair: CurrencyPair },
    #[error("amortization schedule of instrument {instrument} sums to {total_percent}%, expected 100%")]
    InconsistentAmortizationSchedule {
        instrument: InstrumentId,
        total_percent: Decimal,
    },
    #[error("invalid terms: {0}")]
    InvalidTerms(String),
    #[error("invalid transaction {id}: {reason}")]
    InvalidTransaction { id: TransactionId, reason: String },
}

/// An open lot left after matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub buy_transaction_id: TransactionId,
    pub acquired_on: NaiveDate,
    pub remaining_quantity: Decimal,
    pub unit_cost: Decimal,
    /// Buy commission not yet attributed to a sale.
    pub commission: Decimal,
}

/// The part of one lot consumed by a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSlice {
    pub buy_transaction_id: TransactionId,
    pub buy_date: NaiveDate,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub commission: Decimal,
}

/// Realized result of one sale matched against the oldest open lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedGainEvent {
    pub sell_transaction_id: TransactionId,
    pub sell_date: NaiveDate,
    pub quantity: Decimal,
    /// Quantity-weighted average cost across `slices`.
    pub buy_unit_cost: Decimal,
    pub sell_unit_price: Decimal,
    /// Sell commission plus the pro-rata buy commission of the consumed lots.
    pub commission: Decimal,
    pub gain: Decimal,
    pub slices: Vec<LotSlice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashflowKind {
    Interest,
    Amortization,
}

impl CashflowKind {
    pub fn from_db(raw: &str) -> Option<Self> {
        match raw {
            "INTEREST" => Some(CashflowKind::Interest),
            "AMORTIZATION" => Some(CashflowKind::Amortization),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CashflowKind::Interest => "INTEREST",
            CashflowKind::Amortization => "AMORTIZATION",
        }
    }
}

/// One contractual payment of a fixed-income instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashflowRow {
    pub instrument_id: InstrumentId,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub kind: CashflowKind,
    /// Outstanding principal right after this event.
    pub residual_capital: Decimal,
}

/// One month of an indexed rental schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalCashflowRow {
    pub contract_id: ContractId,
    pub month: YearMonth,
    pub rent: Decimal,
    pub currency: CurrencyCode,
    /// Rent converted to the primary and secondary reporting currencies.
    pub rent_reporting: [Decimal; 2],
    pub accumulated_inflation_pct: Decimal,
    pub accumulated_devaluation_pct: Decimal,
    /// True while a print this row depends on has not been published yet.
    pub provisional: bool,
}

// Money columns are rounded to the cent when rows are stored. Quantities,
// unit prices and percentages keep full precision.

impl Lot {
    pub fn rounded(&self) -> Self {
        Self {
            commission: self.commission.round_money(),
            ..self.clone()
        }
    }
}

impl RealizedGainEvent {
    pub fn rounded(&self) -> Self {
        Self {
            commission: self.commission.round_money(),
            gain: self.gain.round_money(),
            slices: self
                .slices
                .iter()
                .map(|s| LotSlice {
                    commission: s.commission.round_money(),
                    ..s.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}

impl CashflowRow {
    pub fn rounded(&self) -> Self {
        Self {
            amount: self.amount.round_money(),
            residual_capital: self.residual_capital.round_money(),
            ..self.clone()
        }
    }
}

impl RentalCashflowRow {
    pub fn rounded(&self) -> Self {
        Self {
            rent: self.rent.round_money(),
            rent_reporting: self.rent_reporting.map(|amount| amount.round_money()),
            ..self.clone()
        }
    }
}
