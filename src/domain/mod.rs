//! Domain types for the position and cashflow engine.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: entity ids, currencies, index types, Side, Source
//! - Calendar month arithmetic (YearMonth)
//! - Source facts: Transaction, Instrument, Contract, IndexPoint, FxQuote
//! - EntityKey naming the owner of a set of derived rows

pub mod contract;
pub mod decimal;
pub mod entity;
pub mod index;
pub mod instrument;
pub mod month;
pub mod primitives;
pub mod transaction;

pub use contract::{Adjustment, Contract, IndexCompounding};
pub use decimal::Decimal;
pub use entity::EntityKey;
pub use index::{decide_upsert, FxQuote, IndexPoint, UpsertDecision};
pub use instrument::{Amortization, AmortizationStep, FixedIncomeTerms, Instrument};
pub use month::YearMonth;
pub use primitives::{
    ContractId, CurrencyCode, CurrencyPair, IndexType, InstrumentId, PrimitiveParseError, Side,
    Source, TransactionId,
};
pub use transaction::{sort_transactions_deterministic, Transaction, TransactionOrderingKey};
