pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Contract, ContractId, CurrencyCode, CurrencyPair, Decimal, EntityKey, FxQuote, IndexPoint,
    IndexType, Instrument, InstrumentId, Side, Source, Transaction, TransactionId, YearMonth,
};
pub use error::AppError;
pub use orchestration::{BatchReport, Orchestrator, RegenerationScope};
