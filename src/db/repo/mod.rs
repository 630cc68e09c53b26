//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `facts.rs` - Instruments, transactions, contracts, index points, FX quotes
//! - `derived.rs` - Generation-tracked replacement and reads of derived rows

mod derived;
mod facts;

pub use derived::DerivedGeneration;

use crate::domain::Decimal;
use chrono::NaiveDate;
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::Transaction;
use std::fmt::Display;
use std::str::FromStr;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Storage format for calendar days.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
    /// SQLite admits a single writer, and a deferred transaction that read
    /// first gets `SQLITE_BUSY` instead of waiting when it tries to write.
    /// Every write transaction holds this gate for its whole lifetime.
    write_gate: Mutex<()>,
}

/// An open write transaction together with the gate it holds.
type WriteTx<'a> = (MutexGuard<'a, ()>, Transaction<'static, Sqlite>);

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            pool,
            write_gate: Mutex::new(()),
        }
    }

    /// Wait for the write gate, then open a transaction.
    ///
    /// Bind the result as `let (_gate, mut tx) = ...` so the gate outlives
    /// the commit.
    async fn begin_write(&self) -> Result<WriteTx<'_>, sqlx::Error> {
        let gate = self.write_gate.lock().await;
        let tx = self.pool.begin().await?;
        Ok((gate, tx))
    }

    /// Round-trip a trivial query; used by readiness checks.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Parse a stored enum-like or identifier column, failing the read on bad data.
fn parse_column<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Parse a stored decimal; corrupt values are logged and read as zero.
fn parse_decimal(raw: &str, column: &str, owner: impl Display) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(owner = %owner, column, value = %raw, error = %e, "Failed to parse stored decimal, using default");
        Decimal::default()
    })
}

fn parse_optional_decimal(raw: Option<String>, column: &str, owner: impl Display) -> Option<Decimal> {
    raw.map(|s| parse_decimal(&s, column, owner))
}
