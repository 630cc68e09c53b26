//! Schema setup and connection pragmas.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("schema.sql");

/// Open (creating if needed) the ledger database and bring its schema up.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { apply_pragmas(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    apply_schema(&pool).await?;

    info!(path = %db_path, "Ledger database ready");
    Ok(pool)
}

/// Every statement is `IF NOT EXISTS`, so this is safe to run on each start.
async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut applied = 0usize;
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
        applied += 1;
    }
    debug!(statements = applied, "Schema applied");
    Ok(())
}

async fn apply_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // Returns the mode actually in effect.
    let mode: String = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?
        .get(0);
    debug!(journal_mode = %mode, "SQLite connection opened");

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fresh_pool() -> (SqlitePool, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/ledger.db");
        let pool = init_db(path.to_str().unwrap()).await.expect("init_db failed");
        (pool, dir)
    }

    #[tokio::test]
    async fn test_creates_fact_and_derived_tables() {
        let (pool, _dir) = fresh_pool().await;

        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        for expected in [
            "instruments",
            "transactions",
            "contracts",
            "index_points",
            "fx_quotes",
            "derived_generations",
            "cashflow_rows",
            "open_lots",
            "realized_gains",
            "realized_gain_slices",
            "rental_cashflow_rows",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_schema_reapplies_cleanly() {
        let (pool, _dir) = fresh_pool().await;
        apply_schema(&pool).await.expect("second apply failed");
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let (pool, _dir) = fresh_pool().await;

        let result = sqlx::query(
            "INSERT INTO transactions (id, instrument_id, trade_date, side, quantity, unit_price, commission, currency)
             VALUES (1, 999, '2024-01-01', 'buy', '1', '1', '0', 'ARS')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "transaction for unknown instrument was accepted");
    }

    #[tokio::test]
    async fn test_side_check_constraint() {
        let (pool, _dir) = fresh_pool().await;
        sqlx::query("INSERT INTO instruments (id, ticker, currency) VALUES (1, 'AL30', 'USD')")
            .execute(&pool)
            .await
            .unwrap();

        let result = sqlx::query(
            "INSERT INTO transactions (id, instrument_id, trade_date, side, quantity, unit_price, commission, currency)
             VALUES (1, 1, '2024-01-01', 'short', '1', '1', '0', 'USD')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
