//! Derived-row operations.
//!
//! Every entity's derived rows are replaced as a unit: the new set is written
//! under the next generation number, older generations are deleted, and
//! `derived_generations` is updated, all in one transaction. Readers only see
//! rows of the current generation.

use crate::domain::{ContractId, EntityKey, InstrumentId, TransactionId};
use crate::engine::{CashflowKind, CashflowRow, Lot, LotSlice, RealizedGainEvent, RentalCashflowRow};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{format_date, parse_column, parse_date, parse_decimal, Repository};

/// Bookkeeping for the last successful replacement of an entity's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedGeneration {
    pub generation: i64,
    pub fingerprint: String,
    pub row_count: i64,
    pub regenerated_at: String,
}

impl Repository {
    /// Current generation record of an entity, if it was ever regenerated.
    pub async fn get_generation(
        &self,
        entity: EntityKey,
    ) -> Result<Option<DerivedGeneration>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT generation, fingerprint, row_count, regenerated_at
            FROM derived_generations
            WHERE entity_key = ?
            "#,
        )
        .bind(entity.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DerivedGeneration {
            generation: r.get("generation"),
            fingerprint: r.get("fingerprint"),
            row_count: r.get("row_count"),
            regenerated_at: r.get("regenerated_at"),
        }))
    }

    /// Replace an instrument's lots, realized gains and cashflow schedule.
    ///
    /// Rows are stored exactly as given; callers round them beforehand.
    /// Returns the new generation number.
    ///
    /// # Errors
    /// Returns an error if any statement fails; the previous rows stay in place.
    pub async fn replace_instrument_derived(
        &self,
        instrument_id: InstrumentId,
        fingerprint: &str,
        lots: &[Lot],
        gains: &[RealizedGainEvent],
        cashflows: &[CashflowRow],
        regenerated_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let entity = EntityKey::Instrument(instrument_id);
        let id = instrument_id.as_i64();
        let row_count = (lots.len() + gains.len() + cashflows.len()) as i64;

        let (_gate, mut tx) = self.begin_write().await?;
        let generation = next_generation(&mut tx, entity).await?;

        for (seq, lot) in lots.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO open_lots
                (instrument_id, generation, seq, buy_transaction_id, acquired_on,
                 remaining_quantity, unit_cost, commission)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(generation)
            .bind(seq as i64)
            .bind(lot.buy_transaction_id.as_i64())
            .bind(format_date(lot.acquired_on))
            .bind(lot.remaining_quantity.to_canonical_string())
            .bind(lot.unit_cost.to_canonical_string())
            .bind(lot.commission.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }

        for (seq, gain) in gains.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO realized_gains
                (instrument_id, generation, seq, sell_transaction_id, sell_date, quantity,
                 buy_unit_cost, sell_unit_price, commission, gain)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(generation)
            .bind(seq as i64)
            .bind(gain.sell_transaction_id.as_i64())
            .bind(format_date(gain.sell_date))
            .bind(gain.quantity.to_canonical_string())
            .bind(gain.buy_unit_cost.to_canonical_string())
            .bind(gain.sell_unit_price.to_canonical_string())
            .bind(gain.commission.to_canonical_string())
            .bind(gain.gain.to_canonical_string())
            .execute(&mut *tx)
            .await?;

            for (slice_seq, slice) in gain.slices.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO realized_gain_slices
                    (instrument_id, generation, gain_seq, slice_seq, buy_transaction_id,
                     buy_date, quantity, unit_cost, commission)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id)
                .bind(generation)
                .bind(seq as i64)
                .bind(slice_seq as i64)
                .bind(slice.buy_transaction_id.as_i64())
                .bind(format_date(slice.buy_date))
                .bind(slice.quantity.to_canonical_string())
                .bind(slice.unit_cost.to_canonical_string())
                .bind(slice.commission.to_canonical_string())
                .execute(&mut *tx)
                .await?;
            }
        }

        for (seq, row) in cashflows.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cashflow_rows
                (instrument_id, generation, seq, payment_date, amount, currency, kind, residual_capital)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(generation)
            .bind(seq as i64)
            .bind(format_date(row.date))
            .bind(row.amount.to_canonical_string())
            .bind(row.currency.as_str())
            .bind(row.kind.as_str())
            .bind(row.residual_capital.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }

        for table in [
            "open_lots",
            "realized_gains",
            "realized_gain_slices",
            "cashflow_rows",
        ] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE instrument_id = ? AND generation < ?",
                table
            ))
            .bind(id)
            .bind(generation)
            .execute(&mut *tx)
            .await?;
        }

        record_generation(
            &mut tx,
            entity,
            generation,
            fingerprint,
            row_count,
            regenerated_at,
        )
        .await?;

        tx.commit().await?;
        Ok(generation)
    }

    /// Replace a contract's rental rows. Returns the new generation number.
    ///
    /// # Errors
    /// Returns an error if any statement fails; the previous rows stay in place.
    pub async fn replace_contract_derived(
        &self,
        contract_id: ContractId,
        fingerprint: &str,
        rows: &[RentalCashflowRow],
        regenerated_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let entity = EntityKey::Contract(contract_id);
        let id = contract_id.as_i64();

        let (_gate, mut tx) = self.begin_write().await?;
        let generation = next_generation(&mut tx, entity).await?;

        for row in rows {
            let [primary, secondary] = &row.rent_reporting;
            sqlx::query(
                r#"
                INSERT INTO rental_cashflow_rows
                (contract_id, generation, month, rent, currency, rent_primary, rent_secondary,
                 accumulated_inflation_pct, accumulated_devaluation_pct, provisional)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(generation)
            .bind(row.month.to_string())
            .bind(row.rent.to_canonical_string())
            .bind(row.currency.as_str())
            .bind(primary.to_canonical_string())
            .bind(secondary.to_canonical_string())
            .bind(row.accumulated_inflation_pct.to_canonical_string())
            .bind(row.accumulated_devaluation_pct.to_canonical_string())
            .bind(row.provisional)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM rental_cashflow_rows WHERE contract_id = ? AND generation < ?")
            .bind(id)
            .bind(generation)
            .execute(&mut *tx)
            .await?;

        record_generation(
            &mut tx,
            entity,
            generation,
            fingerprint,
            rows.len() as i64,
            regenerated_at,
        )
        .await?;

        tx.commit().await?;
        Ok(generation)
    }

    /// Current fixed-income schedule of an instrument, in payment order.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn query_cashflows(
        &self,
        instrument_id: InstrumentId,
    ) -> Result<Vec<CashflowRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT c.payment_date, c.amount, c.currency, c.kind, c.residual_capital
            FROM cashflow_rows c
            JOIN derived_generations g
              ON g.entity_key = ? AND g.generation = c.generation
            WHERE c.instrument_id = ?
            ORDER BY c.seq ASC
            "#,
        )
        .bind(EntityKey::Instrument(instrument_id).to_string())
        .bind(instrument_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let date: String = row.get("payment_date");
                let amount: String = row.get("amount");
                let currency: String = row.get("currency");
                let kind: String = row.get("kind");
                let residual: String = row.get("residual_capital");
                Ok(CashflowRow {
                    instrument_id,
                    date: parse_date(&date)?,
                    amount: parse_decimal(&amount, "amount", instrument_id),
                    currency: parse_column(&currency)?,
                    kind: CashflowKind::from_db(&kind).ok_or_else(|| {
                        sqlx::Error::Decode(format!("unknown cashflow kind {:?}", kind).into())
                    })?,
                    residual_capital: parse_decimal(&residual, "residual_capital", instrument_id),
                })
            })
            .collect()
    }

    /// Current open lots of an instrument, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn query_open_lots(&self, instrument_id: InstrumentId) -> Result<Vec<Lot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT l.buy_transaction_id, l.acquired_on, l.remaining_quantity, l.unit_cost, l.commission
            FROM open_lots l
            JOIN derived_generations g
              ON g.entity_key = ? AND g.generation = l.generation
            WHERE l.instrument_id = ?
            ORDER BY l.seq ASC
            "#,
        )
        .bind(EntityKey::Instrument(instrument_id).to_string())
        .bind(instrument_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let acquired_on: String = row.get("acquired_on");
                let remaining: String = row.get("remaining_quantity");
                let unit_cost: String = row.get("unit_cost");
                let commission: String = row.get("commission");
                Ok(Lot {
                    buy_transaction_id: TransactionId::new(row.get("buy_transaction_id")),
                    acquired_on: parse_date(&acquired_on)?,
                    remaining_quantity: parse_decimal(&remaining, "remaining_quantity", instrument_id),
                    unit_cost: parse_decimal(&unit_cost, "unit_cost", instrument_id),
                    commission: parse_decimal(&commission, "commission", instrument_id),
                })
            })
            .collect()
    }

    /// Current realized-gain events of an instrument with their lot slices.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn query_realized_gains(
        &self,
        instrument_id: InstrumentId,
    ) -> Result<Vec<RealizedGainEvent>, sqlx::Error> {
        let key = EntityKey::Instrument(instrument_id).to_string();

        let slice_rows = sqlx::query(
            r#"
            SELECT s.gain_seq, s.buy_transaction_id, s.buy_date, s.quantity, s.unit_cost, s.commission
            FROM realized_gain_slices s
            JOIN derived_generations g
              ON g.entity_key = ? AND g.generation = s.generation
            WHERE s.instrument_id = ?
            ORDER BY s.gain_seq ASC, s.slice_seq ASC
            "#,
        )
        .bind(&key)
        .bind(instrument_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let mut slices: Vec<(i64, LotSlice)> = Vec::with_capacity(slice_rows.len());
        for row in &slice_rows {
            slices.push((row.get("gain_seq"), slice_from_row(row, instrument_id)?));
        }

        let rows = sqlx::query(
            r#"
            SELECT r.seq, r.sell_transaction_id, r.sell_date, r.quantity, r.buy_unit_cost,
                   r.sell_unit_price, r.commission, r.gain
            FROM realized_gains r
            JOIN derived_generations g
              ON g.entity_key = ? AND g.generation = r.generation
            WHERE r.instrument_id = ?
            ORDER BY r.seq ASC
            "#,
        )
        .bind(&key)
        .bind(instrument_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let seq: i64 = row.get("seq");
                let sell_date: String = row.get("sell_date");
                let quantity: String = row.get("quantity");
                let buy_unit_cost: String = row.get("buy_unit_cost");
                let sell_unit_price: String = row.get("sell_unit_price");
                let commission: String = row.get("commission");
                let gain: String = row.get("gain");
                Ok(RealizedGainEvent {
                    sell_transaction_id: TransactionId::new(row.get("sell_transaction_id")),
                    sell_date: parse_date(&sell_date)?,
                    quantity: parse_decimal(&quantity, "quantity", instrument_id),
                    buy_unit_cost: parse_decimal(&buy_unit_cost, "buy_unit_cost", instrument_id),
                    sell_unit_price: parse_decimal(&sell_unit_price, "sell_unit_price", instrument_id),
                    commission: parse_decimal(&commission, "commission", instrument_id),
                    gain: parse_decimal(&gain, "gain", instrument_id),
                    slices: slices
                        .iter()
                        .filter(|(gain_seq, _)| *gain_seq == seq)
                        .map(|(_, slice)| slice.clone())
                        .collect(),
                })
            })
            .collect()
    }

    /// Current rental rows of a contract, by month.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn query_rental_rows(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<RentalCashflowRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT r.month, r.rent, r.currency, r.rent_primary, r.rent_secondary,
                   r.accumulated_inflation_pct, r.accumulated_devaluation_pct, r.provisional
            FROM rental_cashflow_rows r
            JOIN derived_generations g
              ON g.entity_key = ? AND g.generation = r.generation
            WHERE r.contract_id = ?
            ORDER BY r.month ASC
            "#,
        )
        .bind(EntityKey::Contract(contract_id).to_string())
        .bind(contract_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let month: String = row.get("month");
                let rent: String = row.get("rent");
                let currency: String = row.get("currency");
                let primary: String = row.get("rent_primary");
                let secondary: String = row.get("rent_secondary");
                let inflation: String = row.get("accumulated_inflation_pct");
                let devaluation: String = row.get("accumulated_devaluation_pct");
                Ok(RentalCashflowRow {
                    contract_id,
                    month: parse_column(&month)?,
                    rent: parse_decimal(&rent, "rent", contract_id),
                    currency: parse_column(&currency)?,
                    rent_reporting: [
                        parse_decimal(&primary, "rent_primary", contract_id),
                        parse_decimal(&secondary, "rent_secondary", contract_id),
                    ],
                    accumulated_inflation_pct: parse_decimal(
                        &inflation,
                        "accumulated_inflation_pct",
                        contract_id,
                    ),
                    accumulated_devaluation_pct: parse_decimal(
                        &devaluation,
                        "accumulated_devaluation_pct",
                        contract_id,
                    ),
                    provisional: row.get::<bool, _>("provisional"),
                })
            })
            .collect()
    }
}

async fn next_generation(
    conn: &mut SqliteConnection,
    entity: EntityKey,
) -> Result<i64, sqlx::Error> {
    let current: Option<(i64,)> =
        sqlx::query_as("SELECT generation FROM derived_generations WHERE entity_key = ?")
            .bind(entity.to_string())
            .fetch_optional(&mut *conn)
            .await?;
    Ok(current.map_or(1, |(generation,)| generation + 1))
}

async fn record_generation(
    conn: &mut SqliteConnection,
    entity: EntityKey,
    generation: i64,
    fingerprint: &str,
    row_count: i64,
    regenerated_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO derived_generations (entity_key, generation, fingerprint, row_count, regenerated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(entity_key) DO UPDATE SET
            generation = excluded.generation,
            fingerprint = excluded.fingerprint,
            row_count = excluded.row_count,
            regenerated_at = excluded.regenerated_at
        "#,
    )
    .bind(entity.to_string())
    .bind(generation)
    .bind(fingerprint)
    .bind(row_count)
    .bind(regenerated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn slice_from_row(row: &SqliteRow, instrument_id: InstrumentId) -> Result<LotSlice, sqlx::Error> {
    let buy_date: String = row.get("buy_date");
    let quantity: String = row.get("quantity");
    let unit_cost: String = row.get("unit_cost");
    let commission: String = row.get("commission");
    Ok(LotSlice {
        buy_transaction_id: TransactionId::new(row.get("buy_transaction_id")),
        buy_date: parse_date(&buy_date)?,
        quantity: parse_decimal(&quantity, "quantity", instrument_id),
        unit_cost: parse_decimal(&unit_cost, "unit_cost", instrument_id),
        commission: parse_decimal(&commission, "commission", instrument_id),
    })
}
