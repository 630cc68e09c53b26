//! Source-fact operations: the inputs every derived row is rebuilt from.

use crate::domain::{
    decide_upsert, Adjustment, Amortization, AmortizationStep, Contract, ContractId,
    FixedIncomeTerms, FxQuote, IndexCompounding, IndexPoint, IndexType, Instrument, InstrumentId,
    Source, Transaction, TransactionId, UpsertDecision,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{
    format_date, parse_column, parse_date, parse_decimal, parse_optional_decimal, Repository,
};

fn to_u32(value: i64, column: &str) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|_| {
        sqlx::Error::Decode(format!("{} out of range: {}", column, value).into())
    })
}

impl Repository {
    // =========================================================================
    // Instruments
    // =========================================================================

    /// Insert or update an instrument together with its amortization steps.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_instrument(&self, instrument: &Instrument) -> Result<(), sqlx::Error> {
        let (_gate, mut tx) = self.begin_write().await?;
        let terms = instrument.fixed_income.as_ref();

        sqlx::query(
            r#"
            INSERT INTO instruments
            (id, ticker, currency, face_value, emission_date, coupon_rate,
             payment_frequency_months, maturity_date, amortization_mode)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                ticker = excluded.ticker,
                currency = excluded.currency,
                face_value = excluded.face_value,
                emission_date = excluded.emission_date,
                coupon_rate = excluded.coupon_rate,
                payment_frequency_months = excluded.payment_frequency_months,
                maturity_date = excluded.maturity_date,
                amortization_mode = excluded.amortization_mode
            "#,
        )
        .bind(instrument.id.as_i64())
        .bind(&instrument.ticker)
        .bind(instrument.currency.as_str())
        .bind(terms.map(|t| t.face_value.to_canonical_string()))
        .bind(terms.map(|t| format_date(t.emission_date)))
        .bind(terms.map(|t| t.coupon_rate.to_canonical_string()))
        .bind(terms.map(|t| t.payment_frequency_months as i64))
        .bind(terms.map(|t| format_date(t.maturity_date)))
        .bind(terms.map(|t| t.amortization.mode_str()))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM amortization_steps WHERE instrument_id = ?")
            .bind(instrument.id.as_i64())
            .execute(&mut *tx)
            .await?;

        if let Some(Amortization::CustomSchedule(steps)) = terms.map(|t| &t.amortization) {
            for step in steps {
                sqlx::query(
                    r#"
                    INSERT INTO amortization_steps (instrument_id, step_date, percent_of_principal)
                    VALUES (?, ?, ?)
                    "#,
                )
                .bind(instrument.id.as_i64())
                .bind(format_date(step.date))
                .bind(step.percent_of_principal.to_canonical_string())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load one instrument with its terms.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn get_instrument(&self, id: InstrumentId) -> Result<Option<Instrument>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, ticker, currency, face_value, emission_date, coupon_rate,
                   payment_frequency_months, maturity_date, amortization_mode
            FROM instruments
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let face_value: Option<String> = row.get("face_value");
        let fixed_income = match face_value {
            None => None,
            Some(face_value) => {
                let mode: Option<String> = row.get("amortization_mode");
                let amortization = match mode.as_deref() {
                    Some("CUSTOM_SCHEDULE") => {
                        Amortization::CustomSchedule(self.query_amortization_steps(id).await?)
                    }
                    _ => Amortization::Bullet,
                };
                let emission: String = row.get("emission_date");
                let maturity: String = row.get("maturity_date");
                let coupon_rate: String = row.get("coupon_rate");
                Some(FixedIncomeTerms {
                    face_value: parse_decimal(&face_value, "face_value", id),
                    emission_date: parse_date(&emission)?,
                    coupon_rate: parse_decimal(&coupon_rate, "coupon_rate", id),
                    payment_frequency_months: to_u32(
                        row.get("payment_frequency_months"),
                        "payment_frequency_months",
                    )?,
                    maturity_date: parse_date(&maturity)?,
                    amortization,
                })
            }
        };

        let currency: String = row.get("currency");
        Ok(Some(Instrument {
            id,
            ticker: row.get("ticker"),
            currency: parse_column(&currency)?,
            fixed_income,
        }))
    }

    async fn query_amortization_steps(
        &self,
        id: InstrumentId,
    ) -> Result<Vec<AmortizationStep>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT step_date, percent_of_principal
            FROM amortization_steps
            WHERE instrument_id = ?
            ORDER BY step_date ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let date: String = row.get("step_date");
                let pct: String = row.get("percent_of_principal");
                Ok(AmortizationStep {
                    date: parse_date(&date)?,
                    percent_of_principal: parse_decimal(&pct, "percent_of_principal", id),
                })
            })
            .collect()
    }

    pub async fn list_instrument_ids(&self) -> Result<Vec<InstrumentId>, sqlx::Error> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM instruments ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| InstrumentId::new(id)).collect())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Insert or update a transaction.
    ///
    /// Returns the instrument the transaction belonged to before the write, so
    /// callers can rebuild both positions when a trade is moved.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<InstrumentId>, sqlx::Error> {
        let (_gate, mut tx) = self.begin_write().await?;

        let previous: Option<(i64,)> =
            sqlx::query_as("SELECT instrument_id FROM transactions WHERE id = ?")
                .bind(transaction.id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO transactions
            (id, instrument_id, trade_date, side, quantity, unit_price, commission, currency)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                instrument_id = excluded.instrument_id,
                trade_date = excluded.trade_date,
                side = excluded.side,
                quantity = excluded.quantity,
                unit_price = excluded.unit_price,
                commission = excluded.commission,
                currency = excluded.currency
            "#,
        )
        .bind(transaction.id.as_i64())
        .bind(transaction.instrument_id.as_i64())
        .bind(format_date(transaction.date))
        .bind(transaction.side.to_string())
        .bind(transaction.quantity.to_canonical_string())
        .bind(transaction.unit_price.to_canonical_string())
        .bind(transaction.commission.to_canonical_string())
        .bind(transaction.currency.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous.map(|(id,)| InstrumentId::new(id)))
    }

    /// Delete a transaction, returning the instrument it belonged to.
    pub async fn delete_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<InstrumentId>, sqlx::Error> {
        let _gate = self.write_gate.lock().await;
        let deleted: Option<(i64,)> =
            sqlx::query_as("DELETE FROM transactions WHERE id = ? RETURNING instrument_id")
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await?;
        Ok(deleted.map(|(id,)| InstrumentId::new(id)))
    }

    /// All transactions of one instrument in (date, id) order.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn list_transactions(
        &self,
        instrument_id: InstrumentId,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, instrument_id, trade_date, side, quantity, unit_price, commission, currency
            FROM transactions
            WHERE instrument_id = ?
            ORDER BY trade_date ASC, id ASC
            "#,
        )
        .bind(instrument_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    // =========================================================================
    // Contracts
    // =========================================================================

    /// Insert or update a rental contract.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn upsert_contract(&self, contract: &Contract) -> Result<(), sqlx::Error> {
        let (adjustment_type, rate, index_type, compounding) = match &contract.adjustment {
            Adjustment::FixedPercentage { rate } => {
                ("fixed_percentage", Some(rate.to_canonical_string()), None, None)
            }
            Adjustment::IndexLinked {
                index_type,
                compounding,
            } => (
                "index_linked",
                None,
                Some(index_type.as_str().to_string()),
                Some(compounding.as_str()),
            ),
        };

        let _gate = self.write_gate.lock().await;
        sqlx::query(
            r#"
            INSERT INTO contracts
            (id, name, start_month, duration_months, initial_rent, currency,
             adjustment_type, adjustment_rate, index_type, compounding, adjustment_frequency_months)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                start_month = excluded.start_month,
                duration_months = excluded.duration_months,
                initial_rent = excluded.initial_rent,
                currency = excluded.currency,
                adjustment_type = excluded.adjustment_type,
                adjustment_rate = excluded.adjustment_rate,
                index_type = excluded.index_type,
                compounding = excluded.compounding,
                adjustment_frequency_months = excluded.adjustment_frequency_months
            "#,
        )
        .bind(contract.id.as_i64())
        .bind(&contract.name)
        .bind(contract.start.to_string())
        .bind(contract.duration_months as i64)
        .bind(contract.initial_rent.to_canonical_string())
        .bind(contract.currency.as_str())
        .bind(adjustment_type)
        .bind(rate)
        .bind(index_type)
        .bind(compounding)
        .bind(contract.adjustment_frequency_months as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load one contract.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, start_month, duration_months, initial_rent, currency,
                   adjustment_type, adjustment_rate, index_type, compounding,
                   adjustment_frequency_months
            FROM contracts
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(contract_from_row).transpose()
    }

    pub async fn list_contract_ids(&self) -> Result<Vec<ContractId>, sqlx::Error> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM contracts ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| ContractId::new(id)).collect())
    }

    /// Contracts whose rows depend on `index_type`.
    ///
    /// With `include_fixed`, fixed-percentage contracts are included too: they
    /// read the reference inflation index for their accumulated-inflation column.
    pub async fn list_contract_ids_by_index(
        &self,
        index_type: &IndexType,
        include_fixed: bool,
    ) -> Result<Vec<ContractId>, sqlx::Error> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM contracts
            WHERE index_type = ? OR (? AND adjustment_type = 'fixed_percentage')
            ORDER BY id ASC
            "#,
        )
        .bind(index_type.as_str())
        .bind(include_fixed)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| ContractId::new(id)).collect())
    }

    // =========================================================================
    // Index points and FX quotes
    // =========================================================================

    /// Upsert an index print, keeping a manual print against a scraped one
    /// unless `force` is set.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_index_point(
        &self,
        point: &IndexPoint,
        force: bool,
    ) -> Result<UpsertDecision, sqlx::Error> {
        let (_gate, mut tx) = self.begin_write().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT source FROM index_points WHERE index_type = ? AND month = ?")
                .bind(point.index_type.as_str())
                .bind(point.month.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let existing = existing
            .map(|(source,)| parse_column::<Source>(&source))
            .transpose()?;

        let decision = decide_upsert(existing, point.source, force);
        if decision != UpsertDecision::KeepExisting {
            sqlx::query(
                r#"
                INSERT INTO index_points (index_type, month, value, interannual_value, source)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(index_type, month) DO UPDATE SET
                    value = excluded.value,
                    interannual_value = excluded.interannual_value,
                    source = excluded.source
                "#,
            )
            .bind(point.index_type.as_str())
            .bind(point.month.to_string())
            .bind(point.value.to_canonical_string())
            .bind(point.interannual_value.map(|v| v.to_canonical_string()))
            .bind(point.source.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(decision)
    }

    /// All prints of one index, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn list_index_points(
        &self,
        index_type: &IndexType,
    ) -> Result<Vec<IndexPoint>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT index_type, month, value, interannual_value, source
            FROM index_points
            WHERE index_type = ?
            ORDER BY month ASC
            "#,
        )
        .bind(index_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let month: String = row.get("month");
                let value: String = row.get("value");
                let source: String = row.get("source");
                let owner = format!("{}@{}", index_type, month);
                Ok(IndexPoint {
                    index_type: index_type.clone(),
                    month: parse_column(&month)?,
                    value: parse_decimal(&value, "value", &owner),
                    interannual_value: parse_optional_decimal(
                        row.get("interannual_value"),
                        "interannual_value",
                        &owner,
                    ),
                    source: parse_column(&source)?,
                })
            })
            .collect()
    }

    /// Upsert an FX quote under the same manual-over-scraped rule as index prints.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_fx_quote(
        &self,
        quote: &FxQuote,
        force: bool,
    ) -> Result<UpsertDecision, sqlx::Error> {
        let (_gate, mut tx) = self.begin_write().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT source FROM fx_quotes WHERE pair = ? AND quote_date = ?")
                .bind(quote.pair.to_string())
                .bind(format_date(quote.date))
                .fetch_optional(&mut *tx)
                .await?;
        let existing = existing
            .map(|(source,)| parse_column::<Source>(&source))
            .transpose()?;

        let decision = decide_upsert(existing, quote.source, force);
        if decision != UpsertDecision::KeepExisting {
            sqlx::query(
                r#"
                INSERT INTO fx_quotes (pair, quote_date, rate, source)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(pair, quote_date) DO UPDATE SET
                    rate = excluded.rate,
                    source = excluded.source
                "#,
            )
            .bind(quote.pair.to_string())
            .bind(format_date(quote.date))
            .bind(quote.rate.to_canonical_string())
            .bind(quote.source.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(decision)
    }

    /// Every stored FX quote; the resolver is always built from the full set.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn list_fx_quotes(&self) -> Result<Vec<FxQuote>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT pair, quote_date, rate, source
            FROM fx_quotes
            ORDER BY pair ASC, quote_date ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let pair: String = row.get("pair");
                let date: String = row.get("quote_date");
                let rate: String = row.get("rate");
                let source: String = row.get("source");
                Ok(FxQuote {
                    rate: parse_decimal(&rate, "rate", format!("{}@{}", pair, date)),
                    pair: parse_column(&pair)?,
                    date: parse_date(&date)?,
                    source: parse_column(&source)?,
                })
            })
            .collect()
    }
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, sqlx::Error> {
    let id = TransactionId::new(row.get("id"));
    let date: String = row.get("trade_date");
    let side: String = row.get("side");
    let quantity: String = row.get("quantity");
    let unit_price: String = row.get("unit_price");
    let commission: String = row.get("commission");
    let currency: String = row.get("currency");

    Ok(Transaction::new(
        id,
        InstrumentId::new(row.get("instrument_id")),
        parse_date(&date)?,
        parse_column(&side)?,
        parse_decimal(&quantity, "quantity", id),
        parse_decimal(&unit_price, "unit_price", id),
        parse_decimal(&commission, "commission", id),
        parse_column(&currency)?,
    ))
}

fn contract_from_row(row: &SqliteRow) -> Result<Contract, sqlx::Error> {
    let id = ContractId::new(row.get("id"));
    let adjustment_type: String = row.get("adjustment_type");
    let adjustment = match adjustment_type.as_str() {
        "fixed_percentage" => {
            let rate: Option<String> = row.get("adjustment_rate");
            Adjustment::FixedPercentage {
                rate: parse_decimal(rate.as_deref().unwrap_or(""), "adjustment_rate", id),
            }
        }
        "index_linked" => {
            let index_type: Option<String> = row.get("index_type");
            let compounding: Option<String> = row.get("compounding");
            Adjustment::IndexLinked {
                index_type: IndexType::new(index_type.as_deref().unwrap_or_default()),
                compounding: match compounding.as_deref() {
                    Some("compounded_window") => IndexCompounding::CompoundedWindow,
                    _ => IndexCompounding::PriorMonth,
                },
            }
        }
        other => {
            return Err(sqlx::Error::Decode(
                format!("unknown adjustment type {:?} for contract {}", other, id).into(),
            ))
        }
    };

    let start: String = row.get("start_month");
    let initial_rent: String = row.get("initial_rent");
    let currency: String = row.get("currency");

    Ok(Contract {
        id,
        name: row.get("name"),
        start: parse_column(&start)?,
        duration_months: to_u32(row.get("duration_months"), "duration_months")?,
        initial_rent: parse_decimal(&initial_rent, "initial_rent", id),
        currency: parse_column(&currency)?,
        adjustment,
        adjustment_frequency_months: to_u32(
            row.get("adjustment_frequency_months"),
            "adjustment_frequency_months",
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use crate::domain::{CurrencyCode, Decimal, Side, YearMonth};
    use chrono::NaiveDate;

    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn day(y: i32, m: u32, dd: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, dd).unwrap()
    }

    fn bond() -> Instrument {
        Instrument {
            id: InstrumentId::new(1),
            ticker: "GD30".to_string(),
            currency: CurrencyCode::new("USD"),
            fixed_income: Some(FixedIncomeTerms {
                face_value: d("1000"),
                emission_date: day(2024, 1, 1),
                coupon_rate: d("8"),
                payment_frequency_months: 6,
                maturity_date: day(2026, 1, 1),
                amortization: Amortization::CustomSchedule(vec![
                    AmortizationStep {
                        date: day(2025, 1, 1),
                        percent_of_principal: d("50"),
                    },
                    AmortizationStep {
                        date: day(2026, 1, 1),
                        percent_of_principal: d("50"),
                    },
                ]),
            }),
        }
    }

    #[tokio::test]
    async fn test_instrument_round_trip_with_custom_schedule() {
        let (repo, _temp) = setup_test_db().await;
        let instrument = bond();
        repo.upsert_instrument(&instrument).await.unwrap();

        let loaded = repo.get_instrument(instrument.id).await.unwrap();
        assert_eq!(loaded, Some(instrument));
    }

    #[tokio::test]
    async fn test_instrument_update_replaces_steps() {
        let (repo, _temp) = setup_test_db().await;
        let mut instrument = bond();
        repo.upsert_instrument(&instrument).await.unwrap();

        if let Some(terms) = instrument.fixed_income.as_mut() {
            terms.amortization = Amortization::Bullet;
        }
        repo.upsert_instrument(&instrument).await.unwrap();

        let loaded = repo.get_instrument(instrument.id).await.unwrap().unwrap();
        assert_eq!(
            loaded.fixed_income.unwrap().amortization,
            Amortization::Bullet
        );
    }

    #[tokio::test]
    async fn test_transactions_listed_in_date_then_id_order() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_instrument(&bond()).await.unwrap();

        for (id, dd) in [(3, 5), (1, 5), (2, 1)] {
            let tx = Transaction::new(
                TransactionId::new(id),
                InstrumentId::new(1),
                day(2024, 3, dd),
                Side::Buy,
                d("1"),
                d("100"),
                d("0"),
                CurrencyCode::new("USD"),
            );
            assert_eq!(repo.upsert_transaction(&tx).await.unwrap(), None);
        }

        let ids: Vec<i64> = repo
            .list_transactions(InstrumentId::new(1))
            .await
            .unwrap()
            .iter()
            .map(|t| t.id.as_i64())
            .collect();
        assert_eq!(ids, vec![2, 1, 3]);

        let owner = repo.delete_transaction(TransactionId::new(1)).await.unwrap();
        assert_eq!(owner, Some(InstrumentId::new(1)));
        assert_eq!(repo.delete_transaction(TransactionId::new(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_contract_round_trip_and_index_lookup() {
        let (repo, _temp) = setup_test_db().await;
        let linked = Contract {
            id: ContractId::new(1),
            name: "Local".to_string(),
            start: "2024-01".parse().unwrap(),
            duration_months: 24,
            initial_rent: d("350000"),
            currency: CurrencyCode::new("ARS"),
            adjustment: Adjustment::IndexLinked {
                index_type: IndexType::new("CPI"),
                compounding: IndexCompounding::CompoundedWindow,
            },
            adjustment_frequency_months: 4,
        };
        let fixed = Contract {
            id: ContractId::new(2),
            adjustment: Adjustment::FixedPercentage { rate: d("5") },
            ..linked.clone()
        };
        repo.upsert_contract(&linked).await.unwrap();
        repo.upsert_contract(&fixed).await.unwrap();

        assert_eq!(repo.get_contract(linked.id).await.unwrap(), Some(linked));
        assert_eq!(
            repo.list_contract_ids_by_index(&IndexType::new("CPI"), false)
                .await
                .unwrap(),
            vec![ContractId::new(1)]
        );
        assert_eq!(
            repo.list_contract_ids_by_index(&IndexType::new("CPI"), true)
                .await
                .unwrap(),
            vec![ContractId::new(1), ContractId::new(2)]
        );
    }

    #[tokio::test]
    async fn test_scraped_print_does_not_replace_manual_unless_forced() {
        let (repo, _temp) = setup_test_db().await;
        let month: YearMonth = "2024-03".parse().unwrap();
        let manual = IndexPoint {
            index_type: IndexType::new("CPI"),
            month,
            value: d("11"),
            interannual_value: None,
            source: Source::Manual,
        };
        let scraped = IndexPoint {
            value: d("11.5"),
            source: Source::Scraped,
            ..manual.clone()
        };

        assert_eq!(
            repo.upsert_index_point(&manual, false).await.unwrap(),
            UpsertDecision::Insert
        );
        assert_eq!(
            repo.upsert_index_point(&scraped, false).await.unwrap(),
            UpsertDecision::KeepExisting
        );
        let stored = repo.list_index_points(&manual.index_type).await.unwrap();
        assert_eq!(stored, vec![manual.clone()]);

        assert_eq!(
            repo.upsert_index_point(&scraped, true).await.unwrap(),
            UpsertDecision::Replace
        );
        let stored = repo.list_index_points(&manual.index_type).await.unwrap();
        assert_eq!(stored, vec![scraped]);
    }

    #[tokio::test]
    async fn test_fx_quotes_round_trip() {
        let (repo, _temp) = setup_test_db().await;
        let quote = FxQuote {
            pair: "USD/ARS".parse().unwrap(),
            date: day(2024, 3, 1),
            rate: d("850.5"),
            source: Source::Scraped,
        };
        repo.upsert_fx_quote(&quote, false).await.unwrap();
        assert_eq!(repo.list_fx_quotes().await.unwrap(), vec![quote]);
    }
}
