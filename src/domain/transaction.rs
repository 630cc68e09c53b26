//! Buy/sell transaction for one instrument, plus its stable ordering key.

use crate::domain::{CurrencyCode, Decimal, InstrumentId, Side, TransactionId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single trade against one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Storage identifier; also the tie-breaker for same-day ordering.
    pub id: TransactionId,
    pub instrument_id: InstrumentId,
    pub date: NaiveDate,
    pub side: Side,
    /// Units traded, strictly positive.
    pub quantity: Decimal,
    /// Price per unit.
    pub unit_price: Decimal,
    /// Total commission paid on this trade.
    pub commission: Decimal,
    pub currency: CurrencyCode,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TransactionId,
        instrument_id: InstrumentId,
        date: NaiveDate,
        side: Side,
        quantity: Decimal,
        unit_price: Decimal,
        commission: Decimal,
        currency: CurrencyCode,
    ) -> Self {
        Transaction {
            id,
            instrument_id,
            date,
            side,
            quantity,
            unit_price,
            commission,
            currency,
        }
    }

    pub fn ordering_key(&self) -> TransactionOrderingKey {
        TransactionOrderingKey {
            date: self.date,
            id: self.id,
        }
    }
}

/// Stable ordering key for transactions: date, then storage id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransactionOrderingKey {
    pub date: NaiveDate,
    pub id: TransactionId,
}

/// Sort transactions deterministically.
pub fn sort_transactions_deterministic(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|t| t.ordering_key());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tx(id: i64, day: u32) -> Transaction {
        Transaction::new(
            TransactionId::new(id),
            InstrumentId::new(1),
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            Side::Buy,
            Decimal::from_i64(1),
            Decimal::from_i64(100),
            Decimal::zero(),
            CurrencyCode::new("USD"),
        )
    }

    #[test]
    fn test_sort_by_date_then_id() {
        let mut txs = vec![make_tx(3, 2), make_tx(2, 1), make_tx(1, 2)];
        sort_transactions_deterministic(&mut txs);
        let ids: Vec<i64> = txs.iter().map(|t| t.id.as_i64()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_ordering_key_determinism() {
        let tx = make_tx(7, 5);
        assert_eq!(tx.ordering_key(), tx.ordering_key());
    }
}
