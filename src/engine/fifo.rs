use crate::domain::{sort_transactions_deterministic, CurrencyCode, Decimal, Side, Transaction};
use serde::Serialize;
use std::collections::VecDeque;

use super::{EngineError, Lot, LotSlice, RealizedGainEvent};

/// FIFO matcher for the transactions of one instrument.
///
/// Callers feed transactions in (date, id) order; [`match_fifo`] does the
/// sorting for a whole history.
pub struct FifoMatcher {
    lots: VecDeque<Lot>,
    currency: Option<CurrencyCode>,

    // Outputs accumulated during processing.
    realized: Vec<RealizedGainEvent>,
}

impl FifoMatcher {
    pub fn new() -> Self {
        Self {
            lots: VecDeque::new(),
            currency: None,
            realized: Vec::new(),
        }
    }

    /// Quantity currently held across open lots.
    pub fn held_quantity(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.remaining_quantity).sum()
    }

    /// Apply one transaction.
    ///
    /// # Errors
    /// `InvalidTransaction` for malformed input, `InsufficientPosition` when a
    /// sale exceeds the held quantity. The matcher state is unchanged on error.
    pub fn process(&mut self, tx: &Transaction) -> Result<(), EngineError> {
        self.validate(tx)?;
        match tx.side {
            Side::Buy => self.handle_buy(tx),
            Side::Sell => self.handle_sell(tx)?,
        }
        if self.currency.is_none() {
            self.currency = Some(tx.currency.clone());
        }
        Ok(())
    }

    fn validate(&self, tx: &Transaction) -> Result<(), EngineError> {
        let invalid = |reason: String| EngineError::InvalidTransaction { id: tx.id, reason };

        if !tx.quantity.is_positive() {
            return Err(invalid(format!("quantity must be > 0, got {}", tx.quantity)));
        }
        if tx.unit_price.is_negative() {
            return Err(invalid(format!("unit price must be >= 0, got {}", tx.unit_price)));
        }
        if tx.commission.is_negative() {
            return Err(invalid(format!("commission must be >= 0, got {}", tx.commission)));
        }
        if let Some(currency) = &self.currency {
            if *currency != tx.currency {
                return Err(invalid(format!(
                    "currency {} differs from position currency {}",
                    tx.currency, currency
                )));
            }
        }
        Ok(())
    }

    fn handle_buy(&mut self, tx: &Transaction) {
        self.lots.push_back(Lot {
            buy_transaction_id: tx.id,
            acquired_on: tx.date,
            remaining_quantity: tx.quantity,
            unit_cost: tx.unit_price,
            commission: tx.commission,
        });
    }

    fn handle_sell(&mut self, tx: &Transaction) -> Result<(), EngineError> {
        let available = self.held_quantity();
        if tx.quantity > available {
            return Err(EngineError::InsufficientPosition {
                instrument: tx.instrument_id,
                date: tx.date,
                requested: tx.quantity,
                available,
            });
        }

        let mut to_sell = tx.quantity;
        let mut slices = Vec::new();

        while to_sell.is_positive() {
            let Some(lot) = self.lots.front_mut() else {
                break;
            };

            let take = to_sell.min(lot.remaining_quantity);
            let commission_share = if take == lot.remaining_quantity {
                lot.commission
            } else {
                lot.commission * take / lot.remaining_quantity
            };

            slices.push(LotSlice {
                buy_transaction_id: lot.buy_transaction_id,
                buy_date: lot.acquired_on,
                quantity: take,
                unit_cost: lot.unit_cost,
                commission: commission_share,
            });

            lot.remaining_quantity -= take;
            lot.commission -= commission_share;
            to_sell -= take;

            if lot.remaining_quantity.is_zero() {
                self.lots.pop_front();
            }
        }

        let cost: Decimal = slices.iter().map(|s| s.quantity * s.unit_cost).sum();
        let buy_commission: Decimal = slices.iter().map(|s| s.commission).sum();
        let buy_unit_cost = cost / tx.quantity;
        let commission = tx.commission + buy_commission;
        // Same as (sell price - weighted buy cost) * quantity - commission, without
        // the rounding introduced by the division above.
        let gain = tx.unit_price * tx.quantity - cost - commission;

        self.realized.push(RealizedGainEvent {
            sell_transaction_id: tx.id,
            sell_date: tx.date,
            quantity: tx.quantity,
            buy_unit_cost,
            sell_unit_price: tx.unit_price,
            commission,
            gain,
            slices,
        });
        Ok(())
    }

    /// Get the accumulated outputs.
    pub fn into_outputs(self) -> (Vec<Lot>, Vec<RealizedGainEvent>) {
        (self.lots.into_iter().collect(), self.realized)
    }
}

impl Default for FifoMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Match a full transaction history of one instrument.
///
/// The result is a pure function of the input: lots are rebuilt from scratch
/// on every call.
pub fn match_fifo(
    transactions: &[Transaction],
) -> Result<(Vec<Lot>, Vec<RealizedGainEvent>), EngineError> {
    let mut ordered = transactions.to_vec();
    sort_transactions_deterministic(&mut ordered);

    let mut matcher = FifoMatcher::new();
    for tx in &ordered {
        matcher.process(tx)?;
    }
    Ok(matcher.into_outputs())
}

/// Aggregate view of a position after matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    pub quantity: Decimal,
    /// Remaining purchase cost including carried buy commission.
    pub cost_basis: Decimal,
    pub realized_gain: Decimal,
}

/// Position valued at a market price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionValuation {
    pub price: Decimal,
    pub market_value: Decimal,
    pub unrealized_gain: Decimal,
}

impl PositionSummary {
    pub fn from_outputs(lots: &[Lot], realized: &[RealizedGainEvent]) -> Self {
        Self {
            quantity: lots.iter().map(|l| l.remaining_quantity).sum(),
            cost_basis: lots
                .iter()
                .map(|l| l.remaining_quantity * l.unit_cost + l.commission)
                .sum(),
            realized_gain: realized.iter().map(|g| g.gain).sum(),
        }
    }

    /// Average cost per held unit, `None` when flat.
    pub fn average_cost(&self) -> Option<Decimal> {
        self.cost_basis.checked_div(self.quantity)
    }

    pub fn at_price(&self, price: Decimal) -> PositionValuation {
        let market_value = self.quantity * price;
        PositionValuation {
            price,
            market_value,
            unrealized_gain: market_value - self.cost_basis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstrumentId, TransactionId};
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn tx(id: i64, day: u32, side: Side, qty: &str, px: &str, fee: &str) -> Transaction {
        Transaction::new(
            TransactionId::new(id),
            InstrumentId::new(1),
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            side,
            d(qty),
            d(px),
            d(fee),
            CurrencyCode::new("USD"),
        )
    }

    #[test]
    fn test_partial_sell_splits_lot_and_carries_commission() {
        let (lots, gains) = match_fifo(&[
            tx(1, 1, Side::Buy, "10", "100", "5"),
            tx(2, 10, Side::Sell, "4", "120", "2"),
        ])
        .unwrap();

        assert_eq!(gains.len(), 1);
        assert_eq!(gains[0].gain, d("76"));
        assert_eq!(gains[0].commission, d("4"));
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].remaining_quantity, d("6"));
        assert_eq!(lots[0].unit_cost, d("100"));
        assert_eq!(lots[0].commission, d("3"));
    }

    #[test]
    fn test_sell_across_lots_weights_buy_cost() {
        let (lots, gains) = match_fifo(&[
            tx(1, 1, Side::Buy, "2", "10", "0"),
            tx(2, 2, Side::Buy, "2", "20", "0"),
            tx(3, 3, Side::Sell, "3", "30", "0"),
        ])
        .unwrap();

        let gain = &gains[0];
        assert_eq!(gain.slices.len(), 2);
        assert_eq!(gain.slices[0].quantity, d("2"));
        assert_eq!(gain.slices[1].quantity, d("1"));
        // (2*10 + 1*20) / 3
        assert_eq!(gain.buy_unit_cost.round_money(), d("13.33"));
        assert_eq!(gain.gain, d("50"));
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].unit_cost, d("20"));
        assert_eq!(lots[0].remaining_quantity, d("1"));
    }

    #[test]
    fn test_oversell_is_rejected() {
        let err = match_fifo(&[
            tx(1, 1, Side::Buy, "1", "10", "0"),
            tx(2, 2, Side::Sell, "2", "10", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientPosition { .. }));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = tx(1, 1, Side::Buy, "5", "10", "1");
        let b = tx(2, 3, Side::Sell, "2", "15", "1");
        let c = tx(3, 2, Side::Buy, "5", "12", "1");
        let forward = match_fifo(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let shuffled = match_fifo(&[c, b, a]).unwrap();
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let err = match_fifo(&[tx(1, 1, Side::Buy, "0", "10", "0")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransaction { .. }));
    }

    #[test]
    fn test_mixed_currency_rejected() {
        let mut eur = tx(2, 2, Side::Buy, "1", "10", "0");
        eur.currency = CurrencyCode::new("EUR");
        let err = match_fifo(&[tx(1, 1, Side::Buy, "1", "10", "0"), eur]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransaction { .. }));
    }

    #[test]
    fn test_summary_unrealized_gain() {
        let (lots, gains) = match_fifo(&[
            tx(1, 1, Side::Buy, "10", "100", "5"),
            tx(2, 10, Side::Sell, "4", "120", "2"),
        ])
        .unwrap();
        let summary = PositionSummary::from_outputs(&lots, &gains);
        assert_eq!(summary.quantity, d("6"));
        assert_eq!(summary.cost_basis, d("603"));
        assert_eq!(summary.realized_gain, d("76"));

        let valuation = summary.at_price(d("110"));
        assert_eq!(valuation.market_value, d("660"));
        assert_eq!(valuation.unrealized_gain, d("57"));
    }
}
