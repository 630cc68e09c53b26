//! Content fingerprints of derived row sets.
//!
//! A fingerprint is the SHA-256 of every stored column, each length-prefixed,
//! in row order. Two row sets with the same fingerprint persist identically.

use crate::engine::{CashflowRow, Lot, RealizedGainEvent, RentalCashflowRow};
use sha2::{Digest, Sha256};

#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(&mut self, data: &str) -> &mut Self {
        self.hasher.update((data.len() as u32).to_le_bytes());
        self.hasher.update(data.as_bytes());
        self
    }

    /// Separates sections so that moving a row between tables changes the hash.
    pub fn section(&mut self, name: &str, rows: usize) -> &mut Self {
        self.field(name).field(&rows.to_string())
    }

    pub fn lot(&mut self, lot: &Lot) -> &mut Self {
        self.field(&lot.buy_transaction_id.to_string())
            .field(&lot.acquired_on.to_string())
            .field(&lot.remaining_quantity.to_canonical_string())
            .field(&lot.unit_cost.to_canonical_string())
            .field(&lot.commission.to_canonical_string())
    }

    pub fn gain(&mut self, gain: &RealizedGainEvent) -> &mut Self {
        self.field(&gain.sell_transaction_id.to_string())
            .field(&gain.sell_date.to_string())
            .field(&gain.quantity.to_canonical_string())
            .field(&gain.buy_unit_cost.to_canonical_string())
            .field(&gain.sell_unit_price.to_canonical_string())
            .field(&gain.commission.to_canonical_string())
            .field(&gain.gain.to_canonical_string())
            .field(&gain.slices.len().to_string());
        for slice in &gain.slices {
            self.field(&slice.buy_transaction_id.to_string())
                .field(&slice.buy_date.to_string())
                .field(&slice.quantity.to_canonical_string())
                .field(&slice.unit_cost.to_canonical_string())
                .field(&slice.commission.to_canonical_string());
        }
        self
    }

    pub fn cashflow(&mut self, row: &CashflowRow) -> &mut Self {
        self.field(&row.date.to_string())
            .field(&row.amount.to_canonical_string())
            .field(row.currency.as_str())
            .field(row.kind.as_str())
            .field(&row.residual_capital.to_canonical_string())
    }

    pub fn rental(&mut self, row: &RentalCashflowRow) -> &mut Self {
        self.field(&row.month.to_string())
            .field(&row.rent.to_canonical_string())
            .field(row.currency.as_str())
            .field(&row.rent_reporting[0].to_canonical_string())
            .field(&row.rent_reporting[1].to_canonical_string())
            .field(&row.accumulated_inflation_pct.to_canonical_string())
            .field(&row.accumulated_devaluation_pct.to_canonical_string())
            .field(if row.provisional { "1" } else { "0" })
    }

    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Fingerprint of everything stored for one instrument.
pub fn instrument_fingerprint(
    lots: &[Lot],
    gains: &[RealizedGainEvent],
    cashflows: &[CashflowRow],
) -> String {
    let mut fp = Fingerprint::new();
    fp.section("lots", lots.len());
    for lot in lots {
        fp.lot(lot);
    }
    fp.section("gains", gains.len());
    for gain in gains {
        fp.gain(gain);
    }
    fp.section("cashflows", cashflows.len());
    for row in cashflows {
        fp.cashflow(row);
    }
    fp.finish()
}

/// Fingerprint of everything stored for one contract.
pub fn contract_fingerprint(rows: &[RentalCashflowRow]) -> String {
    let mut fp = Fingerprint::new();
    fp.section("rental", rows.len());
    for row in rows {
        fp.rental(row);
    }
    fp.finish()
}
