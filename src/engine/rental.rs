//! Indexed rental schedule generation.
//!
//! Index prints are published with a one-month lag: the print usable in month
//! `m` is the one for `m - 1`. Both rent adjustments and the accumulated
//! inflation column follow that rule.

use crate::domain::{
    Adjustment, Contract, CurrencyCode, CurrencyPair, Decimal, IndexCompounding, IndexPoint,
    IndexType, YearMonth,
};
use std::collections::BTreeMap;

use super::{EngineError, ExchangeRateResolver, RentalCashflowRow};

/// Monthly prints of a single index series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexHistory {
    prints: BTreeMap<YearMonth, Decimal>,
}

impl IndexHistory {
    /// Build from stored points, keeping only `index_type`.
    pub fn from_points<'a>(
        index_type: &IndexType,
        points: impl IntoIterator<Item = &'a IndexPoint>,
    ) -> Self {
        let prints = points
            .into_iter()
            .filter(|p| &p.index_type == index_type)
            .map(|p| (p.month, p.value))
            .collect();
        Self { prints }
    }

    pub fn from_prints(prints: impl IntoIterator<Item = (YearMonth, Decimal)>) -> Self {
        Self {
            prints: prints.into_iter().collect(),
        }
    }

    pub fn get(&self, month: YearMonth) -> Option<Decimal> {
        self.prints.get(&month).copied()
    }

    /// Month of the most recent print.
    pub fn latest_month(&self) -> Option<YearMonth> {
        self.prints.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.prints.is_empty()
    }
}

/// Everything besides the contract and its index needed to build rows.
#[derive(Debug, Clone, Copy)]
pub struct RentalContext<'a> {
    pub resolver: &'a ExchangeRateResolver,
    /// Primary and secondary reporting currencies.
    pub reporting_currencies: &'a [CurrencyCode; 2],
    /// FX pair whose change since contract start is reported as devaluation.
    pub devaluation_pair: &'a CurrencyPair,
}

/// Product of the lagged prints feeding month `month`, and whether any was missing.
struct LaggedFactor {
    factor: Decimal,
    missing: bool,
}

impl LaggedFactor {
    fn over(history: &IndexHistory, months: impl Iterator<Item = YearMonth>) -> Self {
        let mut factor = Decimal::one();
        let mut missing = false;
        for month in months {
            match history.get(month) {
                Some(print) => factor = factor * print.percent_factor(),
                None => missing = true,
            }
        }
        Self { factor, missing }
    }
}

/// Generate one row per covered month of `contract`.
///
/// `history` is the contract's own index for index-linked contracts, and the
/// reference inflation index otherwise; it only feeds the accumulated-inflation
/// column for fixed-percentage contracts. Months whose prints are not published
/// yet are projected at 0% and flagged provisional, as is every later month.
///
/// # Errors
/// `InvalidTerms` for a zero duration or frequency, `NoRateAvailable` when a
/// reporting conversion or the devaluation pair has no quote at all.
pub fn generate_rental_schedule(
    contract: &Contract,
    history: &IndexHistory,
    ctx: RentalContext<'_>,
) -> Result<Vec<RentalCashflowRow>, EngineError> {
    validate_contract(contract)?;

    let frequency = contract.adjustment_frequency_months;
    let start_fx = ctx
        .resolver
        .rate(contract.start.first_day(), ctx.devaluation_pair)?;

    let mut rent = contract.initial_rent;
    let mut inflation_factor = Decimal::one();
    let mut provisional = false;
    let mut rows = Vec::with_capacity(contract.duration_months as usize);

    for (offset, month) in contract.covered_months().enumerate() {
        if offset > 0 {
            let monthly = LaggedFactor::over(history, std::iter::once(month.previous()));
            inflation_factor = inflation_factor * monthly.factor;
            provisional |= monthly.missing;

            if offset as u32 % frequency == 0 {
                let step = adjustment_factor(&contract.adjustment, history, month, frequency);
                rent = rent * step.factor;
                provisional |= step.missing;
            }
        }

        let date = month.first_day();
        let mut rent_reporting = [Decimal::zero(); 2];
        for (slot, currency) in rent_reporting.iter_mut().zip(ctx.reporting_currencies) {
            *slot = ctx.resolver.convert(rent, &contract.currency, currency, date)?;
        }

        let fx = ctx.resolver.rate(date, ctx.devaluation_pair)?;
        let devaluation = fx
            .checked_div(start_fx)
            .map(|ratio| ratio.factor_to_percent())
            .unwrap_or_default();

        rows.push(RentalCashflowRow {
            contract_id: contract.id,
            month,
            rent,
            currency: contract.currency.clone(),
            rent_reporting,
            accumulated_inflation_pct: inflation_factor.factor_to_percent(),
            accumulated_devaluation_pct: devaluation,
            provisional,
        });
    }

    Ok(rows)
}

fn adjustment_factor(
    adjustment: &Adjustment,
    history: &IndexHistory,
    month: YearMonth,
    frequency: u32,
) -> LaggedFactor {
    match adjustment {
        Adjustment::FixedPercentage { rate } => LaggedFactor {
            factor: rate.percent_factor(),
            missing: false,
        },
        Adjustment::IndexLinked {
            compounding: IndexCompounding::PriorMonth,
            ..
        } => LaggedFactor::over(history, std::iter::once(month.previous())),
        Adjustment::IndexLinked {
            compounding: IndexCompounding::CompoundedWindow,
            ..
        } => LaggedFactor::over(
            history,
            (1..=frequency as i32).map(|back| month.add_months(-back)),
        ),
    }
}

fn validate_contract(contract: &Contract) -> Result<(), EngineError> {
    if contract.duration_months == 0 {
        return Err(EngineError::InvalidTerms(format!(
            "contract {}: duration must be at least one month",
            contract.id
        )));
    }
    if contract.adjustment_frequency_months == 0 {
        return Err(EngineError::InvalidTerms(format!(
            "contract {}: adjustment frequency must be at least one month",
            contract.id
        )));
    }
    if !contract.initial_rent.is_positive() {
        return Err(EngineError::InvalidTerms(format!(
            "contract {}: initial rent must be > 0, got {}",
            contract.id, contract.initial_rent
        )));
    }
    Ok(())
}
