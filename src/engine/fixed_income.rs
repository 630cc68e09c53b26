//! Coupon and amortization schedule generation.
//!
//! Interest accrues by simple proportion of whole months (`months / 12`); day
//! counts and leap years are not modelled.

use crate::domain::month::{add_months, months_between};
use crate::domain::{Amortization, Decimal, FixedIncomeTerms, Instrument, InstrumentId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::{CashflowKind, CashflowRow, EngineError};

#[derive(Debug, Default, Clone)]
struct PaymentEvent {
    coupon: bool,
    amortization_pct: Option<Decimal>,
}

/// Generate the complete schedule for an instrument.
///
/// Instruments without fixed-income terms have no contractual cashflows and
/// yield an empty schedule. The schedule is always produced whole; there is no
/// way to patch part of it.
///
/// # Errors
/// `InvalidTerms` for impossible dates or rates, and
/// `InconsistentAmortizationSchedule` when custom percentages do not sum to 100.
pub fn generate_fixed_income_schedule(
    instrument: &Instrument,
) -> Result<Vec<CashflowRow>, EngineError> {
    let Some(terms) = instrument.fixed_income.as_ref() else {
        return Ok(Vec::new());
    };
    validate_terms(instrument.id, terms)?;

    let mut events: BTreeMap<NaiveDate, PaymentEvent> = BTreeMap::new();
    for date in coupon_dates(terms)? {
        events.entry(date).or_default().coupon = true;
    }
    for (date, pct) in amortization_steps(instrument.id, terms)? {
        let event = events.entry(date).or_default();
        let pct = event.amortization_pct.unwrap_or_default() + pct;
        event.amortization_pct = Some(pct);
    }

    let last_amortization = events
        .iter()
        .filter(|(_, e)| e.amortization_pct.is_some())
        .map(|(date, _)| *date)
        .next_back();

    let mut rows = Vec::new();
    let mut residual = terms.face_value;
    let mut accrual_start = terms.emission_date;

    for (date, event) in &events {
        if event.coupon {
            let months = Decimal::from_i64(months_between(accrual_start, *date) as i64);
            let interest = residual * terms.coupon_rate / Decimal::hundred() * months
                / Decimal::from_i64(12);
            if interest.is_positive() {
                rows.push(CashflowRow {
                    instrument_id: instrument.id,
                    date: *date,
                    amount: interest,
                    currency: instrument.currency.clone(),
                    kind: CashflowKind::Interest,
                    residual_capital: residual,
                });
            }
            accrual_start = *date;
        }

        if let Some(pct) = event.amortization_pct {
            let amount = if Some(*date) == last_amortization {
                residual
            } else {
                (terms.face_value * pct / Decimal::hundred()).min(residual)
            };
            residual -= amount;
            rows.push(CashflowRow {
                instrument_id: instrument.id,
                date: *date,
                amount,
                currency: instrument.currency.clone(),
                kind: CashflowKind::Amortization,
                residual_capital: residual,
            });
        }
    }

    Ok(rows)
}

/// Project a per-face-value schedule onto the nominal actually held.
pub fn scale_schedule(
    rows: &[CashflowRow],
    terms: &FixedIncomeTerms,
    nominal_held: Decimal,
) -> Result<Vec<CashflowRow>, EngineError> {
    let factor = nominal_held
        .checked_div(terms.face_value)
        .ok_or_else(|| EngineError::InvalidTerms("face value must be > 0".to_string()))?;
    Ok(rows
        .iter()
        .map(|row| CashflowRow {
            amount: row.amount * factor,
            residual_capital: row.residual_capital * factor,
            ..row.clone()
        })
        .collect())
}

fn validate_terms(id: InstrumentId, terms: &FixedIncomeTerms) -> Result<(), EngineError> {
    let invalid = |msg: String| Err(EngineError::InvalidTerms(format!("instrument {}: {}", id, msg)));

    if terms.payment_frequency_months == 0 {
        return invalid("payment frequency must be at least one month".to_string());
    }
    if terms.maturity_date <= terms.emission_date {
        return invalid(format!(
            "maturity {} must be after emission {}",
            terms.maturity_date, terms.emission_date
        ));
    }
    if !terms.face_value.is_positive() {
        return invalid(format!("face value must be > 0, got {}", terms.face_value));
    }
    if terms.coupon_rate.is_negative() {
        return invalid(format!("coupon rate must be >= 0, got {}", terms.coupon_rate));
    }
    Ok(())
}

/// Emission + k * frequency while before maturity, then maturity itself.
fn coupon_dates(terms: &FixedIncomeTerms) -> Result<Vec<NaiveDate>, EngineError> {
    let mut dates = Vec::new();
    let mut k: u32 = 1;
    loop {
        let date = k
            .checked_mul(terms.payment_frequency_months)
            .and_then(|months| add_months(terms.emission_date, months))
            .ok_or_else(|| EngineError::InvalidTerms("payment date out of range".to_string()))?;
        if date >= terms.maturity_date {
            break;
        }
        dates.push(date);
        k += 1;
    }
    dates.push(terms.maturity_date);
    Ok(dates)
}

fn amortization_steps(
    id: InstrumentId,
    terms: &FixedIncomeTerms,
) -> Result<Vec<(NaiveDate, Decimal)>, EngineError> {
    let steps = match &terms.amortization {
        Amortization::Bullet => return Ok(vec![(terms.maturity_date, Decimal::hundred())]),
        Amortization::CustomSchedule(steps) => steps,
    };

    for step in steps {
        if step.date <= terms.emission_date || step.date > terms.maturity_date {
            return Err(EngineError::InvalidTerms(format!(
                "instrument {}: amortization date {} outside ({}, {}]",
                id, step.date, terms.emission_date, terms.maturity_date
            )));
        }
        if !step.percent_of_principal.is_positive() {
            return Err(EngineError::InvalidTerms(format!(
                "instrument {}: amortization percentage must be > 0, got {}",
                id, step.percent_of_principal
            )));
        }
    }

    let total: Decimal = steps.iter().map(|s| s.percent_of_principal).sum();
    if total != Decimal::hundred() {
        return Err(EngineError::InconsistentAmortizationSchedule {
            instrument: id,
            total_percent: total,
        });
    }

    Ok(steps
        .iter()
        .map(|s| (s.date, s.percent_of_principal))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AmortizationStep, CurrencyCode};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bond(amortization: Amortization) -> Instrument {
        Instrument {
            id: InstrumentId::new(7),
            ticker: "AL30".to_string(),
            currency: CurrencyCode::new("USD"),
            fixed_income: Some(FixedIncomeTerms {
                face_value: Decimal::from_i64(1000),
                emission_date: day(2024, 1, 15),
                coupon_rate: Decimal::from_i64(12),
                payment_frequency_months: 6,
                maturity_date: day(2026, 1, 15),
                amortization,
            }),
        }
    }

    #[test]
    fn test_bullet_pays_interest_each_period_and_principal_at_maturity() {
        let rows = generate_fixed_income_schedule(&bond(Amortization::Bullet)).unwrap();
        let interest: Vec<_> = rows
            .iter()
            .filter(|r| r.kind == CashflowKind::Interest)
            .collect();
        assert_eq!(interest.len(), 4);
        assert!(interest.iter().all(|r| r.amount == Decimal::from_i64(60)));

        let last = rows.last().unwrap();
        assert_eq!(last.kind, CashflowKind::Amortization);
        assert_eq!(last.date, day(2026, 1, 15));
        assert_eq!(last.amount, Decimal::from_i64(1000));
        assert!(last.residual_capital.is_zero());
    }

    #[test]
    fn test_interest_precedes_amortization_on_same_date() {
        let rows = generate_fixed_income_schedule(&bond(Amortization::Bullet)).unwrap();
        let n = rows.len();
        assert_eq!(rows[n - 2].kind, CashflowKind::Interest);
        assert_eq!(rows[n - 2].date, rows[n - 1].date);
    }

    #[test]
    fn test_custom_schedule_must_sum_to_hundred() {
        let err = generate_fixed_income_schedule(&bond(Amortization::CustomSchedule(vec![
            AmortizationStep {
                date: day(2025, 1, 15),
                percent_of_principal: Decimal::from_i64(50),
            },
            AmortizationStep {
                date: day(2026, 1, 15),
                percent_of_principal: Decimal::from_i64(40),
            },
        ])))
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InconsistentAmortizationSchedule {
                instrument: InstrumentId::new(7),
                total_percent: Decimal::from_i64(90),
            }
        );
    }

    #[test]
    fn test_no_terms_means_no_schedule() {
        let mut etf = bond(Amortization::Bullet);
        etf.fixed_income = None;
        assert!(generate_fixed_income_schedule(&etf).unwrap().is_empty());
    }

    #[test]
    fn test_maturity_before_emission_rejected() {
        let mut instrument = bond(Amortization::Bullet);
        if let Some(terms) = instrument.fixed_income.as_mut() {
            terms.maturity_date = day(2023, 1, 1);
        }
        assert!(matches!(
            generate_fixed_income_schedule(&instrument),
            Err(EngineError::InvalidTerms(_))
        ));
    }

    #[test]
    fn test_stub_final_period_accrues_partial_months() {
        let mut instrument = bond(Amortization::Bullet);
        if let Some(terms) = instrument.fixed_income.as_mut() {
            terms.maturity_date = day(2024, 9, 15);
        }
        let rows = generate_fixed_income_schedule(&instrument).unwrap();
        // 2024-07-15 full semester (60), then 2 months to maturity (20).
        assert_eq!(rows[0].amount, Decimal::from_i64(60));
        assert_eq!(rows[1].date, day(2024, 9, 15));
        assert_eq!(rows[1].amount, Decimal::from_i64(20));
    }

    #[test]
    fn test_scale_schedule_to_holding() {
        let instrument = bond(Amortization::Bullet);
        let rows = generate_fixed_income_schedule(&instrument).unwrap();
        let terms = instrument.fixed_income.as_ref().unwrap();
        let scaled = scale_schedule(&rows, terms, Decimal::from_i64(250)).unwrap();
        assert_eq!(scaled[0].amount, Decimal::from_i64(15));
        assert_eq!(scaled.last().unwrap().amount, Decimal::from_i64(250));
    }
}
