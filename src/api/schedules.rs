use crate::api::AppState;
use crate::domain::{ContractId, CurrencyCode, Decimal, InstrumentId, YearMonth};
use crate::engine::{scale_schedule, CashflowRow, RentalCashflowRow};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct InstrumentCashflowsQuery {
    /// Project the per-face-value schedule onto this held nominal.
    pub nominal: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentCashflowsResponse {
    pub instrument_id: InstrumentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal: Option<Decimal>,
    pub rows: Vec<CashflowRow>,
}

pub async fn get_instrument_cashflows(
    Path(id): Path<i64>,
    Query(params): Query<InstrumentCashflowsQuery>,
    State(state): State<AppState>,
) -> Result<Json<InstrumentCashflowsResponse>, AppError> {
    let instrument_id = InstrumentId::new(id);
    let instrument = state
        .repo
        .get_instrument(instrument_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("instrument {}", id)))?;

    let nominal = match params.nominal.as_deref() {
        Some(raw) => Some(
            Decimal::from_str(raw)
                .ok()
                .filter(|n| n.is_positive())
                .ok_or_else(|| AppError::BadRequest("nominal must be a positive decimal".into()))?,
        ),
        None => None,
    };

    let mut rows = state.repo.query_cashflows(instrument_id).await?;
    if let Some(nominal) = nominal {
        let terms = instrument.fixed_income.as_ref().ok_or_else(|| {
            AppError::BadRequest(format!("instrument {} has no fixed-income terms", id))
        })?;
        rows = scale_schedule(&rows, terms, nominal)?
            .iter()
            .map(|row| row.rounded())
            .collect();
    }

    Ok(Json(InstrumentCashflowsResponse {
        instrument_id,
        nominal,
        rows,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCashflowsResponse {
    pub contract_id: ContractId,
    pub reporting_currencies: [CurrencyCode; 2],
    /// First month computed with a missing index print, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisional_from: Option<YearMonth>,
    pub rows: Vec<RentalCashflowRow>,
}

pub async fn get_contract_cashflows(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ContractCashflowsResponse>, AppError> {
    let contract_id = ContractId::new(id);
    if state.repo.get_contract(contract_id).await?.is_none() {
        return Err(AppError::NotFound(format!("contract {}", id)));
    }

    let rows = state.repo.query_rental_rows(contract_id).await?;
    let provisional_from = rows.iter().find(|r| r.provisional).map(|r| r.month);

    Ok(Json(ContractCashflowsResponse {
        contract_id,
        reporting_currencies: state.config.reporting_currencies.clone(),
        provisional_from,
        rows,
    }))
}
