use crate::api::AppState;
use crate::domain::{Decimal, FxQuote, IndexPoint};
use crate::error::AppError;
use crate::orchestration::FactSaveReport;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    /// Let a scraped value overwrite a manual one.
    #[serde(default)]
    pub force: bool,
}

/// Store an index print and rebuild the contracts that depend on it.
pub async fn put_index_point(
    Query(params): Query<ForceQuery>,
    State(state): State<AppState>,
    Json(point): Json<IndexPoint>,
) -> Result<Json<FactSaveReport>, AppError> {
    // A monthly variation of -100% or less would zero or flip the rent.
    if point.value <= -Decimal::hundred() {
        return Err(AppError::BadRequest("value must be > -100".into()));
    }
    let report = state
        .orchestrator
        .save_index_point(&point, params.force)
        .await?;
    Ok(Json(report))
}

/// Store an FX quote and rebuild every contract's reporting columns.
pub async fn put_fx_quote(
    Query(params): Query<ForceQuery>,
    State(state): State<AppState>,
    Json(quote): Json<FxQuote>,
) -> Result<Json<FactSaveReport>, AppError> {
    if !quote.rate.is_positive() {
        return Err(AppError::BadRequest("rate must be > 0".into()));
    }
    let report = state
        .orchestrator
        .save_fx_quote(&quote, params.force)
        .await?;
    Ok(Json(report))
}
