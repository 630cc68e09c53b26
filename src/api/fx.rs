use crate::api::AppState;
use crate::domain::CurrencyPair;
use crate::engine::fx::ResolvedRate;
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub pair: String,
    pub date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateResponse {
    pub pair: CurrencyPair,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub resolved: ResolvedRate,
}

/// Rate for a pair as of a date, with the fallback that produced it.
pub async fn get_rate(
    Query(params): Query<RateQuery>,
    State(state): State<AppState>,
) -> Result<Json<RateResponse>, AppError> {
    let pair: CurrencyPair = params
        .pair
        .parse()
        .map_err(|_| AppError::BadRequest("pair must look like USD/ARS".into()))?;
    let date = NaiveDate::parse_from_str(&params.date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("date must be YYYY-MM-DD".into()))?;

    let resolver = state.orchestrator.load_resolver().await?;
    let resolved = resolver.resolve(date, &pair)?;

    Ok(Json(RateResponse {
        pair,
        date,
        resolved,
    }))
}
