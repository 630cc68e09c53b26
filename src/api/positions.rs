use crate::api::AppState;
use crate::domain::{Decimal, InstrumentId};
use crate::engine::fifo::PositionValuation;
use crate::engine::{Lot, PositionSummary, RealizedGainEvent};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct PositionQuery {
    /// Market price used to value the open lots.
    pub price: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub instrument_id: InstrumentId,
    pub summary: PositionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<PositionValuation>,
    pub lots: Vec<Lot>,
    pub realized_gains: Vec<RealizedGainEvent>,
}

/// Held position of an instrument from its last regeneration.
pub async fn get_position(
    Path(id): Path<i64>,
    Query(params): Query<PositionQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionResponse>, AppError> {
    let instrument_id = InstrumentId::new(id);
    if state.repo.get_instrument(instrument_id).await?.is_none() {
        return Err(AppError::NotFound(format!("instrument {}", id)));
    }

    let price = match params.price.as_deref() {
        Some(raw) => Some(
            Decimal::from_str(raw)
                .ok()
                .filter(|p| !p.is_negative())
                .ok_or_else(|| AppError::BadRequest("price must be a non-negative decimal".into()))?,
        ),
        None => None,
    };

    let lots = state.repo.query_open_lots(instrument_id).await?;
    let realized_gains = state.repo.query_realized_gains(instrument_id).await?;
    let summary = PositionSummary::from_outputs(&lots, &realized_gains);

    Ok(Json(PositionResponse {
        instrument_id,
        average_cost: summary.average_cost(),
        valuation: price.map(|p| summary.at_price(p)),
        summary,
        lots,
        realized_gains,
    }))
}
