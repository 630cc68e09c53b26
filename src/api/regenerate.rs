use crate::api::AppState;
use crate::error::AppError;
use crate::orchestration::{BatchReport, RegenerationScope};
use axum::extract::State;
use axum::Json;

/// Rebuild the derived rows of a scope.
///
/// Per-entity failures are reported in the body with a 200; only a scope that
/// cannot be enumerated fails the request.
pub async fn post_regenerate(
    State(state): State<AppState>,
    Json(scope): Json<RegenerationScope>,
) -> Result<Json<BatchReport>, AppError> {
    let report = state.orchestrator.regenerate(scope).await?;
    Ok(Json(report))
}
