pub mod facts;
pub mod fx;
pub mod health;
pub mod positions;
pub mod regenerate;
pub mod schedules;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::Orchestrator;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(repo.clone(), config.clone()));
        Self {
            repo,
            config,
            orchestrator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/regenerate", post(regenerate::post_regenerate))
        .route(
            "/v1/instruments/:id/cashflows",
            get(schedules::get_instrument_cashflows),
        )
        .route(
            "/v1/instruments/:id/position",
            get(positions::get_position),
        )
        .route(
            "/v1/contracts/:id/cashflows",
            get(schedules::get_contract_cashflows),
        )
        .route("/v1/fx/rate", get(fx::get_rate))
        .route("/v1/index-points", put(facts::put_index_point))
        .route("/v1/fx-quotes", put(facts::put_fx_quote))
        .layer(cors)
        .with_state(state)
}
