use crate::config::Config;
use crate::db::Repository;
use crate::domain::{
    Contract, ContractId, EntityKey, FxQuote, IndexPoint, IndexType, Instrument, InstrumentId,
    Transaction, TransactionId, UpsertDecision,
};
use crate::engine::{
    generate_fixed_income_schedule, generate_rental_schedule, match_fifo, EngineError,
    ExchangeRateResolver, IndexHistory, RentalContext,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::fingerprint::{contract_fingerprint, instrument_fingerprint};
use super::locks::EntityLocks;

/// Which derived rows to rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RegenerationScope {
    Instrument { id: InstrumentId },
    Contract { id: ContractId },
    #[serde(rename_all = "camelCase")]
    ContractsByIndex { index_type: IndexType },
    AllContracts,
    AllInstruments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityOutcome {
    /// Rows were replaced under a new generation.
    Regenerated { generation: i64, rows: usize },
    /// The recomputed rows match what is stored; nothing was written.
    Unchanged,
}

/// One entity that could not be regenerated. Its previous rows are untouched.
#[derive(Debug, Serialize)]
pub struct RegenerationFailure {
    pub entity: EntityKey,
    #[serde(serialize_with = "serialize_display")]
    pub cause: OrchestrationError,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub run_id: Uuid,
    pub regenerated: Vec<EntityKey>,
    pub unchanged: Vec<EntityKey>,
    pub failures: Vec<RegenerationFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of writing an index print or FX quote.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactSaveReport {
    pub decision: UpsertDecision,
    /// `None` when a manual value was kept and nothing changed.
    pub regeneration: Option<BatchReport>,
}

#[derive(Clone)]
pub struct Orchestrator {
    repo: Arc<Repository>,
    config: Config,
    locks: Arc<EntityLocks>,
}

impl Orchestrator {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self {
            repo,
            config,
            locks: Arc::new(EntityLocks::new()),
        }
    }

    /// Rebuild every entity in `scope`.
    ///
    /// Only a failure to enumerate the scope is returned as an error. Failures
    /// of individual entities are logged and collected in the report.
    pub async fn regenerate(
        &self,
        scope: RegenerationScope,
    ) -> Result<BatchReport, OrchestrationError> {
        let entities = self.resolve_scope(&scope).await?;
        Ok(self.run_batch(entities).await)
    }

    async fn resolve_scope(
        &self,
        scope: &RegenerationScope,
    ) -> Result<Vec<EntityKey>, OrchestrationError> {
        let entities = match scope {
            RegenerationScope::Instrument { id } => vec![EntityKey::Instrument(*id)],
            RegenerationScope::Contract { id } => vec![EntityKey::Contract(*id)],
            RegenerationScope::ContractsByIndex { index_type } => {
                let include_fixed = *index_type == self.config.reference_inflation_index;
                self.repo
                    .list_contract_ids_by_index(index_type, include_fixed)
                    .await?
                    .into_iter()
                    .map(EntityKey::Contract)
                    .collect()
            }
            RegenerationScope::AllContracts => self
                .repo
                .list_contract_ids()
                .await?
                .into_iter()
                .map(EntityKey::Contract)
                .collect(),
            RegenerationScope::AllInstruments => self
                .repo
                .list_instrument_ids()
                .await?
                .into_iter()
                .map(EntityKey::Instrument)
                .collect(),
        };
        Ok(entities)
    }

    /// Regenerate independent entities concurrently and collect the outcome.
    pub async fn run_batch(&self, entities: impl IntoIterator<Item = EntityKey>) -> BatchReport {
        let run_id = Uuid::new_v4();
        let entities: BTreeSet<EntityKey> = entities.into_iter().collect();
        info!(run_id = %run_id, entities = entities.len(), "Regeneration batch started");

        let mut results: Vec<(EntityKey, Result<EntityOutcome, OrchestrationError>)> =
            stream::iter(entities)
                .map(|entity| async move { (entity, self.regenerate_entity(entity).await) })
                .buffer_unordered(self.config.regeneration_concurrency)
                .collect()
                .await;
        results.sort_by_key(|(entity, _)| *entity);

        let mut report = BatchReport {
            run_id,
            regenerated: Vec::new(),
            unchanged: Vec::new(),
            failures: Vec::new(),
        };
        for (entity, result) in results {
            match result {
                Ok(EntityOutcome::Regenerated { .. }) => report.regenerated.push(entity),
                Ok(EntityOutcome::Unchanged) => report.unchanged.push(entity),
                Err(cause) => {
                    warn!(run_id = %run_id, entity = %entity, error = %cause, "Regeneration failed, keeping previous rows");
                    report.failures.push(RegenerationFailure { entity, cause });
                }
            }
        }

        info!(
            run_id = %run_id,
            regenerated = report.regenerated.len(),
            unchanged = report.unchanged.len(),
            failed = report.failures.len(),
            "Regeneration batch finished"
        );
        report
    }

    /// Recompute one entity and swap its rows in if they changed.
    pub async fn regenerate_entity(
        &self,
        entity: EntityKey,
    ) -> Result<EntityOutcome, OrchestrationError> {
        let _guard = self.locks.acquire(entity).await;
        match entity {
            EntityKey::Instrument(id) => self.regenerate_instrument(id).await,
            EntityKey::Contract(id) => self.regenerate_contract(id).await,
        }
    }

    async fn regenerate_instrument(
        &self,
        id: InstrumentId,
    ) -> Result<EntityOutcome, OrchestrationError> {
        let entity = EntityKey::Instrument(id);
        let instrument = self
            .repo
            .get_instrument(id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(entity.to_string()))?;
        let transactions = self.repo.list_transactions(id).await?;

        // The schedule depends on the terms only and the position on the
        // trades only. When one side is rejected the other is still
        // refreshed, with the rejected side's last stored rows carried over.
        let schedule = generate_fixed_income_schedule(&instrument)
            .map(|rows| rows.iter().map(|c| c.rounded()).collect::<Vec<_>>());
        let position = match_fifo(&transactions).map(|(lots, gains)| {
            (
                lots.iter().map(|l| l.rounded()).collect::<Vec<_>>(),
                gains.iter().map(|g| g.rounded()).collect::<Vec<_>>(),
            )
        });

        let (cashflows, lots, gains, rejected) = match (schedule, position) {
            (Ok(cashflows), Ok((lots, gains))) => (cashflows, lots, gains, None),
            (Ok(cashflows), Err(error)) => {
                let lots = self.repo.query_open_lots(id).await?;
                let gains = self.repo.query_realized_gains(id).await?;
                (cashflows, lots, gains, Some(error))
            }
            (Err(error), Ok((lots, gains))) => {
                let cashflows = self.repo.query_cashflows(id).await?;
                (cashflows, lots, gains, Some(error))
            }
            (Err(error), Err(_)) => return Err(error.into()),
        };

        let fingerprint = instrument_fingerprint(&lots, &gains, &cashflows);
        if !self.is_unchanged(entity, &fingerprint).await? {
            let generation = self
                .repo
                .replace_instrument_derived(id, &fingerprint, &lots, &gains, &cashflows, Utc::now())
                .await?;
            let rows = lots.len() + gains.len() + cashflows.len();
            debug!(entity = %entity, generation, rows, partial = rejected.is_some(), "Instrument rows replaced");
            if rejected.is_none() {
                return Ok(EntityOutcome::Regenerated { generation, rows });
            }
        }

        match rejected {
            Some(error) => Err(error.into()),
            None => Ok(EntityOutcome::Unchanged),
        }
    }

    async fn regenerate_contract(&self, id: ContractId) -> Result<EntityOutcome, OrchestrationError> {
        let entity = EntityKey::Contract(id);
        let contract = self
            .repo
            .get_contract(id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(entity.to_string()))?;

        let index_type = contract
            .adjustment
            .index_type()
            .unwrap_or(&self.config.reference_inflation_index);
        let points = self.repo.list_index_points(index_type).await?;
        let history = IndexHistory::from_points(index_type, &points);
        let resolver = self.load_resolver().await?;

        let rows = generate_rental_schedule(
            &contract,
            &history,
            RentalContext {
                resolver: &resolver,
                reporting_currencies: &self.config.reporting_currencies,
                devaluation_pair: &self.config.devaluation_pair,
            },
        )?;
        let rows: Vec<_> = rows.iter().map(|r| r.rounded()).collect();

        let fingerprint = contract_fingerprint(&rows);
        if self.is_unchanged(entity, &fingerprint).await? {
            return Ok(EntityOutcome::Unchanged);
        }

        let generation = self
            .repo
            .replace_contract_derived(id, &fingerprint, &rows, Utc::now())
            .await?;
        debug!(entity = %entity, generation, rows = rows.len(), "Contract rows replaced");
        Ok(EntityOutcome::Regenerated {
            generation,
            rows: rows.len(),
        })
    }

    async fn is_unchanged(
        &self,
        entity: EntityKey,
        fingerprint: &str,
    ) -> Result<bool, OrchestrationError> {
        Ok(self
            .repo
            .get_generation(entity)
            .await?
            .is_some_and(|current| current.fingerprint == fingerprint))
    }

    /// Resolver over the full stored quote set, with the configured look-back.
    pub async fn load_resolver(&self) -> Result<ExchangeRateResolver, OrchestrationError> {
        let quotes = self.repo.list_fx_quotes().await?;
        Ok(ExchangeRateResolver::new(quotes, self.config.fx_lookback_days))
    }

    // =========================================================================
    // Fact mutations: write the fact, then rebuild what depends on it
    // =========================================================================

    pub async fn save_instrument(
        &self,
        instrument: &Instrument,
    ) -> Result<BatchReport, OrchestrationError> {
        self.repo.upsert_instrument(instrument).await?;
        Ok(self.run_batch([EntityKey::Instrument(instrument.id)]).await)
    }

    /// Save a transaction and re-match its instrument, plus the instrument it
    /// was previously booked against when that differs.
    pub async fn save_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<BatchReport, OrchestrationError> {
        let previous = self.repo.upsert_transaction(transaction).await?;
        let entities = std::iter::once(transaction.instrument_id)
            .chain(previous)
            .map(EntityKey::Instrument);
        Ok(self.run_batch(entities).await)
    }

    pub async fn delete_transaction(
        &self,
        id: TransactionId,
    ) -> Result<BatchReport, OrchestrationError> {
        let instrument = self
            .repo
            .delete_transaction(id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("transaction:{}", id)))?;
        Ok(self.run_batch([EntityKey::Instrument(instrument)]).await)
    }

    pub async fn save_contract(&self, contract: &Contract) -> Result<BatchReport, OrchestrationError> {
        self.repo.upsert_contract(contract).await?;
        Ok(self.run_batch([EntityKey::Contract(contract.id)]).await)
    }

    /// Store an index print and rebuild every contract that reads that index.
    pub async fn save_index_point(
        &self,
        point: &IndexPoint,
        force: bool,
    ) -> Result<FactSaveReport, OrchestrationError> {
        let decision = self.repo.upsert_index_point(point, force).await?;
        if decision == UpsertDecision::KeepExisting {
            info!(index_type = %point.index_type, month = %point.month, "Kept manual index print over scraped value");
            return Ok(FactSaveReport {
                decision,
                regeneration: None,
            });
        }

        let report = self
            .regenerate(RegenerationScope::ContractsByIndex {
                index_type: point.index_type.clone(),
            })
            .await?;
        Ok(FactSaveReport {
            decision,
            regeneration: Some(report),
        })
    }

    /// Store an FX quote. Every contract's reporting columns may move, so all
    /// contracts are rebuilt.
    pub async fn save_fx_quote(
        &self,
        quote: &FxQuote,
        force: bool,
    ) -> Result<FactSaveReport, OrchestrationError> {
        let decision = self.repo.upsert_fx_quote(quote, force).await?;
        if decision == UpsertDecision::KeepExisting {
            info!(pair = %quote.pair, date = %quote.date, "Kept manual FX quote over scraped value");
            return Ok(FactSaveReport {
                decision,
                regeneration: None,
            });
        }

        let report = self.regenerate(RegenerationScope::AllContracts).await?;
        Ok(FactSaveReport {
            decision,
            regeneration: Some(report),
        })
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(String),
}

fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
