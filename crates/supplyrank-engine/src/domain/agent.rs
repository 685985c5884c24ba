//! Ranking Agent
//!
//! Learns (state, action) values from supplier feedback and from sampled
//! replays of supplier metrics, and ranks suppliers by exploiting what it
//! has learned.
//!
//! Every QTable write goes through [`QTableStore::apply`], so the stored
//! value is always read and replaced under the key's lock. When the updated
//! key is also a candidate of the next state (feedback always loops back to
//! its own state) its share of the lookahead is taken under that same lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use supplyrank_common::{
    Action, Feedback, Metrics, RankTier, RankingError, Result, State, SupplierId, SupplierRecord,
};
use tracing::{debug, info, instrument, warn};

use super::environment::SupplierEnvironment;
use super::ranking::{sort_rankings, RankingResult, ScoreBlender};
use super::training::TrainingStats;
use crate::config::{EngineConfig, LearningSettings};
use crate::infra::collaborators::{
    bounded, InMemorySupplierRegistry, MetricsSource, SupplierCatalog, SupplierDirectory,
};
use crate::infra::qtable::{BellmanUpdate, QKey, QTableEntry, QTableFilter, QTableStore};

/// Iterations between training progress logs
pub const PROGRESS_LOG_INTERVAL: usize = 10;

/// External services the agent depends on
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn SupplierDirectory>,
    pub metrics: Arc<dyn MetricsSource>,
    pub catalog: Arc<dyn SupplierCatalog>,
}

impl Collaborators {
    /// Use one registry for all three roles
    pub fn from_registry(registry: Arc<InMemorySupplierRegistry>) -> Self {
        Self {
            directory: registry.clone(),
            metrics: registry.clone(),
            catalog: registry,
        }
    }
}

/// One applied learning update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStep {
    pub supplier_id: SupplierId,
    pub state: State,
    pub action: Action,
    pub reward: f64,
    pub next_state: State,
    /// Value after the update
    pub q_value: f64,
    pub update_count: u64,
}

/// Result of learning from one piece of feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub supplier_name: String,
    pub product_id: Option<String>,
    pub city: Option<String>,
    /// Metrics derived from the feedback
    pub metrics: Metrics,
    #[serde(flatten)]
    pub step: LearningStep,
}

/// Learned value of one candidate action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub action: Action,
    pub description: String,
    pub value: f64,
    pub update_count: u64,
}

/// Per-supplier view of the learned values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierQValues {
    pub supplier_id: SupplierId,
    pub supplier_name: Option<String>,
    pub state: State,
    pub metrics: Metrics,
    pub best_action: Action,
    pub actions: Vec<ActionValue>,
}

/// Filtered dump of the QTable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QTableExport {
    pub entries: Vec<QTableEntry>,
    /// Entries returned
    pub count: usize,
    /// Entries stored
    pub total_entries: usize,
}

/// Q-learning supplier ranking agent
pub struct RankingAgent {
    learning: LearningSettings,
    blender: ScoreBlender,
    environment: SupplierEnvironment,
    qtable: Arc<dyn QTableStore>,
    directory: Arc<dyn SupplierDirectory>,
    catalog: Arc<dyn SupplierCatalog>,
}

impl RankingAgent {
    pub fn new(
        config: &EngineConfig,
        collaborators: Collaborators,
        qtable: Arc<dyn QTableStore>,
    ) -> Self {
        Self {
            learning: config.learning,
            blender: ScoreBlender::new(config.ranking),
            environment: SupplierEnvironment::new(
                collaborators.metrics,
                config.environment,
                config.reward,
                config.lookup,
            ),
            qtable,
            directory: collaborators.directory,
            catalog: collaborators.catalog,
        }
    }

    pub fn environment(&self) -> &SupplierEnvironment {
        &self.environment
    }

    pub fn qtable(&self) -> &Arc<dyn QTableStore> {
        &self.qtable
    }

    pub fn learning_settings(&self) -> &LearningSettings {
        &self.learning
    }

    // ------------------------------------------------------------------
    // Learning
    // ------------------------------------------------------------------

    /// Apply one Q-learning update to (state, action)
    ///
    /// The lookahead is the best stored value among the next state's
    /// candidates, or 0.0 when it has none.
    pub async fn learn(
        &self,
        state: State,
        action: Action,
        reward: f64,
        next_state: State,
    ) -> Result<QTableEntry> {
        let key = QKey::new(state, action);
        let next_candidates = self.environment.get_actions(&next_state);
        let next_includes_key = next_state == state && next_candidates.contains(&action);
        let max_next_q = self.max_q_excluding(&next_state, &next_candidates, key).await?;
        let update = BellmanUpdate {
            reward,
            max_next_q,
            next_includes_key,
            learning_rate: self.learning.learning_rate,
            discount_factor: self.learning.discount_factor,
        };
        let entry = self.qtable.apply(key, update).await?;

        debug!(
            state = %state,
            action = %action,
            reward,
            max_next_q = ?max_next_q,
            next_includes_key,
            q_value = entry.value,
            update_count = entry.update_count,
            "Applied Q update"
        );
        Ok(entry)
    }

    /// Learn from one piece of supplier feedback
    ///
    /// Lookups happen before the write: if the supplier cannot be resolved
    /// the QTable is left untouched.
    #[instrument(skip(self, feedback), fields(supplier_id = %feedback.supplier_id))]
    pub async fn process_feedback(&self, feedback: &Feedback) -> Result<FeedbackOutcome> {
        let metrics = feedback.to_metrics(self.environment.metric_weights())?;
        let record = self.resolve_supplier(feedback.supplier_id).await?;

        let state = self.environment.state_mapper().get_state_from_metrics(&metrics)?;
        let candidates = self.candidate_actions(&state)?;
        let action = self.learning_action(&metrics, &candidates)?;
        let reward = self.environment.reward(&metrics, &state, action);
        let next_state = self.environment.next_state_from(&metrics, action)?;

        let entry = self.learn(state, action, reward, next_state).await?;

        info!(
            supplier = %record.display_name(),
            state = %state,
            action = %action,
            reward,
            q_value = entry.value,
            "Processed supplier feedback"
        );

        Ok(FeedbackOutcome {
            supplier_name: record.display_name(),
            product_id: feedback.product_id.clone(),
            city: feedback.city.clone().or_else(|| record.city().map(str::to_string)),
            metrics,
            step: LearningStep {
                supplier_id: feedback.supplier_id,
                state,
                action,
                reward,
                next_state,
                q_value: entry.value,
                update_count: entry.update_count,
            },
        })
    }

    /// Action credited by feedback: the tier implied by the overall score
    ///
    /// Falls back to the first rank tier on offer.
    pub fn learning_action(&self, metrics: &Metrics, candidates: &[Action]) -> Result<Action> {
        let implied = Action::RankTier(RankTier::for_score(metrics.overall_score()));
        if candidates.contains(&implied) {
            return Ok(implied);
        }
        candidates
            .iter()
            .copied()
            .find(Action::is_rank_assignment)
            .ok_or_else(|| RankingError::NoCandidateActions("no rank tier on offer".to_string()))
    }

    // ------------------------------------------------------------------
    // Action selection
    // ------------------------------------------------------------------

    /// Epsilon-greedy choice among the state's candidates
    ///
    /// With probability `epsilon` a uniformly random candidate, otherwise the
    /// greedy action.
    pub async fn select_action<R: Rng + Send>(
        &self,
        state: &State,
        epsilon: f64,
        rng: &mut R,
    ) -> Result<Action> {
        let candidates = self.candidate_actions(state)?;
        if epsilon > 0.0 && rng.gen_bool(epsilon.min(1.0)) {
            let pick = candidates[rng.gen_range(0..candidates.len())];
            debug!(state = %state, action = %pick, "Exploring");
            return Ok(pick);
        }
        let (action, _) = self.greedy(state, &candidates).await?;
        Ok(action)
    }

    /// Greedy action for a state and its stored value
    pub async fn best_action(&self, state: &State) -> Result<(Action, f64)> {
        let candidates = self.candidate_actions(state)?;
        let (action, entry) = self.greedy(state, &candidates).await?;
        Ok((action, entry.map_or(0.0, |e| e.value)))
    }

    /// Highest stored value; ties go to the lowest canonical index
    async fn greedy(
        &self,
        state: &State,
        candidates: &[Action],
    ) -> Result<(Action, Option<QTableEntry>)> {
        let mut best: Option<(Action, f64, Option<QTableEntry>)> = None;
        for &action in candidates {
            let entry = self.qtable.get(&QKey::new(*state, action)).await?;
            let value = entry.as_ref().map_or(0.0, |e| e.value);
            let better = best.as_ref().map_or(true, |(_, top, _)| value > *top);
            if better {
                best = Some((action, value, entry));
            }
        }
        best.map(|(action, _, entry)| (action, entry))
            .ok_or_else(|| RankingError::NoCandidateActions(state.name()))
    }

    /// Best stored value among `candidates` of `state`, skipping `key`
    async fn max_q_excluding(
        &self,
        state: &State,
        candidates: &[Action],
        key: QKey,
    ) -> Result<Option<f64>> {
        let mut max: Option<f64> = None;
        for &action in candidates {
            let candidate = QKey::new(*state, action);
            if candidate == key {
                continue;
            }
            let value = self.qtable.value(&candidate).await?;
            max = Some(max.map_or(value, |m: f64| m.max(value)));
        }
        Ok(max)
    }

    fn candidate_actions(&self, state: &State) -> Result<Vec<Action>> {
        let candidates = self.environment.get_actions(state);
        if candidates.is_empty() {
            return Err(RankingError::NoCandidateActions(state.name()));
        }
        Ok(candidates)
    }

    // ------------------------------------------------------------------
    // Batch training
    // ------------------------------------------------------------------

    /// Train on `iterations` sampled suppliers with fresh entropy
    ///
    /// Samples from `supplier_ids`, or from the whole directory when `None`.
    pub async fn batch_train(
        &self,
        iterations: usize,
        supplier_ids: Option<Vec<SupplierId>>,
    ) -> Result<TrainingStats> {
        let mut rng = StdRng::from_entropy();
        self.batch_train_with_rng(iterations, supplier_ids, &mut rng).await
    }

    /// Train with a fixed seed; identical seeds replay identical samples
    pub async fn batch_train_seeded(
        &self,
        iterations: usize,
        supplier_ids: Option<Vec<SupplierId>>,
        seed: u64,
    ) -> Result<TrainingStats> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.batch_train_with_rng(iterations, supplier_ids, &mut rng).await
    }

    /// Batch training loop
    ///
    /// A failed iteration is logged and counted, and the run moves on.
    #[instrument(skip(self, supplier_ids, rng))]
    pub async fn batch_train_with_rng<R: Rng + Send>(
        &self,
        iterations: usize,
        supplier_ids: Option<Vec<SupplierId>>,
        rng: &mut R,
    ) -> Result<TrainingStats> {
        let pool = match supplier_ids {
            Some(ids) => ids,
            None => {
                bounded(
                    self.environment.lookup_timeout(),
                    "supplier listing",
                    self.directory.list_suppliers(),
                )
                .await?
            }
        };

        let mut stats = TrainingStats::start(iterations, pool.len());
        if pool.is_empty() {
            warn!("No suppliers to train on");
            return Ok(stats.finish());
        }

        info!(
            run_id = %stats.run_id,
            iterations,
            suppliers = pool.len(),
            "Starting batch training"
        );

        for i in 0..iterations {
            let supplier_id = pool[rng.gen_range(0..pool.len())];
            let epsilon = self.learning.epsilon_at(i, iterations);

            match self.train_step(supplier_id, epsilon, rng).await {
                Ok(step) => stats.record_success(supplier_id, step.reward),
                Err(e) => {
                    warn!(
                        iteration = i,
                        supplier_id = %supplier_id,
                        kind = e.kind(),
                        error = %e,
                        "Training iteration failed"
                    );
                    stats.record_failure();
                }
            }

            if (i + 1) % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    iteration = i + 1,
                    iterations,
                    epsilon,
                    avg_reward = stats.avg_reward,
                    "Training progress"
                );
            }
        }

        let stats = stats.finish();
        info!(
            run_id = %stats.run_id,
            successful = stats.successful_updates,
            failed = stats.failed_updates,
            avg_reward = stats.avg_reward,
            "Batch training complete"
        );
        Ok(stats)
    }

    /// One replay of a supplier's latest metrics
    ///
    /// State, reward and transition all come from a single metrics lookup.
    pub async fn train_step<R: Rng + Send>(
        &self,
        supplier_id: SupplierId,
        epsilon: f64,
        rng: &mut R,
    ) -> Result<LearningStep> {
        let metrics = self.environment.supplier_metrics(supplier_id).await?;
        let state = self.environment.state_mapper().get_state_from_metrics(&metrics)?;
        let action = self.select_action(&state, epsilon, rng).await?;
        let reward = self.environment.reward(&metrics, &state, action);
        let next_state = self.environment.next_state_from(&metrics, action)?;
        let entry = self.learn(state, action, reward, next_state).await?;

        Ok(LearningStep {
            supplier_id,
            state,
            action,
            reward,
            next_state,
            q_value: entry.value,
            update_count: entry.update_count,
        })
    }

    // ------------------------------------------------------------------
    // Ranking
    // ------------------------------------------------------------------

    /// Rank one supplier without learning
    #[instrument(skip(self))]
    pub async fn rank_supplier(&self, supplier_id: SupplierId) -> Result<RankingResult> {
        let record = self.resolve_supplier(supplier_id).await?;
        let metrics = self.environment.supplier_metrics(supplier_id).await?;
        self.rank_record(record, metrics).await
    }

    /// Rank suppliers, best first
    ///
    /// Fails as a whole if any supplier cannot be resolved.
    pub async fn rank_suppliers(&self, supplier_ids: &[SupplierId]) -> Result<Vec<RankingResult>> {
        let mut results =
            try_join_all(supplier_ids.iter().map(|id| self.rank_supplier(*id))).await?;
        sort_rankings(&mut results);
        Ok(results)
    }

    /// Rank the candidate suppliers of a product, optionally within a city
    #[instrument(skip(self))]
    pub async fn rank_product(
        &self,
        product_id: &str,
        city: Option<&str>,
    ) -> Result<Vec<RankingResult>> {
        let candidates = bounded(
            self.environment.lookup_timeout(),
            "product lookup",
            self.catalog.get_suppliers_by_product(product_id),
        )
        .await?;

        let ranked =
            try_join_all(candidates.iter().map(|id| self.rank_in_city(*id, city))).await?;

        let mut results: Vec<RankingResult> = ranked.into_iter().flatten().collect();
        sort_rankings(&mut results);
        debug!(product_id, ranked = results.len(), "Ranked product suppliers");
        Ok(results)
    }

    /// `None` when the supplier is known to operate elsewhere
    async fn rank_in_city(
        &self,
        supplier_id: SupplierId,
        city: Option<&str>,
    ) -> Result<Option<RankingResult>> {
        let record = self.resolve_supplier(supplier_id).await?;
        if let Some(city) = city {
            if !record.serves_city(city) {
                return Ok(None);
            }
        }
        let metrics = self.environment.supplier_metrics(supplier_id).await?;
        self.rank_record(record, metrics).await.map(Some)
    }

    async fn rank_record(&self, record: SupplierRecord, metrics: Metrics) -> Result<RankingResult> {
        let state = self.environment.state_mapper().get_state_from_metrics(&metrics)?;
        let candidates = self.candidate_actions(&state)?;
        let (action, entry) = self.greedy(&state, &candidates).await?;

        let (q_value, update_count) = entry.map_or((0.0, 0), |e| (e.value, e.update_count));
        let metric_score = metrics.overall_score();

        Ok(RankingResult {
            supplier_id: record.id,
            supplier_name: record.display_name(),
            city: record.city().map(str::to_string),
            state,
            action,
            q_value,
            update_count,
            reward: self.environment.reward(&metrics, &state, action),
            metric_score,
            overall_score: self.blender.score(q_value, metric_score),
            metrics,
        })
    }

    async fn resolve_supplier(&self, supplier_id: SupplierId) -> Result<SupplierRecord> {
        bounded(
            self.environment.lookup_timeout(),
            "supplier lookup",
            self.directory.get_supplier(supplier_id),
        )
        .await?
        .ok_or(RankingError::UnknownSupplier(supplier_id))
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Learned values of every candidate action for a supplier's current state
    pub async fn q_values(&self, supplier_id: SupplierId) -> Result<SupplierQValues> {
        let metrics = self.environment.supplier_metrics(supplier_id).await?;
        let supplier_name = bounded(
            self.environment.lookup_timeout(),
            "supplier lookup",
            self.directory.get_supplier(supplier_id),
        )
        .await?
        .map(|r| r.display_name());

        let state = self.environment.state_mapper().get_state_from_metrics(&metrics)?;
        let candidates = self.candidate_actions(&state)?;
        let (best_action, _) = self.greedy(&state, &candidates).await?;

        let mut actions = Vec::with_capacity(candidates.len());
        for action in candidates {
            let entry = self.qtable.get(&QKey::new(state, action)).await?;
            actions.push(ActionValue {
                action,
                description: action.description(),
                value: entry.as_ref().map_or(0.0, |e| e.value),
                update_count: entry.map_or(0, |e| e.update_count),
            });
        }

        Ok(SupplierQValues {
            supplier_id,
            supplier_name,
            state,
            metrics,
            best_action,
            actions,
        })
    }

    /// Greedy action for every state
    pub async fn policy(&self) -> Result<BTreeMap<State, Action>> {
        let mut policy = BTreeMap::new();
        for state in State::all() {
            let (action, _) = self.best_action(&state).await?;
            policy.insert(state, action);
        }
        Ok(policy)
    }

    /// Filtered QTable entries with the stored total
    pub async fn export(&self, filter: &QTableFilter) -> Result<QTableExport> {
        let entries = self.qtable.query(filter).await?;
        let total_entries = self.qtable.total_count().await?;
        Ok(QTableExport {
            count: entries.len(),
            entries,
            total_entries,
        })
    }
}
