//! Supplier Environment
//!
//! Defines the action space, the reward function, and the state transition
//! for the ranking agent. The pure parts (`get_actions`, `reward`,
//! `next_state_from`) never block; the supplier-keyed variants resolve the
//! supplier's latest metrics through the [`MetricsSource`] first.
//!
//! ## Reward
//!
//! ```text
//! reward = base_scale × weighted_mean(level ordinals)      (state quality)
//!        + tier_match_reward − tier_distance_penalty × |tier − implied tier|
//! ```
//!
//! The implied tier comes from the supplier's overall score, so assigning a
//! high tier to a high scorer pays most and assigning it to a low scorer pays
//! least. Advisory actions earn a fixed bonus when their precondition holds
//! for the state and the same amount as a penalty when it does not.

use std::sync::Arc;
use std::time::Duration;

use supplyrank_common::{
    Action, Level, MetricComponent, MetricWeights, Metrics, RankTier, Result, State, SupplierId,
};
use tracing::{debug, warn};

use super::state_mapper::StateMapper;
use crate::config::{EnvironmentSettings, LookupSettings, RewardSettings};
use crate::infra::collaborators::{bounded, MetricsSource};

/// Environment for the supplier ranking agent
pub struct SupplierEnvironment {
    mapper: StateMapper,
    metrics: Arc<dyn MetricsSource>,
    settings: EnvironmentSettings,
    reward: RewardSettings,
    lookup_timeout: Duration,
}

impl SupplierEnvironment {
    pub fn new(
        metrics: Arc<dyn MetricsSource>,
        settings: EnvironmentSettings,
        reward: RewardSettings,
        lookup: LookupSettings,
    ) -> Self {
        Self {
            mapper: StateMapper::new(),
            metrics,
            settings,
            reward,
            lookup_timeout: lookup.timeout(),
        }
    }

    pub fn state_mapper(&self) -> &StateMapper {
        &self.mapper
    }

    pub fn metric_weights(&self) -> MetricWeights {
        self.settings.metric_weights
    }

    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Candidate actions for a state, in canonical order
    ///
    /// Rank tiers are always offered. Advisory actions are offered when
    /// enabled and their precondition holds.
    pub fn get_actions(&self, state: &State) -> Vec<Action> {
        let actions: Vec<Action> = Action::ALL
            .iter()
            .copied()
            .filter(|action| self.offers(*action, state))
            .collect();

        if actions.is_empty() {
            warn!(state = %state, "Computed action set is empty, falling back to rank tiers");
            return Action::rank_tiers();
        }
        actions
    }

    fn offers(&self, action: Action, state: &State) -> bool {
        if action.is_rank_assignment() {
            return true;
        }
        self.settings.advisory_actions && advisory_applies(action, state)
    }

    /// Immediate reward for assigning `action` to a supplier with `metrics` in `state`
    pub fn reward(&self, metrics: &Metrics, state: &State, action: Action) -> f64 {
        let base = self.base_reward(state);
        let adjustment = match action {
            Action::RankTier(tier) => {
                let implied = RankTier::for_score(metrics.overall_score());
                self.reward.tier_match_reward
                    - self.reward.tier_distance_penalty * f64::from(tier.distance(implied))
            }
            Action::IncreaseOrderVolume | Action::DecreaseOrderVolume => {
                signed(advisory_applies(action, state), self.reward.volume_adjustment)
            }
            Action::FlagForAudit
            | Action::RequestQualityImprovement
            | Action::RequestDeliveryImprovement => {
                signed(advisory_applies(action, state), self.reward.advisory_adjustment)
            }
        };
        base + adjustment
    }

    fn base_reward(&self, state: &State) -> f64 {
        let mean_level = self
            .settings
            .metric_weights
            .weighted_mean(|c| f64::from(level_of(state, c).ordinal()));
        self.reward.base_scale * mean_level
    }

    /// State after applying `action`
    ///
    /// Assigning a tier changes how a supplier is surfaced, not how it
    /// performs, so the next state is the one derived from its latest metrics.
    pub fn next_state_from(&self, metrics: &Metrics, _action: Action) -> Result<State> {
        self.mapper.get_state_from_metrics(metrics)
    }

    /// Latest metrics for a supplier, re-weighted with the configured weights
    pub async fn supplier_metrics(&self, supplier_id: SupplierId) -> Result<Metrics> {
        let metrics = bounded(
            self.lookup_timeout,
            "metrics lookup",
            self.metrics.calculate_combined_metrics(supplier_id),
        )
        .await?;
        metrics.with_weights(self.settings.metric_weights)
    }

    /// Current state of a supplier
    pub async fn get_state(&self, supplier_id: SupplierId) -> Result<State> {
        let metrics = self.supplier_metrics(supplier_id).await?;
        self.mapper.get_state_from_metrics(&metrics)
    }

    /// Reward for a supplier resolved through the metrics source
    pub async fn get_reward(
        &self,
        supplier_id: SupplierId,
        state: &State,
        action: Action,
    ) -> Result<f64> {
        let metrics = self.supplier_metrics(supplier_id).await?;
        let reward = self.reward(&metrics, state, action);
        debug!(
            supplier_id = %supplier_id,
            state = %state,
            action = %action,
            reward,
            "Calculated reward"
        );
        Ok(reward)
    }

    /// Next state for a supplier resolved through the metrics source
    pub async fn next_state(&self, supplier_id: SupplierId, action: Action) -> Result<State> {
        let metrics = self.supplier_metrics(supplier_id).await?;
        self.next_state_from(&metrics, action)
    }
}

/// Whether an advisory action fits a state
///
/// Rank tiers always apply.
pub fn advisory_applies(action: Action, state: &State) -> bool {
    let mean = state.mean_ordinal();
    match action {
        Action::RankTier(_) => true,
        Action::IncreaseOrderVolume => mean >= 2.5,
        Action::DecreaseOrderVolume => mean <= 1.5,
        Action::FlagForAudit => state.level_span() >= 2 || mean <= 1.25,
        Action::RequestQualityImprovement => state.quality == Level::Low,
        Action::RequestDeliveryImprovement => state.delivery == Level::Low,
    }
}

fn level_of(state: &State, component: MetricComponent) -> Level {
    match component {
        MetricComponent::Quality => state.quality,
        MetricComponent::Delivery => state.delivery,
        MetricComponent::Price => state.price,
        MetricComponent::Service => state.service,
    }
}

fn signed(applies: bool, amount: f64) -> f64 {
    if applies {
        amount
    } else {
        -amount
    }
}
