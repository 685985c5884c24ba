//! Batch training statistics

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use supplyrank_common::SupplierId;
use uuid::Uuid;

/// Summary of one batch training run
///
/// Iterations fail independently; a run with failures is still a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStats {
    pub run_id: Uuid,
    pub iterations: usize,
    /// Suppliers eligible for sampling
    pub suppliers_available: usize,
    /// Distinct suppliers with at least one successful update
    pub suppliers_trained: usize,
    pub successful_updates: usize,
    pub failed_updates: usize,
    pub avg_reward: f64,
    pub min_reward: Option<f64>,
    pub max_reward: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    trained: BTreeSet<SupplierId>,
    #[serde(skip)]
    reward_sum: f64,
}

impl TrainingStats {
    pub fn start(iterations: usize, suppliers_available: usize) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            iterations,
            suppliers_available,
            suppliers_trained: 0,
            successful_updates: 0,
            failed_updates: 0,
            avg_reward: 0.0,
            min_reward: None,
            max_reward: None,
            started_at: Utc::now(),
            finished_at: None,
            trained: BTreeSet::new(),
            reward_sum: 0.0,
        }
    }

    pub fn record_success(&mut self, supplier_id: SupplierId, reward: f64) {
        self.successful_updates += 1;
        self.trained.insert(supplier_id);
        self.suppliers_trained = self.trained.len();
        self.reward_sum += reward;
        self.avg_reward = self.reward_sum / self.successful_updates as f64;
        self.min_reward = Some(self.min_reward.map_or(reward, |m| m.min(reward)));
        self.max_reward = Some(self.max_reward.map_or(reward, |m| m.max(reward)));
    }

    pub fn record_failure(&mut self) {
        self.failed_updates += 1;
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}
