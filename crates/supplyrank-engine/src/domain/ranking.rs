//! Ranking results and score blending
//!
//! Ranking results are produced fresh for every query and never cached.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use supplyrank_common::{Action, Metrics, State, SupplierId};

use crate::config::RankingSettings;

/// One supplier's position in a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub city: Option<String>,
    pub state: State,
    /// Greedy action for the state
    pub action: Action,
    /// Stored Q-value of the chosen action (0.0 if never learned)
    pub q_value: f64,
    /// Writes applied to the chosen entry; 0 means never learned
    pub update_count: u64,
    /// Immediate reward of the chosen action
    pub reward: f64,
    /// Raw overall metric score
    pub metric_score: f64,
    /// Blended ranking score
    pub overall_score: f64,
    pub metrics: Metrics,
}

/// Blends learned value and raw performance into one score
#[derive(Debug, Clone, Copy)]
pub struct ScoreBlender {
    settings: RankingSettings,
}

impl ScoreBlender {
    pub fn new(settings: RankingSettings) -> Self {
        Self { settings }
    }

    /// Map a Q-value onto (-10, 10), strictly increasing
    pub fn q_component(&self, q_value: f64) -> f64 {
        10.0 * q_value / (q_value.abs() + self.settings.q_scale)
    }

    /// Ranking score; non-decreasing in both inputs
    pub fn score(&self, q_value: f64, metric_score: f64) -> f64 {
        self.settings.metric_weight * metric_score
            + self.settings.q_weight * self.q_component(q_value)
    }
}

/// Descending score, then ascending supplier id
pub fn ranking_order(a: &RankingResult, b: &RankingResult) -> Ordering {
    OrderedFloat(b.overall_score)
        .cmp(&OrderedFloat(a.overall_score))
        .then_with(|| a.supplier_id.cmp(&b.supplier_id))
}

/// Sort results into ranking order
pub fn sort_rankings(results: &mut [RankingResult]) {
    results.sort_by(ranking_order);
}
