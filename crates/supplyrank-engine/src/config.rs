//! SupplyRank engine configuration
//!
//! Loaded once at startup and never mutated afterwards. Components receive
//! the sections they need by value.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use supplyrank_common::MetricWeights;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_VAR: &str = "SUPPLYRANK_CONFIG";

/// Prefix for environment overrides, e.g. `SUPPLYRANK_LEARNING__LEARNING_RATE`
pub const ENV_PREFIX: &str = "SUPPLYRANK";

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Q-learning parameters
    pub learning: LearningSettings,
    /// Reward shaping coefficients
    pub reward: RewardSettings,
    /// Ranking score blend
    pub ranking: RankingSettings,
    /// Action space and metric weighting
    pub environment: EnvironmentSettings,
    /// QTable persistence
    pub storage: StorageSettings,
    /// Batch training run settings
    pub training: TrainingSettings,
    /// Collaborator call budget
    pub lookup: LookupSettings,
}

impl EngineConfig {
    /// Load configuration from `.env`, an optional file, and the environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: EngineConfig = builder
            .build()
            .context("failed to read configuration sources")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every parameter is inside its legal range
    pub fn validate(&self) -> Result<()> {
        self.learning.validate()?;
        self.ranking.validate()?;
        self.environment
            .metric_weights
            .validate()
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        ensure!(self.lookup.timeout_ms > 0, "lookup.timeout_ms must be positive");
        Ok(())
    }
}

/// Q-learning parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSettings {
    /// Alpha, in (0, 1]
    pub learning_rate: f64,
    /// Gamma, in [0, 1]
    pub discount_factor: f64,
    /// Epsilon for batch training, in [0, 1]
    pub exploration_rate: f64,
    /// Floor for the decayed epsilon
    pub min_exploration_rate: f64,
    /// Linearly decay epsilon across a training run
    pub decay_exploration: bool,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.3,
            min_exploration_rate: 0.05,
            decay_exploration: true,
        }
    }
}

impl LearningSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.learning_rate > 0.0 && self.learning_rate <= 1.0,
            "learning_rate must be in (0, 1], got {}",
            self.learning_rate
        );
        ensure!(
            (0.0..=1.0).contains(&self.discount_factor),
            "discount_factor must be in [0, 1], got {}",
            self.discount_factor
        );
        ensure!(
            (0.0..=1.0).contains(&self.exploration_rate),
            "exploration_rate must be in [0, 1], got {}",
            self.exploration_rate
        );
        ensure!(
            (0.0..=1.0).contains(&self.min_exploration_rate),
            "min_exploration_rate must be in [0, 1], got {}",
            self.min_exploration_rate
        );
        Ok(())
    }

    /// Epsilon for iteration `i` of a run of `iterations`
    pub fn epsilon_at(&self, i: usize, iterations: usize) -> f64 {
        if !self.decay_exploration || iterations == 0 {
            return self.exploration_rate;
        }
        let progress = i as f64 / iterations as f64;
        (self.exploration_rate * (1.0 - progress)).max(self.min_exploration_rate)
    }
}

/// Reward shaping coefficients
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
    /// Multiplier on the weighted mean level ordinal
    pub base_scale: f64,
    /// Adjustment when the assigned tier matches the implied tier
    pub tier_match_reward: f64,
    /// Deducted per tier of distance from the implied tier
    pub tier_distance_penalty: f64,
    /// +/- adjustment for order volume recommendations
    pub volume_adjustment: f64,
    /// +/- adjustment for audit and improvement requests
    pub advisory_adjustment: f64,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            base_scale: 2.0,
            tier_match_reward: 5.0,
            tier_distance_penalty: 2.5,
            volume_adjustment: 3.0,
            advisory_adjustment: 2.0,
        }
    }
}

/// Ranking score blend
///
/// score = metric_weight x overall + q_weight x 10 x q / (|q| + q_scale)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    pub metric_weight: f64,
    pub q_weight: f64,
    pub q_scale: f64,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            metric_weight: 0.7,
            q_weight: 0.3,
            q_scale: 50.0,
        }
    }
}

impl RankingSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.metric_weight >= 0.0 && self.q_weight >= 0.0,
            "ranking weights must be non-negative"
        );
        ensure!(self.q_scale > 0.0, "ranking.q_scale must be positive");
        Ok(())
    }
}

/// Action space and metric weighting
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub metric_weights: MetricWeights,
    /// Offer advisory actions alongside the rank tiers
    pub advisory_actions: bool,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            metric_weights: MetricWeights::default(),
            advisory_actions: true,
        }
    }
}

/// QTable persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Snapshot file restored at startup and written at shutdown
    pub snapshot_path: Option<PathBuf>,
}

/// Batch training run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub iterations: usize,
    /// Supplier fixture used by the binary
    pub fixture_path: Option<PathBuf>,
    /// Seed for exploration; entropy when absent
    pub seed: Option<u64>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            iterations: 100,
            fixture_path: None,
            seed: None,
        }
    }
}

/// Collaborator call budget
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    pub timeout_ms: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl LookupSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
