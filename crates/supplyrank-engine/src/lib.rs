//! # SupplyRank Engine
//!
//! Q-learning core for ranking suppliers by performance.
//!
//! Supplier metrics are discretized into one of 81 states. For each
//! (state, action) pair the agent learns a value from two sources: explicit
//! delivery feedback and batch replays of the latest metrics with
//! epsilon-greedy exploration. Rankings exploit what was learned and never
//! write to the QTable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     RankingAgent                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐      │
//! │  │  Feedback   │  │    Batch    │  │   Ranking   │      │
//! │  │  Learning   │  │  Training   │  │  (exploit)  │      │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘      │
//! │         │                │                │             │
//! │  ┌──────┴────────────────┴────────────────┴──────┐      │
//! │  │             SupplierEnvironment               │      │
//! │  │   (StateMapper, actions, reward, transition)  │      │
//! │  └──────────────────────┬────────────────────────┘      │
//! │                         │                               │
//! │  ┌──────────────────────┴────────────────────────┐      │
//! │  │                  QTableStore                  │      │
//! │  │     (per-key atomic updates + snapshots)      │      │
//! │  └───────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Supplier records, metrics and product listings come from collaborator
//! traits in [`infra::collaborators`].

pub mod config;
pub mod domain;
pub mod infra;

// Re-export core types
pub use config::EngineConfig;
pub use domain::agent::{
    ActionValue, Collaborators, FeedbackOutcome, LearningStep, QTableExport, RankingAgent,
    SupplierQValues,
};
pub use domain::environment::SupplierEnvironment;
pub use domain::ranking::{RankingResult, ScoreBlender};
pub use domain::state_mapper::StateMapper;
pub use domain::training::TrainingStats;

// Re-export infrastructure
pub use infra::collaborators::{
    InMemorySupplierRegistry, MetricsSource, SupplierCatalog, SupplierDirectory,
};
pub use infra::fixture::SupplierFixture;
pub use infra::qtable::{
    BellmanUpdate, InMemoryQTable, QKey, QTableEntry, QTableFilter, QTableStore, StoreError,
};
pub use infra::snapshot::{QTableSnapshot, SnapshotFile};

pub use supplyrank_common::VERSION;

/// Fixture loaded by the binary when none is configured
pub const DEFAULT_FIXTURE_PATH: &str = "crates/supplyrank-engine/fixtures/suppliers.json";
