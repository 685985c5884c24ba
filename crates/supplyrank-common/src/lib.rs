//! # SupplyRank Common
//!
//! Shared types and errors for the SupplyRank supplier ranking engine.
//!
//! ## Core Types
//!
//! - [`Metrics`]: four bounded component scores and their derived overall score
//! - [`Feedback`]: raw delivery feedback, normalized into [`Metrics`]
//! - [`State`]: discretized performance profile (3 levels per component)
//! - [`Action`]: rank tiers plus advisory actions, in canonical order
//! - [`SupplierRecord`]: directory record with name and city fallback chains
//!
//! ## Errors
//!
//! - [`RankingError`]: the failure taxonomy shared by every engine operation

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{RankingError, Result};
pub use types::{
    action::{Action, RankTier},
    metrics::{Feedback, MetricComponent, MetricWeights, Metrics, MetricsRecord},
    state::{Level, State, STATE_COUNT, STATE_SCHEMA_VERSION},
    supplier::{SupplierId, SupplierRecord, SupplierUser},
};

/// SupplyRank version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lowest valid component score
pub const MIN_SCORE: f64 = types::metrics::MIN_SCORE;

/// Highest valid component score
pub const MAX_SCORE: f64 = types::metrics::MAX_SCORE;
