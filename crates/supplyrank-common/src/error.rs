//! Error types for SupplyRank
//!
//! Provides a unified error type covering the ranking core's failure taxonomy

use thiserror::Error;

use crate::types::supplier::SupplierId;

/// Result type alias using RankingError
pub type Result<T> = std::result::Result<T, RankingError>;

/// Unified error type for ranking operations
///
/// Every variant is fatal to the single operation that raised it. Batch
/// training is the only caller that recovers (skip-and-continue).
#[derive(Debug, Error)]
pub enum RankingError {
    // Malformed or out-of-range metric input
    #[error("Invalid metrics: {0}")]
    InvalidMetrics(String),

    // Supplier could not be resolved by a collaborator
    #[error("Unknown supplier: {0}")]
    UnknownSupplier(SupplierId),

    // Environment returned no actions for a reachable state
    #[error("No candidate actions for state {0}")]
    NoCandidateActions(String),

    // QTable medium unreachable or unreadable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    // Collaborator call exceeded its budget
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RankingError {
    /// Stable, machine-readable kind for user-facing reports
    pub fn kind(&self) -> &'static str {
        match self {
            RankingError::InvalidMetrics(_) => "InvalidMetrics",
            RankingError::UnknownSupplier(_) => "UnknownSupplier",
            RankingError::NoCandidateActions(_) => "NoCandidateActions",
            RankingError::StorageUnavailable(_) => "StorageUnavailable",
            RankingError::Timeout(_) => "Timeout",
            RankingError::Config(_) => "Config",
        }
    }
}

impl From<serde_json::Error> for RankingError {
    fn from(err: serde_json::Error) -> Self {
        RankingError::StorageUnavailable(format!("serialization failed: {}", err))
    }
}

impl From<std::io::Error> for RankingError {
    fn from(err: std::io::Error) -> Self {
        RankingError::StorageUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for RankingError {
    fn from(err: anyhow::Error) -> Self {
        RankingError::Config(err.to_string())
    }
}
