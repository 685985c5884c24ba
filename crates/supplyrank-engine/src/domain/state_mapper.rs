//! Metrics to state mapping
//!
//! Pure and deterministic: the same metrics always map to the same state,
//! across calls and across restarts. The binning thresholds live in
//! `supplyrank_common::types::state` and are versioned with the snapshot schema.

use supplyrank_common::{Level, Metrics, Result, State};

/// Maps validated metrics to a discrete [`State`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMapper;

impl StateMapper {
    pub fn new() -> Self {
        Self
    }

    /// Bin quality, delivery, price and service into levels
    ///
    /// Fails with `InvalidMetrics` if any component is missing or outside [1, 10].
    pub fn get_state_from_metrics(&self, metrics: &Metrics) -> Result<State> {
        metrics.validate()?;

        Ok(State::new(
            Level::from_score(metrics.quality_score()),
            Level::from_score(metrics.delivery_score()),
            Level::from_score(metrics.price_score()),
            Level::from_score(metrics.service_score()),
        ))
    }
}
