//! Supplier performance metrics
//!
//! Four component scores, each bounded to [1.0, 10.0], and an overall score
//! that is always derived from them. The overall score is computed on read,
//! so it can never drift from its inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::supplier::SupplierId;
use crate::error::{RankingError, Result};

/// Lowest valid component score
pub const MIN_SCORE: f64 = 1.0;

/// Highest valid component score
pub const MAX_SCORE: f64 = 10.0;

/// Price score used when feedback carries no price signal
pub const DEFAULT_PRICE_SCORE: f64 = 7.0;

/// Delivery time assumed when feedback omits it
pub const DEFAULT_DELIVERY_DAYS: f64 = 1.0;

/// Service points deducted per reported issue
pub const SERVICE_PENALTY_PER_ISSUE: f64 = 2.0;

/// One of the four component scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricComponent {
    Quality,
    Delivery,
    Price,
    Service,
}

impl MetricComponent {
    pub const ALL: [MetricComponent; 4] = [
        MetricComponent::Quality,
        MetricComponent::Delivery,
        MetricComponent::Price,
        MetricComponent::Service,
    ];

    pub fn field_name(&self) -> &'static str {
        match self {
            MetricComponent::Quality => "quality_score",
            MetricComponent::Delivery => "delivery_score",
            MetricComponent::Price => "price_score",
            MetricComponent::Service => "service_score",
        }
    }
}

impl fmt::Display for MetricComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Weights for the overall score
///
/// The overall score is the weighted mean of the components, so the weights
/// need not sum to one; they only need a positive total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub quality: f64,
    pub delivery: f64,
    pub price: f64,
    pub service: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            quality: 0.25,
            delivery: 0.25,
            price: 0.25,
            service: 0.25,
        }
    }
}

impl MetricWeights {
    /// Weight of a single component
    pub fn weight(&self, component: MetricComponent) -> f64 {
        match component {
            MetricComponent::Quality => self.quality,
            MetricComponent::Delivery => self.delivery,
            MetricComponent::Price => self.price,
            MetricComponent::Service => self.service,
        }
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.quality + self.delivery + self.price + self.service
    }

    /// Reject negative, non-finite, or all-zero weights
    pub fn validate(&self) -> Result<()> {
        for component in MetricComponent::ALL {
            let w = self.weight(component);
            if !w.is_finite() || w < 0.0 {
                return Err(RankingError::Config(format!(
                    "weight for {} must be a non-negative number, got {}",
                    component, w
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(RankingError::Config(
                "metric weights must have a positive total".to_string(),
            ));
        }
        Ok(())
    }

    /// Weighted mean of per-component values
    pub fn weighted_mean(&self, value: impl Fn(MetricComponent) -> f64) -> f64 {
        let sum: f64 = MetricComponent::ALL
            .iter()
            .map(|c| self.weight(*c) * value(*c))
            .sum();
        sum / self.total()
    }
}

/// Validated supplier metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetricsRecord", into = "MetricsRecord")]
pub struct Metrics {
    quality_score: f64,
    delivery_score: f64,
    price_score: f64,
    service_score: f64,
    weights: MetricWeights,
}

impl Metrics {
    /// Create metrics from in-range scores with equal weights
    ///
    /// Fails with `InvalidMetrics` if any score is outside [1, 10] or not a number.
    pub fn new(quality: f64, delivery: f64, price: f64, service: f64) -> Result<Self> {
        let metrics = Self {
            quality_score: quality,
            delivery_score: delivery,
            price_score: price,
            service_score: service,
            weights: MetricWeights::default(),
        };
        metrics.validate()?;
        Ok(metrics)
    }

    /// Create metrics, clamping every score into [1, 10]
    ///
    /// Only non-numeric input fails; clamping cannot repair NaN.
    pub fn clamped(quality: f64, delivery: f64, price: f64, service: f64) -> Result<Self> {
        Self::new(
            clamp_score(quality),
            clamp_score(delivery),
            clamp_score(price),
            clamp_score(service),
        )
    }

    /// Replace the overall-score weights
    pub fn with_weights(mut self, weights: MetricWeights) -> Result<Self> {
        weights.validate()?;
        self.weights = weights;
        Ok(self)
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn delivery_score(&self) -> f64 {
        self.delivery_score
    }

    pub fn price_score(&self) -> f64 {
        self.price_score
    }

    pub fn service_score(&self) -> f64 {
        self.service_score
    }

    pub fn weights(&self) -> &MetricWeights {
        &self.weights
    }

    /// Score of one component
    pub fn component(&self, component: MetricComponent) -> f64 {
        match component {
            MetricComponent::Quality => self.quality_score,
            MetricComponent::Delivery => self.delivery_score,
            MetricComponent::Price => self.price_score,
            MetricComponent::Service => self.service_score,
        }
    }

    /// Replace one component score; the overall score follows automatically
    pub fn set_component(&mut self, component: MetricComponent, value: f64) -> Result<()> {
        validate_score(component, value)?;
        match component {
            MetricComponent::Quality => self.quality_score = value,
            MetricComponent::Delivery => self.delivery_score = value,
            MetricComponent::Price => self.price_score = value,
            MetricComponent::Service => self.service_score = value,
        }
        Ok(())
    }

    /// Weighted average of the four components
    pub fn overall_score(&self) -> f64 {
        self.weights.weighted_mean(|c| self.component(c))
    }

    /// Check every component is a number in [1, 10]
    pub fn validate(&self) -> Result<()> {
        for component in MetricComponent::ALL {
            validate_score(component, self.component(component))?;
        }
        Ok(())
    }
}

fn clamp_score(value: f64) -> f64 {
    // NaN passes through clamp unchanged and is rejected by validation
    value.clamp(MIN_SCORE, MAX_SCORE)
}

fn validate_score(component: MetricComponent, value: f64) -> Result<()> {
    if value.is_nan() {
        return Err(RankingError::InvalidMetrics(format!(
            "{} is not a number",
            component
        )));
    }
    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
        return Err(RankingError::InvalidMetrics(format!(
            "{} {} outside [{}, {}]",
            component, value, MIN_SCORE, MAX_SCORE
        )));
    }
    Ok(())
}

/// Wire shape of [`Metrics`]
///
/// Components are optional on input so that a missing field is reported as
/// `InvalidMetrics` rather than a generic parse failure. `overall_score` is
/// written on output and ignored on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub delivery_score: Option<f64>,
    #[serde(default)]
    pub price_score: Option<f64>,
    #[serde(default)]
    pub service_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<MetricWeights>,
    #[serde(default, skip_deserializing)]
    pub overall_score: Option<f64>,
}

impl TryFrom<MetricsRecord> for Metrics {
    type Error = RankingError;

    fn try_from(record: MetricsRecord) -> Result<Self> {
        let require = |value: Option<f64>, component: MetricComponent| {
            value.ok_or_else(|| RankingError::InvalidMetrics(format!("{} is missing", component)))
        };
        let metrics = Metrics::new(
            require(record.quality_score, MetricComponent::Quality)?,
            require(record.delivery_score, MetricComponent::Delivery)?,
            require(record.price_score, MetricComponent::Price)?,
            require(record.service_score, MetricComponent::Service)?,
        )?;
        match record.weights {
            Some(weights) => metrics.with_weights(weights),
            None => Ok(metrics),
        }
    }
}

impl From<Metrics> for MetricsRecord {
    fn from(metrics: Metrics) -> Self {
        Self {
            quality_score: Some(metrics.quality_score),
            delivery_score: Some(metrics.delivery_score),
            price_score: Some(metrics.price_score),
            service_score: Some(metrics.service_score),
            weights: Some(metrics.weights),
            overall_score: Some(metrics.overall_score()),
        }
    }
}

/// Raw performance feedback for one delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub supplier_id: SupplierId,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// Quality rating on a 0..1 scale
    pub quality_rating: f64,
    #[serde(default)]
    pub delivery_time_days: Option<f64>,
    #[serde(default)]
    pub issues: u32,
}

impl Feedback {
    pub fn new(supplier_id: SupplierId, quality_rating: f64) -> Self {
        Self {
            supplier_id,
            product_id: None,
            city: None,
            quality_rating,
            delivery_time_days: None,
            issues: 0,
        }
    }

    pub fn with_delivery_days(mut self, days: f64) -> Self {
        self.delivery_time_days = Some(days);
        self
    }

    pub fn with_issues(mut self, issues: u32) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Normalize the feedback into clamped metrics
    ///
    /// quality = rating x 10, delivery = 10 - min(days, 10),
    /// price = [`DEFAULT_PRICE_SCORE`], service = 10 - 2 x issues.
    pub fn to_metrics(&self, weights: MetricWeights) -> Result<Metrics> {
        // Zero days is treated like a missing value
        let days = match self.delivery_time_days {
            Some(days) if days != 0.0 => days,
            _ => DEFAULT_DELIVERY_DAYS,
        };
        if !days.is_finite() {
            return Err(RankingError::InvalidMetrics(format!(
                "delivery_time_days {} is not a finite number",
                days
            )));
        }

        Metrics::clamped(
            self.quality_rating * 10.0,
            MAX_SCORE - days.min(MAX_SCORE),
            DEFAULT_PRICE_SCORE,
            MAX_SCORE - f64::from(self.issues) * SERVICE_PENALTY_PER_ISSUE,
        )?
        .with_weights(weights)
    }
}
