//! Action vocabulary
//!
//! Five rank tiers, from Preferred down to Not Recommended, followed by the
//! advisory actions. The order of [`Action::ALL`] is canonical: greedy
//! selection breaks Q-value ties by the lowest index in it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RankingError;

/// Rank tier, 1 (Preferred) to 5 (Not Recommended)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankTier {
    Preferred,
    Approved,
    Conditional,
    Probationary,
    NotRecommended,
}

impl RankTier {
    pub const ALL: [RankTier; 5] = [
        RankTier::Preferred,
        RankTier::Approved,
        RankTier::Conditional,
        RankTier::Probationary,
        RankTier::NotRecommended,
    ];

    /// Tier number, 1..=5
    pub fn number(&self) -> u8 {
        match self {
            RankTier::Preferred => 1,
            RankTier::Approved => 2,
            RankTier::Conditional => 3,
            RankTier::Probationary => 4,
            RankTier::NotRecommended => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(RankTier::Preferred),
            2 => Some(RankTier::Approved),
            3 => Some(RankTier::Conditional),
            4 => Some(RankTier::Probationary),
            5 => Some(RankTier::NotRecommended),
            _ => None,
        }
    }

    /// Tier implied by an overall score
    pub fn for_score(overall: f64) -> Self {
        match overall {
            s if s >= 8.0 => RankTier::Preferred,
            s if s >= 6.5 => RankTier::Approved,
            s if s >= 5.0 => RankTier::Conditional,
            s if s >= 3.5 => RankTier::Probationary,
            _ => RankTier::NotRecommended,
        }
    }

    /// Number of tiers between two tiers
    pub fn distance(&self, other: RankTier) -> u8 {
        self.number().abs_diff(other.number())
    }

    pub fn label(&self) -> &'static str {
        match self {
            RankTier::Preferred => "Preferred",
            RankTier::Approved => "Approved",
            RankTier::Conditional => "Conditional",
            RankTier::Probationary => "Probationary",
            RankTier::NotRecommended => "Not Recommended",
        }
    }
}

/// A decision the agent can assign to a supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    RankTier(RankTier),
    IncreaseOrderVolume,
    DecreaseOrderVolume,
    FlagForAudit,
    RequestQualityImprovement,
    RequestDeliveryImprovement,
}

impl Action {
    /// Full vocabulary in canonical order
    pub const ALL: [Action; 10] = [
        Action::RankTier(RankTier::Preferred),
        Action::RankTier(RankTier::Approved),
        Action::RankTier(RankTier::Conditional),
        Action::RankTier(RankTier::Probationary),
        Action::RankTier(RankTier::NotRecommended),
        Action::IncreaseOrderVolume,
        Action::DecreaseOrderVolume,
        Action::FlagForAudit,
        Action::RequestQualityImprovement,
        Action::RequestDeliveryImprovement,
    ];

    /// The rank-tier actions, in canonical order
    pub fn rank_tiers() -> Vec<Action> {
        RankTier::ALL.iter().map(|t| Action::RankTier(*t)).collect()
    }

    /// Position in [`Action::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Action::RankTier(tier) => usize::from(tier.number() - 1),
            Action::IncreaseOrderVolume => 5,
            Action::DecreaseOrderVolume => 6,
            Action::FlagForAudit => 7,
            Action::RequestQualityImprovement => 8,
            Action::RequestDeliveryImprovement => 9,
        }
    }

    /// The tier this action assigns, if it is a rank assignment
    pub fn rank_tier(&self) -> Option<RankTier> {
        match self {
            Action::RankTier(tier) => Some(*tier),
            _ => None,
        }
    }

    pub fn is_rank_assignment(&self) -> bool {
        self.rank_tier().is_some()
    }

    /// Canonical name, e.g. `RANK_TIER_1`
    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn description(&self) -> String {
        match self {
            Action::RankTier(tier) => {
                format!("Rank the supplier as Tier {} ({})", tier.number(), tier.label())
            }
            Action::IncreaseOrderVolume => {
                "Recommend increasing order volume with this supplier".to_string()
            }
            Action::DecreaseOrderVolume => {
                "Recommend decreasing order volume with this supplier".to_string()
            }
            Action::FlagForAudit => "Flag supplier for audit due to concerns".to_string(),
            Action::RequestQualityImprovement => {
                "Request supplier to improve quality".to_string()
            }
            Action::RequestDeliveryImprovement => {
                "Request supplier to improve delivery performance".to_string()
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RankTier(tier) => write!(f, "RANK_TIER_{}", tier.number()),
            Action::IncreaseOrderVolume => f.write_str("INCREASE_ORDER_VOLUME"),
            Action::DecreaseOrderVolume => f.write_str("DECREASE_ORDER_VOLUME"),
            Action::FlagForAudit => f.write_str("FLAG_FOR_AUDIT"),
            Action::RequestQualityImprovement => f.write_str("REQUEST_QUALITY_IMPROVEMENT"),
            Action::RequestDeliveryImprovement => f.write_str("REQUEST_DELIVERY_IMPROVEMENT"),
        }
    }
}

impl FromStr for Action {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(number) = s.strip_prefix("RANK_TIER_") {
            return number
                .parse::<u8>()
                .ok()
                .and_then(RankTier::from_number)
                .map(Action::RankTier)
                .ok_or_else(|| RankingError::Config(format!("unknown action: {}", s)));
        }

        match s {
            "INCREASE_ORDER_VOLUME" => Ok(Action::IncreaseOrderVolume),
            "DECREASE_ORDER_VOLUME" => Ok(Action::DecreaseOrderVolume),
            "FLAG_FOR_AUDIT" => Ok(Action::FlagForAudit),
            "REQUEST_QUALITY_IMPROVEMENT" => Ok(Action::RequestQualityImprovement),
            "REQUEST_DELIVERY_IMPROVEMENT" => Ok(Action::RequestDeliveryImprovement),
            _ => Err(RankingError::Config(format!("unknown action: {}", s))),
        }
    }
}

impl TryFrom<String> for Action {
    type Error = RankingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}
