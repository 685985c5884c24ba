//! Discretized supplier performance states
//!
//! A [`State`] bins each component score into one of three [`Level`]s. The
//! thresholds are part of the persisted schema: learned values are keyed by
//! state name, so moving a threshold silently re-labels every stored entry.
//! Any change to them must bump [`STATE_SCHEMA_VERSION`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RankingError;

/// Scores below this are `Low`
pub const LOW_UPPER_BOUND: f64 = 4.0;

/// Scores at or above this are `High`
pub const HIGH_LOWER_BOUND: f64 = 7.5;

/// Version of the state binning schema
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Number of reachable states (3 levels, 4 components)
pub const STATE_COUNT: usize = 81;

/// Discrete performance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    /// Bin a score into a level
    pub fn from_score(score: f64) -> Self {
        if score < LOW_UPPER_BOUND {
            Level::Low
        } else if score < HIGH_LOWER_BOUND {
            Level::Medium
        } else {
            Level::High
        }
    }

    /// Ordinal 1..=3, used in state names and reward shaping
    pub fn ordinal(&self) -> u8 {
        match self {
            Level::Low => 1,
            Level::Medium => 2,
            Level::High => 3,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(Level::Low),
            2 => Some(Level::Medium),
            3 => Some(Level::High),
            _ => None,
        }
    }
}

/// Discretized performance profile of a supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct State {
    pub quality: Level,
    pub delivery: Level,
    pub price: Level,
    pub service: Level,
}

impl State {
    pub fn new(quality: Level, delivery: Level, price: Level, service: Level) -> Self {
        Self {
            quality,
            delivery,
            price,
            service,
        }
    }

    /// Every reachable state, in name order
    pub fn all() -> Vec<State> {
        let mut states = Vec::with_capacity(STATE_COUNT);
        for quality in Level::ALL {
            for delivery in Level::ALL {
                for price in Level::ALL {
                    for service in Level::ALL {
                        states.push(State::new(quality, delivery, price, service));
                    }
                }
            }
        }
        states
    }

    /// Levels in component order (quality, delivery, price, service)
    pub fn levels(&self) -> [Level; 4] {
        [self.quality, self.delivery, self.price, self.service]
    }

    /// Mean level ordinal, in [1, 3]
    pub fn mean_ordinal(&self) -> f64 {
        self.levels().iter().map(|l| f64::from(l.ordinal())).sum::<f64>() / 4.0
    }

    /// Distance between the best and worst component level
    pub fn level_span(&self) -> u8 {
        let ordinals = self.levels().map(|l| l.ordinal());
        let max = ordinals.iter().copied().max().unwrap_or(1);
        let min = ordinals.iter().copied().min().unwrap_or(1);
        max - min
    }

    /// Canonical name, e.g. `Q3_D3_P2_S3`
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Q{}_D{}_P{}_S{}",
            self.quality.ordinal(),
            self.delivery.ordinal(),
            self.price.ordinal(),
            self.service.ordinal()
        )
    }
}

impl FromStr for State {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RankingError::InvalidMetrics(format!("malformed state name: {}", s));

        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }

        let mut levels = [Level::Low; 4];
        for (slot, (part, prefix)) in levels
            .iter_mut()
            .zip(parts.iter().zip(['Q', 'D', 'P', 'S']))
        {
            let ordinal = part
                .strip_prefix(prefix)
                .and_then(|n| n.parse::<u8>().ok())
                .ok_or_else(invalid)?;
            *slot = Level::from_ordinal(ordinal).ok_or_else(invalid)?;
        }

        Ok(State::new(levels[0], levels[1], levels[2], levels[3]))
    }
}

impl TryFrom<String> for State {
    type Error = RankingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<State> for String {
    fn from(state: State) -> Self {
        state.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(Level::from_score(1.0), Level::Low);
        assert_eq!(Level::from_score(3.99), Level::Low);
        assert_eq!(Level::from_score(4.0), Level::Medium);
        assert_eq!(Level::from_score(7.49), Level::Medium);
        assert_eq!(Level::from_score(7.5), Level::High);
        assert_eq!(Level::from_score(10.0), Level::High);
    }

    #[test]
    fn test_state_name_roundtrip() {
        let state = State::new(Level::High, Level::High, Level::Medium, Level::High);
        assert_eq!(state.name(), "Q3_D3_P2_S3");
        assert_eq!("Q3_D3_P2_S3".parse::<State>().unwrap(), state);
    }

    #[test]
    fn test_malformed_names_rejected() {
        for bad in ["", "Q3_D3_P2", "Q4_D1_P1_S1", "D1_Q1_P1_S1", "Q1_D1_P1_Sx"] {
            assert!(bad.parse::<State>().is_err(), "{} should not parse", bad);
        }
    }

    #[test]
    fn test_all_states_unique_and_bounded() {
        let states = State::all();
        assert_eq!(states.len(), STATE_COUNT);
        let names: HashSet<String> = states.iter().map(State::name).collect();
        assert_eq!(names.len(), STATE_COUNT);
    }

    #[test]
    fn test_span_and_mean() {
        let state = State::new(Level::Low, Level::High, Level::Medium, Level::Medium);
        assert_eq!(state.level_span(), 2);
        assert!((state.mean_ordinal() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_uses_name() {
        let state = State::new(Level::Low, Level::Medium, Level::High, Level::Low);
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"Q1_D2_P3_S1\"");
    }

    proptest! {
        #[test]
        fn prop_level_binning_is_monotonic(a in 1.0f64..=10.0, b in 1.0f64..=10.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(Level::from_score(lo) <= Level::from_score(hi));
        }

        #[test]
        fn prop_state_name_round_trips(index in 0usize..STATE_COUNT) {
            let state = State::all()[index];
            let parsed: State = state.name().parse().unwrap();
            prop_assert_eq!(parsed, state);
        }
    }
}
