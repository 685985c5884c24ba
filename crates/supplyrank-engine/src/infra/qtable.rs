//! QTable Storage
//!
//! Persistent value store mapping (state, action) to a learned value and an
//! update count. Entries are created lazily on first write and never deleted
//! by the learning core.
//!
//! Every write is a read-modify-write over the currently stored value, done
//! atomically per key. Concurrent updates to the same key serialize; updates
//! to different keys do not wait on each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use supplyrank_common::{Action, RankingError, State};

/// Identity of a QTable entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QKey {
    pub state: State,
    pub action: Action,
}

impl QKey {
    pub fn new(state: State, action: Action) -> Self {
        Self { state, action }
    }
}

/// Learned value for one (state, action) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableEntry {
    pub state: State,
    pub action: Action,
    pub value: f64,
    /// Number of writes applied; zero only for entries never written
    pub update_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl QTableEntry {
    fn fresh(key: QKey) -> Self {
        Self {
            state: key.state,
            action: key.action,
            value: 0.0,
            update_count: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> QKey {
        QKey::new(self.state, self.action)
    }
}

/// One application of the Q-learning rule
///
/// `new_q = old_q + alpha * (reward + gamma * max_next_q - old_q)`
///
/// The lookahead is split in two: the best value among the next state's
/// other candidates, read before the write, and the updated key's own value
/// when it is one of those candidates. The latter is `old_q`, read under the
/// key's lock, so a self-loop never learns from a stale copy of itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BellmanUpdate {
    pub reward: f64,
    /// Best stored value among the next state's candidates other than the
    /// updated key; `None` when there are no such candidates
    pub max_next_q: Option<f64>,
    /// The updated key is itself a candidate of the next state
    pub next_includes_key: bool,
    pub learning_rate: f64,
    pub discount_factor: f64,
}

impl BellmanUpdate {
    /// Max over the next state's candidates given the key's current value
    pub fn lookahead(&self, old_q: f64) -> f64 {
        match (self.max_next_q, self.next_includes_key) {
            (Some(other), true) => other.max(old_q),
            (Some(other), false) => other,
            (None, true) => old_q,
            (None, false) => 0.0,
        }
    }

    pub fn apply(&self, old_q: f64) -> f64 {
        old_q
            + self.learning_rate
                * (self.reward + self.discount_factor * self.lookahead(old_q) - old_q)
    }
}

/// Filter for administrative export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QTableFilter {
    /// Substring of the state name
    pub state_contains: Option<String>,
    /// Substring of the action name
    pub action_contains: Option<String>,
    /// Minimum value, inclusive
    pub min_value: Option<f64>,
    /// Result cap
    pub limit: Option<usize>,
}

impl QTableFilter {
    pub fn matches(&self, entry: &QTableEntry) -> bool {
        if let Some(fragment) = &self.state_contains {
            if !entry.state.name().contains(fragment.as_str()) {
                return false;
            }
        }
        if let Some(fragment) = &self.action_contains {
            if !entry.action.name().contains(fragment.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_value {
            if entry.value < min {
                return false;
            }
        }
        true
    }

    /// Filter, order by descending value (then key), and cap
    pub fn select(&self, entries: impl IntoIterator<Item = QTableEntry>) -> Vec<QTableEntry> {
        let mut selected: Vec<QTableEntry> =
            entries.into_iter().filter(|e| self.matches(e)).collect();
        selected.sort_by(|a, b| {
            OrderedFloat(b.value)
                .cmp(&OrderedFloat(a.value))
                .then_with(|| a.key().cmp(&b.key()))
        });
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Errors from QTable storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("QTable medium unavailable: {0}")]
    Unavailable(String),

    #[error("Snapshot schema v{found} does not match state schema v{expected}")]
    IncompatibleSchema { expected: u32, found: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for RankingError {
    fn from(err: StoreError) -> Self {
        RankingError::StorageUnavailable(err.to_string())
    }
}

/// Trait for QTable storage backends
#[async_trait]
pub trait QTableStore: Send + Sync {
    /// Get the entry for a key; `None` if it was never written
    async fn get(&self, key: &QKey) -> Result<Option<QTableEntry>, StoreError>;

    /// Stored value, or 0.0 for a key never written
    async fn value(&self, key: &QKey) -> Result<f64, StoreError> {
        Ok(self.get(key).await?.map(|e| e.value).unwrap_or(0.0))
    }

    /// Write `value` and increment the update count
    async fn upsert(&self, key: QKey, value: f64) -> Result<QTableEntry, StoreError>;

    /// Apply a learning update atomically against the current stored value
    async fn apply(&self, key: QKey, update: BellmanUpdate) -> Result<QTableEntry, StoreError>;

    /// Entries matching `filter`, by descending value
    async fn query(&self, filter: &QTableFilter) -> Result<Vec<QTableEntry>, StoreError>;

    /// Number of stored entries
    async fn total_count(&self) -> Result<usize, StoreError>;

    /// Every stored entry, in key order
    async fn entries(&self) -> Result<Vec<QTableEntry>, StoreError>;
}

/// In-memory QTable
///
/// Uses DashMap so the per-key write lock is a shard lock held only for the
/// duration of the arithmetic; nothing is awaited while it is held.
#[derive(Debug, Default)]
pub struct InMemoryQTable {
    entries: DashMap<QKey, QTableEntry>,
}

impl InMemoryQTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace stored entries with `entries` (used by snapshot restore)
    pub fn restore(&self, entries: impl IntoIterator<Item = QTableEntry>) {
        self.entries.clear();
        for entry in entries {
            self.entries.insert(entry.key(), entry);
        }
    }

    fn write(&self, key: QKey, next: impl FnOnce(f64) -> f64) -> QTableEntry {
        let mut slot = self
            .entries
            .entry(key)
            .or_insert_with(|| QTableEntry::fresh(key));
        let entry = slot.value_mut();
        entry.value = next(entry.value);
        entry.update_count += 1;
        entry.updated_at = Utc::now();
        entry.clone()
    }
}

#[async_trait]
impl QTableStore for InMemoryQTable {
    async fn get(&self, key: &QKey) -> Result<Option<QTableEntry>, StoreError> {
        Ok(self.entries.get(key).map(|e| e.clone()))
    }

    async fn upsert(&self, key: QKey, value: f64) -> Result<QTableEntry, StoreError> {
        Ok(self.write(key, |_| value))
    }

    async fn apply(&self, key: QKey, update: BellmanUpdate) -> Result<QTableEntry, StoreError> {
        Ok(self.write(key, |old| update.apply(old)))
    }

    async fn query(&self, filter: &QTableFilter) -> Result<Vec<QTableEntry>, StoreError> {
        Ok(filter.select(self.entries.iter().map(|e| e.value().clone())))
    }

    async fn total_count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len())
    }

    async fn entries(&self) -> Result<Vec<QTableEntry>, StoreError> {
        let mut all: Vec<QTableEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(QTableEntry::key);
        Ok(all)
    }
}
