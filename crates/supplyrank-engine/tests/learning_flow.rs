//! Integration tests for the SupplyRank learning core
//!
//! Exercises the agent end to end against the in-memory registry and QTable:
//! - Feedback learning and exploit ranking
//! - Atomic updates under concurrency
//! - Failure handling for collaborators (errors and timeouts)
//! - Snapshot persistence

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use mockall::mock;
use supplyrank_common::{
    Action, Feedback, Level, Metrics, RankTier, RankingError, Result, State, SupplierId,
    SupplierRecord,
};
use supplyrank_engine::{
    BellmanUpdate, Collaborators, EngineConfig, InMemoryQTable, InMemorySupplierRegistry, QKey,
    QTableEntry, QTableFilter, QTableSnapshot, QTableStore, RankingAgent, SnapshotFile,
    StoreError, SupplierDirectory,
};

mock! {
    pub Directory {}

    #[async_trait]
    impl SupplierDirectory for Directory {
        async fn get_supplier(&self, id: SupplierId) -> Result<Option<SupplierRecord>>;
        async fn list_suppliers(&self) -> Result<Vec<SupplierId>>;
    }
}

/// Directory that never answers within any reasonable budget
struct StalledDirectory;

#[async_trait]
impl SupplierDirectory for StalledDirectory {
    async fn get_supplier(&self, _id: SupplierId) -> Result<Option<SupplierRecord>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn list_suppliers(&self) -> Result<Vec<SupplierId>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

fn registry() -> Arc<InMemorySupplierRegistry> {
    let registry = Arc::new(InMemorySupplierRegistry::new());
    let suppliers = [
        (1, "Rhone Valley Mills", "Lyon", (9.0, 8.0, 7.0, 10.0)),
        (2, "Nord Grains", "Lille", (6.0, 6.0, 6.0, 6.0)),
        (3, "Quick Cold Chain", "Paris", (3.0, 2.0, 3.0, 2.0)),
    ];
    for (id, name, city, (q, d, p, s)) in suppliers {
        registry.insert_supplier(
            SupplierRecord::new(SupplierId(id))
                .with_company_name(name)
                .with_city(city),
        );
        registry.set_metrics(SupplierId(id), Metrics::new(q, d, p, s).unwrap());
        registry.link_product("flour", SupplierId(id));
    }
    registry
}

fn agent(registry: Arc<InMemorySupplierRegistry>, config: &EngineConfig) -> RankingAgent {
    RankingAgent::new(
        config,
        Collaborators::from_registry(registry),
        Arc::new(InMemoryQTable::new()),
    )
}

fn strong_state() -> State {
    State::new(Level::High, Level::High, Level::Medium, Level::High)
}

#[tokio::test]
async fn test_repeated_feedback_makes_top_tier_greedy() {
    let agent = agent(registry(), &EngineConfig::default());
    let feedback = Feedback::new(SupplierId(1), 0.9)
        .with_delivery_days(2.0)
        .with_issues(0)
        .with_product("flour");

    let mut last_value = 0.0;
    for round in 1..=5u64 {
        let outcome = agent.process_feedback(&feedback).await.unwrap();
        assert_eq!(outcome.step.state, strong_state());
        assert_eq!(outcome.step.action, Action::RankTier(RankTier::Preferred));
        assert_eq!(outcome.step.update_count, round);
        assert!(outcome.step.q_value > last_value);
        last_value = outcome.step.q_value;
    }

    let ranked = agent.rank_supplier(SupplierId(1)).await.unwrap();
    assert_eq!(ranked.state.name(), "Q3_D3_P2_S3");
    assert_eq!(ranked.action, Action::RankTier(RankTier::Preferred));
    assert_eq!(ranked.update_count, 5);
    assert!((ranked.q_value - last_value).abs() < 1e-12);
    assert!((ranked.metric_score - 8.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_learn_applies_update_rule() {
    let agent = agent(registry(), &EngineConfig::default());
    let state = strong_state();
    let next_state = State::new(Level::Low, Level::Low, Level::Low, Level::Low);
    let action = Action::RankTier(RankTier::Preferred);

    agent.qtable().upsert(QKey::new(state, action), 5.0).await.unwrap();
    agent
        .qtable()
        .upsert(
            QKey::new(next_state, Action::RankTier(RankTier::NotRecommended)),
            6.0,
        )
        .await
        .unwrap();

    let entry = agent.learn(state, action, 8.0, next_state).await.unwrap();

    // 5.0 + 0.1 * (8.0 + 0.9 * 6.0 - 5.0)
    assert!((entry.value - 5.84).abs() < 1e-9);
    assert_eq!(entry.update_count, 2);
}

#[tokio::test]
async fn test_learn_without_next_values_uses_zero_lookahead() {
    let agent = agent(registry(), &EngineConfig::default());
    let state = strong_state();
    let action = Action::IncreaseOrderVolume;

    let entry = agent.learn(state, action, 4.0, state).await.unwrap();
    assert!((entry.value - 0.4).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_feedback_loses_no_updates() {
    let config = EngineConfig::default();
    let agent = Arc::new(agent(registry(), &config));

    let n = 64;
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let agent = agent.clone();
            tokio::spawn(async move {
                let supplier = if i % 2 == 0 { SupplierId(1) } else { SupplierId(3) };
                let rating = if i % 2 == 0 { 0.9 } else { 0.2 };
                agent
                    .process_feedback(&Feedback::new(supplier, rating).with_delivery_days(2.0))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut first = None;
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.step.supplier_id == SupplierId(1) {
            first.get_or_insert(outcome);
        }
    }
    let first = first.unwrap();

    // Only the credited tier is ever written, so the other candidates stay 0.0
    let update = BellmanUpdate {
        reward: first.step.reward,
        max_next_q: Some(0.0),
        next_includes_key: true,
        learning_rate: config.learning.learning_rate,
        discount_factor: config.learning.discount_factor,
    };
    let mut expected = 0.0;
    for _ in 0..n / 2 {
        expected = update.apply(expected);
    }

    let entry = agent
        .qtable()
        .get(&QKey::new(first.step.state, first.step.action))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.update_count, (n / 2) as u64);
    assert!((entry.value - expected).abs() < 1e-9);

    let total_updates: u64 = agent
        .qtable()
        .entries()
        .await
        .unwrap()
        .iter()
        .map(|e| e.update_count)
        .sum();
    assert_eq!(total_updates, n as u64);
}

/// QTable that yields to the scheduler before every read
struct YieldingTable {
    inner: InMemoryQTable,
}

#[async_trait]
impl QTableStore for YieldingTable {
    async fn get(&self, key: &QKey) -> std::result::Result<Option<QTableEntry>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn upsert(&self, key: QKey, value: f64) -> std::result::Result<QTableEntry, StoreError> {
        self.inner.upsert(key, value).await
    }

    async fn apply(
        &self,
        key: QKey,
        update: BellmanUpdate,
    ) -> std::result::Result<QTableEntry, StoreError> {
        self.inner.apply(key, update).await
    }

    async fn query(&self, filter: &QTableFilter) -> std::result::Result<Vec<QTableEntry>, StoreError> {
        self.inner.query(filter).await
    }

    async fn total_count(&self) -> std::result::Result<usize, StoreError> {
        self.inner.total_count().await
    }

    async fn entries(&self) -> std::result::Result<Vec<QTableEntry>, StoreError> {
        self.inner.entries().await
    }
}

async fn feedback_rounds(concurrent: bool, rounds: usize) -> (f64, u64) {
    let agent = RankingAgent::new(
        &EngineConfig::default(),
        Collaborators::from_registry(registry()),
        Arc::new(YieldingTable {
            inner: InMemoryQTable::new(),
        }),
    );
    let feedback = Feedback::new(SupplierId(1), 0.9).with_delivery_days(2.0);

    if concurrent {
        let outcomes = join_all((0..rounds).map(|_| agent.process_feedback(&feedback))).await;
        for outcome in outcomes {
            outcome.unwrap();
        }
    } else {
        for _ in 0..rounds {
            agent.process_feedback(&feedback).await.unwrap();
        }
    }

    let entry = agent
        .qtable()
        .get(&QKey::new(strong_state(), Action::RankTier(RankTier::Preferred)))
        .await
        .unwrap()
        .unwrap();
    (entry.value, entry.update_count)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_feedback_matches_sequential_value() {
    let (sequential, sequential_count) = feedback_rounds(false, 20).await;
    let (interleaved, interleaved_count) = feedback_rounds(true, 20).await;

    assert_eq!(sequential_count, 20);
    assert_eq!(interleaved_count, 20);
    assert!(
        (sequential - interleaved).abs() < 1e-9,
        "sequential={} interleaved={}",
        sequential,
        interleaved
    );
}

#[tokio::test]
async fn test_ranking_is_deterministic_with_id_tiebreak() {
    let registry = registry();
    for id in [20, 10] {
        registry.insert_supplier(SupplierRecord::new(SupplierId(id)).with_company_name("Twin"));
        registry.set_metrics(SupplierId(id), Metrics::new(6.0, 6.0, 6.0, 6.0).unwrap());
        registry.link_product("flour", SupplierId(id));
    }
    let agent = agent(registry, &EngineConfig::default());

    let first = agent.rank_product("flour", None).await.unwrap();
    let second = agent.rank_product("flour", None).await.unwrap();
    assert_eq!(first, second);

    let ids: Vec<u64> = first.iter().map(|r| r.supplier_id.0).collect();
    assert_eq!(ids, vec![1, 2, 10, 20, 3]);
    for pair in first.windows(2) {
        assert!(pair[0].overall_score >= pair[1].overall_score);
    }
    assert_eq!(agent.qtable().total_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_rank_suppliers_fails_whole_on_unknown_supplier() {
    let agent = agent(registry(), &EngineConfig::default());
    let err = agent
        .rank_suppliers(&[SupplierId(1), SupplierId(404)])
        .await
        .unwrap_err();
    assert!(matches!(err, RankingError::UnknownSupplier(SupplierId(404))));
}

#[tokio::test]
async fn test_directory_failure_leaves_qtable_untouched() {
    let mut directory = MockDirectory::new();
    directory
        .expect_get_supplier()
        .times(1)
        .returning(|_| Err(RankingError::StorageUnavailable("directory down".to_string())));

    let registry = registry();
    let qtable = Arc::new(InMemoryQTable::new());
    let agent = RankingAgent::new(
        &EngineConfig::default(),
        Collaborators {
            directory: Arc::new(directory),
            metrics: registry.clone(),
            catalog: registry,
        },
        qtable.clone(),
    );

    let err = agent
        .process_feedback(&Feedback::new(SupplierId(1), 0.9))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "StorageUnavailable");
    assert_eq!(qtable.total_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_directory_record_is_unknown_supplier() {
    let mut directory = MockDirectory::new();
    directory.expect_get_supplier().returning(|_| Ok(None));

    let registry = registry();
    let agent = RankingAgent::new(
        &EngineConfig::default(),
        Collaborators {
            directory: Arc::new(directory),
            metrics: registry.clone(),
            catalog: registry,
        },
        Arc::new(InMemoryQTable::new()),
    );

    let err = agent.rank_supplier(SupplierId(2)).await.unwrap_err();
    assert_eq!(err.kind(), "UnknownSupplier");
}

#[tokio::test]
async fn test_batch_training_skips_failed_iterations() {
    let registry = registry();
    let mut directory = MockDirectory::new();
    directory
        .expect_list_suppliers()
        .returning(|| Ok(vec![SupplierId(1), SupplierId(2), SupplierId(99)]));

    let agent = RankingAgent::new(
        &EngineConfig::default(),
        Collaborators {
            directory: Arc::new(directory),
            metrics: registry.clone(),
            catalog: registry,
        },
        Arc::new(InMemoryQTable::new()),
    );

    let stats = agent.batch_train_seeded(90, None, 17).await.unwrap();
    assert_eq!(stats.iterations, 90);
    assert_eq!(stats.suppliers_available, 3);
    assert_eq!(stats.successful_updates + stats.failed_updates, 90);
    assert!(stats.failed_updates > 0);
    assert!(stats.suppliers_trained <= 2);

    let total_updates: u64 = agent
        .qtable()
        .entries()
        .await
        .unwrap()
        .iter()
        .map(|e| e.update_count)
        .sum();
    assert_eq!(total_updates, stats.successful_updates as u64);
}

#[tokio::test]
async fn test_seeded_training_is_reproducible() {
    let config = EngineConfig::default();
    let a = agent(registry(), &config);
    let b = agent(registry(), &config);

    a.batch_train_seeded(50, None, 99).await.unwrap();
    b.batch_train_seeded(50, None, 99).await.unwrap();

    let values = |entries: Vec<QTableEntry>| {
        entries
            .into_iter()
            .map(|e| (e.key(), e.value, e.update_count))
            .collect::<Vec<_>>()
    };
    assert_eq!(
        values(a.qtable().entries().await.unwrap()),
        values(b.qtable().entries().await.unwrap())
    );
}

#[tokio::test(start_paused = true)]
async fn test_stalled_directory_times_out_before_write() {
    let mut config = EngineConfig::default();
    config.lookup.timeout_ms = 50;

    let registry = registry();
    let qtable = Arc::new(InMemoryQTable::new());
    let agent = RankingAgent::new(
        &config,
        Collaborators {
            directory: Arc::new(StalledDirectory),
            metrics: registry.clone(),
            catalog: registry,
        },
        qtable.clone(),
    );

    let err = agent
        .process_feedback(&Feedback::new(SupplierId(1), 0.9))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "Timeout");
    assert_eq!(qtable.total_count().await.unwrap(), 0);

    let err = agent.batch_train(10, None).await.unwrap_err();
    assert_eq!(err.kind(), "Timeout");
}

#[tokio::test]
async fn test_snapshot_preserves_rankings() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("qtable.json"));
    let config = EngineConfig::default();

    let registry = registry();
    let trained = agent(registry.clone(), &config);
    trained.batch_train_seeded(40, None, 3).await.unwrap();
    trained
        .process_feedback(&Feedback::new(SupplierId(2), 0.6).with_issues(1))
        .await
        .unwrap();
    let before = trained.rank_product("flour", None).await.unwrap();

    let snapshot = QTableSnapshot::capture(trained.qtable().as_ref()).await.unwrap();
    file.save(&snapshot).unwrap();

    let restored_table = Arc::new(InMemoryQTable::new());
    file.load().unwrap().restore_into(&restored_table).unwrap();
    let restored = RankingAgent::new(
        &config,
        Collaborators::from_registry(registry),
        restored_table,
    );

    let after = restored.rank_product("flour", None).await.unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.supplier_id, a.supplier_id);
        assert_eq!(b.action, a.action);
        assert_eq!(b.update_count, a.update_count);
        assert!((b.q_value - a.q_value).abs() < 1e-9);
    }
}
