//! SupplyRank Binary
//!
//! Trains the ranking agent on a supplier fixture and prints product rankings.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use supplyrank_engine::{
    Collaborators, EngineConfig, InMemoryQTable, QTableSnapshot, RankingAgent, SnapshotFile,
    SupplierFixture, DEFAULT_FIXTURE_PATH, VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting SupplyRank v{}", VERSION);

    // Load configuration
    let config = EngineConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let fixture_path = config
        .training
        .fixture_path
        .clone()
        .unwrap_or_else(|| DEFAULT_FIXTURE_PATH.into());
    let registry = Arc::new(
        SupplierFixture::load(&fixture_path)
            .with_context(|| format!("failed to load fixture {}", fixture_path.display()))?
            .into_registry(),
    );

    // Restore learned values
    let qtable = Arc::new(InMemoryQTable::new());
    let snapshot = config.storage.snapshot_path.as_ref().map(SnapshotFile::new);
    if let Some(file) = snapshot.as_ref().filter(|f| f.exists()) {
        match file.load().and_then(|s| s.restore_into(&qtable)) {
            Ok(count) => info!(entries = count, "Restored QTable snapshot"),
            Err(e) => warn!(error = %e, "Ignoring unreadable QTable snapshot"),
        }
    }

    let agent = RankingAgent::new(
        &config,
        Collaborators::from_registry(registry.clone()),
        qtable.clone(),
    );

    let stats = match config.training.seed {
        Some(seed) => {
            agent
                .batch_train_seeded(config.training.iterations, None, seed)
                .await?
        }
        None => agent.batch_train(config.training.iterations, None).await?,
    };

    let mut rankings = BTreeMap::new();
    for product_id in registry.product_ids() {
        let ranked = agent.rank_product(&product_id, None).await?;
        rankings.insert(product_id, ranked);
    }

    let report = serde_json::json!({
        "training": stats,
        "rankings": rankings,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(file) = snapshot {
        let captured = QTableSnapshot::capture(qtable.as_ref()).await?;
        file.save(&captured)?;
    }

    info!("Shutting down SupplyRank");
    Ok(())
}
