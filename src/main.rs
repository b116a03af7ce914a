use bucket_cluster::cluster::{self, ClusterStateMachine, NodeId, NodeInfo};
use bucket_cluster::config::NodeConfig;
use bucket_cluster::journal::JournalApplier;
use bucket_cluster::journal::applier::DEFAULT_QUEUE_CAPACITY;
use bucket_cluster::keys::{KeyHasher, Sha256KeyHasher};
use bucket_cluster::storage::handlers::{self, StorageContext};
use bucket_cluster::storage::{BucketLocator, FilesystemBucketLocator};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    for flag in &config.ignored {
        tracing::warn!("Ignoring unknown argument {:?}", flag);
    }

    // 1. Keys and buckets:
    let hasher: Arc<dyn KeyHasher> = Arc::new(Sha256KeyHasher::default());
    let locator: Arc<dyn BucketLocator> = Arc::new(FilesystemBucketLocator::new(
        hasher.clone(),
        &config.data_dir,
        config.bucket_count,
    )?);

    // 2. Cluster state, starting from this node alone:
    let self_node = NodeInfo::new(NodeId::new(), config.name.clone(), config.uris.clone());
    tracing::info!("Node {} ({}) at {:?}", self_node.id(), self_node.name(), config.uris);

    let machine = Arc::new(ClusterStateMachine::new(self_node));

    // 3. Journal apply loop. The sender is where a replication layer hands over committed entries.
    let (_journal, applier) = JournalApplier::channel(machine.clone(), DEFAULT_QUEUE_CAPACITY);
    let apply_task = applier.start();

    let mut events = machine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(
                    "Applied serial {} ({:?}) to node {}: {:?}",
                    event.serial,
                    event.command,
                    event.node_id,
                    event.change
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 4. HTTP Router:
    let app = handlers::router(Arc::new(StorageContext { hasher, locator }))
        .merge(cluster::handlers::router(machine.clone()));

    // 5. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tokio::select! {
        served = axum::serve(listener, app) => served?,
        applied = apply_task => {
            let entries = applied??;
            tracing::info!("Journal closed after {} entries", entries);
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    Ok(())
}
