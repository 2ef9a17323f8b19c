//! nodeset controller
//!
//! Runs the rollout worker. In dev mode the controller manages an in-memory
//! cluster that applies actions and marks pods ready on a short delay, so a
//! full rollout can be watched in the logs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use nodeset_controller::{config, mock::MockCluster, Reconciler, RolloutWorker};
use tokio::sync::watch;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEV_SETTLE_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to NODESET_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting nodeset controller");
    info!(
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        expectations_timeout_secs = config.expectations_timeout.as_secs(),
        budget_rounding = ?config.budget_rounding,
        "Configuration loaded"
    );

    if !config.dev_mode {
        error!("No cluster backend configured; set NODESET_DEV=1 to run against an in-memory cluster");
        anyhow::bail!("no cluster backend configured");
    }

    let cluster = Arc::new(MockCluster::with_nodes(config.dev_nodes));
    let workload = cluster.add_workload("node-agent", "v1");
    info!(workload_id = %workload, nodes = config.dev_nodes, "Seeded in-memory cluster (dev mode)");

    let reconciler = Arc::new(Reconciler::new(
        cluster.clone(),
        cluster.clone(),
        config.reconciler(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = RolloutWorker::new(reconciler.clone(), config.reconcile_interval);
    let worker_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    let settle_handle = tokio::spawn(drive_dev_cluster(cluster, reconciler, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    if let Err(e) = worker_handle.await {
        error!(error = %e, "Rollout worker task panicked");
    }
    if let Err(e) = settle_handle.await {
        error!(error = %e, "Dev cluster task panicked");
    }

    info!("nodeset controller stopped");
    Ok(())
}

/// Stand-in for the watch cache: apply accepted actions, report them to
/// the reconciler, and let every pod become ready.
async fn drive_dev_cluster(
    cluster: Arc<MockCluster>,
    reconciler: Arc<Reconciler>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(DEV_SETTLE_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let events = cluster.settle();
                if !events.is_empty() {
                    debug!(events = events.len(), "Applied pending pod changes");
                }
                for event in &events {
                    reconciler.observe(event);
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
