//! Periodic rebuild of every branch's invoice collections.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};

use branchbook_invoicing::{BackrefCoordinator, InvoicingResult};

pub struct ReconcileLoop {
    coordinator: BackrefCoordinator,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

#[derive(Clone)]
pub struct ReconcileHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ReconcileHandle {
    pub async fn shutdown(&self) {
        // A closed channel means the loop already exited.
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl ReconcileLoop {
    pub fn new(coordinator: BackrefCoordinator, interval: Duration) -> (Self, ReconcileHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            ReconcileLoop {
                coordinator,
                interval,
                shutdown_rx,
            },
            ReconcileHandle { shutdown_tx },
        )
    }

    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Reconciliation loop starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Reconciliation pass failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Reconciliation loop shutting down");
                    break;
                }
            }
        }
    }

    /// One pass over all branches. Returns how many branches were repaired.
    pub async fn run_once(&self) -> InvoicingResult<usize> {
        let reports = self.coordinator.reconcile_all().await?;
        let repaired = reports.iter().filter(|r| !r.is_clean()).count();

        info!(
            branches = reports.len(),
            repaired,
            "Reconciliation pass complete"
        );
        Ok(repaired)
    }
}
