//! Background publisher
//!
//! Promotes due submissions on a fixed interval until shutdown is signalled.

use chrono::Utc;
use linkdir_common::intake::IntakeService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub fn spawn_publisher(
    intake: Arc<IntakeService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(10));

    tokio::spawn(async move {
        info!(interval_ms = every.as_millis() as u64, "Publisher started");

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = intake.publish_due(Utc::now()).await {
                        error!(error = %e, "Publisher pass failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Publisher stopped");
    })
}
