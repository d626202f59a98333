//! Periodic refresh of due profiles.

pub mod due;
mod refresher;

pub use due::{due_at, should_refresh};
pub use refresher::{PublishedFeed, RefreshSummary, Refresher};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::store::Store;

/// Background loop that refreshes due profiles on a fixed cadence.
///
/// Owned by whoever starts it; [`Scheduler::stop`] lets an in-flight tick
/// finish before the loop exits.
pub struct Scheduler {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl Scheduler {
    pub fn start<S>(refresher: Arc<Refresher<S>>, tick: Duration) -> Self
    where
        S: Store + Send + Sync + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            info!(tick_secs = tick.as_secs(), "Scheduler started");
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match refresher.refresh_due_profiles(Utc::now()).await {
                    Ok(summary) if summary.attempted() > 0 => info!(
                        refreshed = summary.refreshed,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "Scheduler tick finished"
                    ),
                    Ok(_) => {}
                    Err(e) => error!("Scheduler tick failed: {}", e),
                }
            }

            info!("Scheduler stopped");
        });

        Self { cancel, join }
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Signal the loop to stop and wait for it.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
    }
}
