//! Background task that lifts expired tempbans

use crate::moderation::ModerationService;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, error, info};

/// How often expired bans are looked for
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Requests the sweeper task accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepRequest {
    /// Sweep immediately instead of waiting for the next tick
    SweepNow,
    Shutdown,
}

/// Handle to a running sweeper task
pub struct Sweeper {
    tx: Sender<SweepRequest>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweeper. The first sweep happens right away.
    pub fn start(service: Arc<ModerationService>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(sweep_task(service, rx, interval));
        Self { tx, task }
    }

    /// Ask for a sweep now
    pub async fn sweep_now(&self) {
        if let Err(e) = self.tx.send(SweepRequest::SweepNow).await {
            error!("Failed to send sweep request: {e}");
        }
    }

    /// Stop the task and wait for it to finish its current sweep
    pub async fn shutdown(self) {
        if let Err(e) = self.tx.send(SweepRequest::Shutdown).await {
            error!("Failed to send sweeper shutdown: {e}");
        }
        if let Err(e) = self.task.await {
            error!("Sweeper task panicked: {e}");
        }
    }
}

async fn sweep_once(service: &ModerationService) {
    let report = service.sweep_expired(Utc::now()).await;
    if report.lifted > 0 || report.failed > 0 {
        info!(
            lifted = report.lifted,
            skipped = report.skipped,
            failed = report.failed,
            "Expired ban sweep finished"
        );
    } else {
        debug!("No expired bans");
    }
}

async fn sweep_task(
    service: Arc<ModerationService>,
    mut rx: Receiver<SweepRequest>,
    interval: Duration,
) {
    info!("Starting ban sweeper with {}s interval", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            request = rx.recv() => {
                match request {
                    Some(SweepRequest::SweepNow) => sweep_once(&service).await,
                    Some(SweepRequest::Shutdown) | None => break,
                }
            },
            _ = ticker.tick() => sweep_once(&service).await,
        }
    }

    info!("Ban sweeper shut down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAudit;
    use crate::ledger::{Actor, Ban, Ledger, RuntimeConfig};
    use crate::lookup::MockPlayerDirectory;
    use crate::permissions::{Permissions, RankStore};
    use crate::relay::MockActionRelay;

    fn service() -> Arc<ModerationService> {
        let mut relay = MockActionRelay::new();
        relay.expect_send().returning(|_| Ok(()));
        Arc::new(ModerationService::new(
            Arc::new(Ledger::in_memory()),
            Arc::new(Permissions::new(1, Arc::new(RankStore::default()))),
            Arc::new(RuntimeConfig::default()),
            Arc::new(relay),
            Arc::new(MockPlayerDirectory::new()),
            Arc::new(TracingAudit),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_lifts_bans_on_tick() {
        let service = service();
        let sweeper = Sweeper::start(Arc::clone(&service), SWEEP_INTERVAL);

        // Let the immediate first sweep run against an empty ledger
        tokio::time::sleep(Duration::from_millis(10)).await;

        service
            .ledger()
            .upsert_ban(Ban::new(
                5,
                "p",
                "r",
                "p",
                Actor::System,
                Some(Utc::now() - chrono::Duration::seconds(1)),
            ))
            .await
            .unwrap();
        assert!(service.ledger().get_active_ban(5).is_some());

        tokio::time::sleep(SWEEP_INTERVAL).await;
        assert!(service.ledger().get_active_ban(5).is_none());

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweep_now_and_shutdown() {
        let service = service();
        let sweeper = Sweeper::start(Arc::clone(&service), Duration::from_secs(3600));

        service
            .ledger()
            .upsert_ban(Ban::new(
                6,
                "p",
                "r",
                "p",
                Actor::System,
                Some(Utc::now() - chrono::Duration::seconds(1)),
            ))
            .await
            .unwrap();

        sweeper.sweep_now().await;
        for _ in 0..50 {
            if service.ledger().get_active_ban(6).is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(service.ledger().get_active_ban(6).is_none());

        sweeper.shutdown().await;
    }
}
