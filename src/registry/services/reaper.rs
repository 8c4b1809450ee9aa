//! Background task that periodically reaps stale agents.

use super::AgentRegistryService;
use crate::registry::ports::KeyValueStore;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawns the periodic stale-agent reaper.
pub struct StaleAgentReaper;

impl StaleAgentReaper {
    /// Spawns a task that calls
    /// [`AgentRegistryService::reap_stale_agents`] every `interval` until the
    /// returned handle is stopped.
    ///
    /// The first pass runs one full interval after spawning. Store failures
    /// are logged and the task keeps running.
    #[must_use]
    pub fn spawn<S, C>(registry: Arc<AgentRegistryService<S, C>>, interval: Duration) -> ReaperHandle
    where
        S: KeyValueStore + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = period.as_secs(), "stale agent reaper started");

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match registry.reap_stale_agents().await {
                            Ok(reaped) if reaped.is_empty() => debug!("reaper pass found no stale agents"),
                            Ok(reaped) => info!(count = reaped.len(), "reaper pass removed stale agents"),
                            Err(err) => warn!(error = %err, "reaper pass failed"),
                        }
                    }
                }
            }

            info!("stale agent reaper stopped");
        });

        ReaperHandle { cancel, handle }
    }
}

/// Handle used to stop a running reaper.
#[derive(Debug)]
pub struct ReaperHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReaperHandle {
    /// Returns whether the reaper task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signals the reaper to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Signals the reaper to stop and waits for the task to exit.
    pub async fn stop(self) {
        self.cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "reaper task ended abnormally");
        }
    }
}
