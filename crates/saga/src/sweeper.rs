//! Periodic timeout and retry sweeps.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use saga_store::SagaStore;

use crate::client::ServiceClient;
use crate::orchestrator::SagaOrchestrator;

#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    pub timeout_interval: Duration,
    pub retry_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            timeout_interval: Duration::from_secs(30),
            retry_interval: Duration::from_secs(60),
        }
    }
}

/// The two background sweep tasks.
pub struct Sweepers {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl Sweepers {
    pub fn spawn<S, C>(orchestrator: Arc<SagaOrchestrator<S, C>>, config: SweeperConfig) -> Self
    where
        S: SagaStore + Clone + 'static,
        C: ServiceClient + Clone + 'static,
    {
        let (shutdown, signal) = watch::channel(false);

        let timeouts = {
            let orchestrator = orchestrator.clone();
            let mut signal = signal.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(config.timeout_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            match orchestrator.sweep_timeouts().await {
                                Ok(ids) if !ids.is_empty() => {
                                    tracing::info!(count = ids.len(), "timeout sweep expired sagas");
                                }
                                Ok(_) => {}
                                Err(e) => tracing::error!(error = %e, "timeout sweep failed"),
                            }
                        }
                        _ = signal.changed() => break,
                    }
                }
            })
        };

        let retries = {
            let mut signal = signal;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(config.retry_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            match orchestrator.sweep_retries().await {
                                Ok(ids) if !ids.is_empty() => {
                                    tracing::info!(count = ids.len(), "retry sweep requeued sagas");
                                }
                                Ok(_) => {}
                                Err(e) => tracing::error!(error = %e, "retry sweep failed"),
                            }
                        }
                        _ = signal.changed() => break,
                    }
                }
            })
        };

        Self {
            handles: vec![timeouts, retries],
            shutdown,
        }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        join_all(self.handles).await;
    }
}
