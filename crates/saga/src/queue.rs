//! Work queue and worker pool that run sagas in the background.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use saga_store::{SagaId, SagaStore};

use crate::client::ServiceClient;
use crate::orchestrator::SagaOrchestrator;

/// A unit of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItem {
    /// Claim a pending saga and run it.
    Execute(SagaId),
    /// Continue an in-progress saga after a step was reset for retry.
    Resume(SagaId),
}

impl WorkItem {
    pub fn saga_id(&self) -> SagaId {
        match self {
            WorkItem::Execute(id) | WorkItem::Resume(id) => *id,
        }
    }
}

/// Sending half of the work queue.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<WorkItem>,
}

/// Receiving half of the work queue, consumed by a [`WorkerPool`].
#[derive(Debug)]
pub struct WorkReceiver {
    rx: mpsc::UnboundedReceiver<WorkItem>,
}

impl WorkQueue {
    pub fn new() -> (WorkQueue, WorkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (WorkQueue { tx }, WorkReceiver { rx })
    }

    /// Returns false if the queue has been closed.
    pub fn enqueue(&self, item: WorkItem) -> bool {
        match self.tx.send(item) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(saga_id = %item.saga_id(), "work queue closed, item dropped");
                false
            }
        }
    }
}

impl WorkReceiver {
    /// Takes the next queued item without waiting.
    pub fn try_next(&mut self) -> Option<WorkItem> {
        self.rx.try_recv().ok()
    }
}

/// Fixed set of tokio tasks pulling from one shared queue.
///
/// Each worker runs one saga end to end before taking the next item.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn spawn<S, C>(
        orchestrator: Arc<SagaOrchestrator<S, C>>,
        receiver: WorkReceiver,
        workers: usize,
    ) -> Self
    where
        S: SagaStore + Clone + 'static,
        C: ServiceClient + Clone + 'static,
    {
        let rx = Arc::new(Mutex::new(receiver.rx));
        let (shutdown, signal) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|worker| {
                let orchestrator = orchestrator.clone();
                let rx = rx.clone();
                let signal = signal.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker, "saga worker started");
                    while let Some(item) = next_item(&rx, signal.clone()).await {
                        process(&orchestrator, item).await;
                    }
                    tracing::debug!(worker, "saga worker stopped");
                })
            })
            .collect();

        Self { handles, shutdown }
    }

    /// Closes the queue, lets the workers drain what is left and waits for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        join_all(self.handles).await;
    }
}

async fn next_item(
    rx: &Mutex<mpsc::UnboundedReceiver<WorkItem>>,
    mut signal: watch::Receiver<bool>,
) -> Option<WorkItem> {
    let mut rx = rx.lock().await;
    if *signal.borrow() {
        rx.close();
        return rx.try_recv().ok();
    }
    tokio::select! {
        item = rx.recv() => item,
        _ = signal.changed() => {
            rx.close();
            rx.try_recv().ok()
        }
    }
}

async fn process<S, C>(orchestrator: &SagaOrchestrator<S, C>, item: WorkItem)
where
    S: SagaStore + Clone,
    C: ServiceClient + Clone,
{
    let saga_id = item.saga_id();
    let result = match item {
        WorkItem::Execute(id) => orchestrator.execute(id).await,
        WorkItem::Resume(id) => orchestrator.resume(id).await,
    };
    match result {
        Ok(status) => tracing::info!(%saga_id, %status, "saga work item finished"),
        Err(e) => tracing::error!(%saga_id, error = %e, "saga work item failed"),
    }
}
