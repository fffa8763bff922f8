mod cache;
mod copyops;
pub(crate) mod poller;

use super::registry::Registry;
use super::task_poller::PollEvent;
use parking_lot::Mutex;
use poller::ReconcilerWorker;

/// Used to start and stop the reconcile pollers.
pub(crate) struct ReconcilerControl {
    worker: Mutex<Option<ReconcilerWorker>>,
    event_channel: tokio::sync::mpsc::Sender<PollEvent>,
    shutdown_channel: tokio::sync::mpsc::Sender<()>,
}

impl ReconcilerControl {
    /// Return a new `Self`.
    pub(crate) fn new() -> Self {
        let mut worker = ReconcilerWorker::new();
        Self {
            event_channel: worker.take_event_channel(),
            shutdown_channel: worker.take_shutdown_channel(),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Start polling the registered reconciliation loops.
    pub(crate) async fn start(&self, registry: Registry) {
        let worker = self.worker.lock().take().expect("Can only start once");
        tokio::spawn(async move {
            tracing::info!("Starting the reconciler control loop");
            worker.poller(registry).await;
        });
    }

    /// Send the shutdown signal to the poller's main loop. Stopping an
    /// already-stopped loop is a no-op.
    pub(crate) async fn shutdown(&self) {
        self.shutdown_channel.send(()).await.ok();
    }

    /// Send an event signal to the poller's main loop.
    pub(crate) async fn notify(&self, event: PollEvent) {
        if let Err(error) = self.event_channel.try_send(event) {
            tracing::warn!(error=?error, "Failed to send event to reconcile worker");
        }
    }
}
