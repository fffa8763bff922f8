use crate::controller::task_poller::{
    PollContext, PollEvent, PollResult, PollerState, TaskPoller,
};

/// Refreshes the registry's cached view of the cluster topology (nodes,
/// I/O groups, pools) on every timed run.
#[derive(Debug)]
pub(super) struct CacheReconciler {}

impl CacheReconciler {
    /// Return a new `Self`.
    pub(super) fn new() -> Self {
        Self {}
    }
}

#[async_trait::async_trait]
impl TaskPoller for CacheReconciler {
    async fn poll(&mut self, context: &PollContext) -> PollResult {
        context.registry().refresh_state().await?;
        PollResult::Ok(PollerState::Idle)
    }

    async fn poll_event(&mut self, context: &PollContext) -> bool {
        // the cache only refreshes on its timer, not on copy-op triggers
        matches!(context.event(), PollEvent::TimedRun)
    }
}
