use crate::controller::{
    registry::Registry,
    task_poller::{
        squash_results, PollContext, PollEvent, PollPeriods, PollResult, PollTimer, PollTriggerEvent,
        PollerState, TaskPoller,
    },
};
use stor_port::types::v0::{
    store::volume::VdiskCopyOp,
    transport::{VdiskName, VolumeId},
};

/// Watches the pending vdisk-copy operations registered by migrate/retype:
/// once the new copy of a vdisk reports in-sync, the original copy is
/// removed and the operation is untracked (from the in-memory map and the
/// persisted metadata mirror together). The loop never runs with an empty
/// tracked set.
#[derive(Debug)]
pub(super) struct CopyOpsReconciler {
    counter: Option<PollTimer>,
}

impl CopyOpsReconciler {
    /// Return a new `Self`.
    pub(super) fn new() -> Self {
        Self { counter: None }
    }
}

#[async_trait::async_trait]
impl TaskPoller for CopyOpsReconciler {
    async fn poll(&mut self, context: &PollContext) -> PollResult {
        let registry = context.registry();
        if !registry.has_copy_ops().await {
            return PollResult::Ok(PollerState::Idle);
        }
        let mut results = vec![];
        for (volume, (name, ops)) in registry.copy_ops().await {
            for op in ops.ops() {
                results.push(reconcile_op(registry, &volume, &name, op).await);
            }
        }
        let mut state = squash_results(results)?;
        if registry.has_copy_ops().await {
            state = PollerState::Busy;
        }
        PollResult::Ok(state)
    }

    async fn poll_timer(&mut self, context: &PollContext) -> bool {
        let counter = self.counter.get_or_insert_with(|| {
            let config = context.registry().config();
            let base = config.cache_period.as_secs().max(1);
            let ticks = (config.reconcile_period.as_secs() / base).max(1);
            PollTimer::from(ticks as PollPeriods)
        });
        counter.poll()
    }

    async fn poll_event(&mut self, context: &PollContext) -> bool {
        match context.event() {
            PollEvent::TimedRun => true,
            PollEvent::Triggered(PollTriggerEvent::VdiskCopyRegistered) => true,
            PollEvent::Shutdown => false,
        }
    }
}

/// Check one tracked pair: delete the original copy once the new copy is
/// in sync, then untrack the pair.
async fn reconcile_op(
    registry: &Registry,
    volume: &VolumeId,
    name: &VdiskName,
    op: &VdiskCopyOp,
) -> PollResult {
    let copies = registry.client().lsvdiskcopy(name).await?;
    let Some(new_copy) = copies.iter().find(|copy| copy.copy_id == op.new_copy_id) else {
        tracing::warn!(volume.uuid=%volume, copy.id=%op.new_copy_id,
            "The tracked vdisk copy no longer exists, dropping the operation"
        );
        registry.remove_copy_op(volume, op).await?;
        return PollResult::Ok(PollerState::Idle);
    };
    if !new_copy.sync {
        return PollResult::Ok(PollerState::Busy);
    }
    // reads must come off the surviving copy before the original goes
    if !new_copy.primary {
        registry
            .client()
            .chvdisk_primary(name, &op.new_copy_id)
            .await?;
    }
    registry.client().rmvdiskcopy(name, &op.orig_copy_id).await?;
    registry.remove_copy_op(volume, op).await?;
    tracing::info!(volume.uuid=%volume, copy.id=%op.new_copy_id,
        "Vdisk copy synchronised, the original copy has been removed"
    );
    PollResult::Ok(PollerState::Idle)
}
