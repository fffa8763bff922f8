/// The registry which holds the CLI client, the cached cluster topology
/// and the pending copy operations.
pub(crate) mod registry;
/// The background reconciliation loops.
pub(crate) mod reconciler;
/// The poller abstraction driving the reconciliation loops.
pub(crate) mod task_poller;
