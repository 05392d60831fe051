use ward_model::TaskStatus;

/// Receives every status change of a task, e.g. to aggregate allocation status.
///
/// Called while the runner's status lock is held, so updates arrive in the
/// order they were applied. Implementations must not block and must not call
/// back into the runner.
pub trait StateUpdater: Send + Sync {
    fn task_state_updated(&self, task: &str, status: &TaskStatus);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUpdater;

impl StateUpdater for NoopUpdater {
    #[inline]
    fn task_state_updated(&self, _task: &str, _status: &TaskStatus) {}
}
