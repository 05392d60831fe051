//! Metrics boundary.

/// Allocation-level counters emitted on task transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocCounter {
    Restart,
    Running,
    Failed,
    Complete,
    /// The restart tracker produced a verdict the runner had to fall back on.
    UndeterminedRestart,
}

impl AllocCounter {
    pub const ALL: [AllocCounter; 5] = [
        AllocCounter::Restart,
        AllocCounter::Running,
        AllocCounter::Failed,
        AllocCounter::Complete,
        AllocCounter::UndeterminedRestart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocCounter::Restart => "restart",
            AllocCounter::Running => "running",
            AllocCounter::Failed => "failed",
            AllocCounter::Complete => "complete",
            AllocCounter::UndeterminedRestart => "undetermined_restart",
        }
    }
}

/// Tags attached to every counter a task runner emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLabels {
    pub job: String,
    pub task_group: String,
    pub alloc_id: String,
    pub task: String,
}

impl MetricLabels {
    pub const NAMES: [&'static str; 4] = ["job", "task_group", "alloc_id", "task"];

    /// Label values in the order of [`MetricLabels::NAMES`].
    pub fn values(&self) -> [&str; 4] {
        [&self.job, &self.task_group, &self.alloc_id, &self.task]
    }
}

pub trait MetricsBackend: Send + Sync {
    fn incr(&self, counter: AllocCounter, labels: &MetricLabels);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    #[inline]
    fn incr(&self, _counter: AllocCounter, _labels: &MetricLabels) {}
}
