use std::{path::PathBuf, time::Duration};

/// Node-level settings shared by every task runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root under which `<alloc_id>/<task>` task directories are created.
    pub alloc_dir: PathBuf,
    /// Skip emitting tagged allocation counters.
    pub disable_tagged_metrics: bool,
    pub kill: KillPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            alloc_dir: PathBuf::from("/var/lib/ward/alloc"),
            disable_tagged_metrics: false,
            kill: KillPolicy::default(),
        }
    }
}

/// Retry budget for destroying a live driver handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillPolicy {
    /// Wait after the first failed kill.
    pub baseline: Duration,
    /// Upper bound on any single wait.
    pub limit: Duration,
    /// Kill attempts before giving up and reporting a possible leak.
    pub failure_limit: u32,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            baseline: Duration::from_secs(5),
            limit: Duration::from_secs(120),
            failure_limit: 5,
        }
    }
}

impl KillPolicy {
    /// Wait after the `attempt`-th failed kill (0-based): `baseline × 4^attempt`, capped at `limit`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        4u32.checked_pow(attempt)
            .and_then(|factor| self.baseline.checked_mul(factor))
            .map_or(self.limit, |d| d.min(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_backoff_grows_then_caps() {
        let p = KillPolicy::default();
        assert_eq!(p.backoff(0), Duration::from_secs(5));
        assert_eq!(p.backoff(1), Duration::from_secs(20));
        assert_eq!(p.backoff(2), Duration::from_secs(80));
        assert_eq!(p.backoff(3), Duration::from_secs(120));
        assert_eq!(p.backoff(4), Duration::from_secs(120));
        assert_eq!(p.backoff(u32::MAX), Duration::from_secs(120));
    }
}
