use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use ward_model::{TaskEvent, TaskEventKind, TaskState};

use super::{StateUpdate, TaskRunner};
use crate::{config::KillPolicy, driver::DriverHandle, error::DriverError, sync::lock};

/// Result of tearing down a driver handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyOutcome {
    /// The handle accepted a kill. `false` means the task may still be running.
    pub destroyed: bool,
    /// Kill calls made.
    pub attempts: u32,
    /// Last kill error, if any.
    pub error: Option<DriverError>,
    /// Time spent sleeping between attempts.
    pub waited: Duration,
}

impl DestroyOutcome {
    pub(crate) fn nothing_to_destroy() -> Self {
        Self {
            destroyed: true,
            attempts: 0,
            error: None,
            waited: Duration::ZERO,
        }
    }
}

/// Kill `handle`, retrying with backoff until it succeeds or the policy's
/// failure limit is reached.
///
/// Not cancellable: once started it runs until one of the two.
pub async fn destroy_with_backoff(handle: &dyn DriverHandle, policy: &KillPolicy) -> DestroyOutcome {
    let mut outcome = DestroyOutcome {
        destroyed: false,
        attempts: 0,
        error: None,
        waited: Duration::ZERO,
    };

    for attempt in 0..policy.failure_limit {
        outcome.attempts += 1;
        match handle.kill().await {
            Ok(()) => {
                outcome.destroyed = true;
                outcome.error = None;
                return outcome;
            }
            Err(e) => {
                warn!(handle = %handle.id(), attempt = outcome.attempts, error = %e, "kill failed");
                outcome.error = Some(e);
            }
        }

        if attempt + 1 < policy.failure_limit {
            let backoff = policy.backoff(attempt);
            tokio::time::sleep(backoff).await;
            outcome.waited += backoff;
        }
    }
    outcome
}

impl TaskRunner {
    /// Destroy the live handle, if any, and record the result.
    #[instrument(level = "debug", skip(self), fields(task = %self.task_name))]
    pub(super) async fn handle_kill(&self) {
        let handle = lock(&self.handle).clone();

        let outcome = match handle {
            Some(handle) => {
                debug!(task = %self.task_name, handle = %handle.id(), "destroying task");
                destroy_with_backoff(handle.as_ref(), &self.config.kill).await
            }
            None => DestroyOutcome::nothing_to_destroy(),
        };

        if outcome.destroyed {
            self.set_handle(None);
            self.set_state(
                StateUpdate::Transition(TaskState::Dead),
                TaskEvent::new(TaskEventKind::Killed),
            );
        } else {
            let err = outcome
                .error
                .clone()
                .unwrap_or_else(|| DriverError::Kill("no attempts made".into()));
            error!(
                task = %self.task_name,
                attempts = outcome.attempts,
                error = %err,
                "failed to kill task, it may still be running"
            );
            self.emit_event(TaskEvent::new(TaskEventKind::Killed).with_kill_error(err));
        }

        *lock(&self.destroy_outcome) = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };
    use ward_model::WaitResult;

    struct Stubborn {
        calls: AtomicU32,
        succeed_on: Option<u32>,
    }

    #[async_trait]
    impl DriverHandle for Stubborn {
        fn id(&self) -> String {
            "stubborn".into()
        }
        async fn wait(&self) -> WaitResult {
            std::future::pending().await
        }
        async fn kill(&self) -> Result<(), DriverError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.succeed_on == Some(n) {
                Ok(())
            } else {
                Err(DriverError::Kill(format!("attempt {n}")))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_failure_limit() {
        let handle = Arc::new(Stubborn {
            calls: AtomicU32::new(0),
            succeed_on: None,
        });
        let start = tokio::time::Instant::now();

        let outcome = destroy_with_backoff(handle.as_ref(), &KillPolicy::default()).await;
        assert!(!outcome.destroyed);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.error, Some(DriverError::Kill("attempt 5".into())));
        assert_eq!(outcome.waited, Duration::from_secs(5 + 20 + 80 + 120));
        assert_eq!(start.elapsed(), outcome.waited);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let handle = Stubborn {
            calls: AtomicU32::new(0),
            succeed_on: Some(2),
        };
        let outcome = destroy_with_backoff(&handle, &KillPolicy::default()).await;
        assert!(outcome.destroyed);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.waited, Duration::from_secs(5));
    }
}
