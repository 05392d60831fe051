use std::time::SystemTime;

use tracing::{debug, warn};
use ward_model::{TaskEvent, TaskEventKind, TaskState};

use super::TaskRunner;
use crate::{metrics::AllocCounter, sync::lock};

/// What a status update does to the task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    /// Move to the given state.
    Transition(TaskState),
    /// Record the event and leave the state as it is.
    EventOnly,
}

impl TaskRunner {
    /// Apply `update`, record `event`, notify the updater and persist local state.
    ///
    /// Once the task is Dead it stays Dead; later transitions only record
    /// their event.
    pub(crate) fn set_state(&self, update: StateUpdate, mut event: TaskEvent) {
        event.populate_display_message();
        let metrics_on = !self.config.disable_tagged_metrics;

        {
            let mut status = lock(&self.status);
            let prev = status.state;

            if let StateUpdate::Transition(next) = update {
                if prev == TaskState::Dead && next != TaskState::Dead {
                    debug!(task = %self.task_name, to = %next, "ignoring transition out of dead");
                } else {
                    status.state = next;
                    match next {
                        TaskState::Running if prev != TaskState::Running => {
                            status.started_at = Some(SystemTime::now());
                            if metrics_on {
                                self.metrics.incr(AllocCounter::Running, &self.labels);
                            }
                        }
                        TaskState::Dead if prev != TaskState::Dead => {
                            status.finished_at = Some(SystemTime::now());
                            if metrics_on {
                                let counter = if status.failed || event.fails_task {
                                    AllocCounter::Failed
                                } else {
                                    AllocCounter::Complete
                                };
                                self.metrics.incr(counter, &self.labels);
                            }
                        }
                        _ => {}
                    }
                }
            }

            if event.fails_task {
                status.failed = true;
            }
            if event.kind == TaskEventKind::Restarting {
                status.restarts += 1;
                status.last_restart = Some(event.time);
                if metrics_on {
                    self.metrics.incr(AllocCounter::Restart, &self.labels);
                }
            }

            debug!(
                task = %self.task_name,
                state = %status.state,
                event = %event.kind,
                message = %event.message,
                "task status updated"
            );
            status.events.push(event);
            self.updater.task_state_updated(&self.task_name, &status);
        }

        self.persist_logged();
    }

    /// Record an event without changing the state.
    pub(crate) fn emit_event(&self, event: TaskEvent) {
        self.set_state(StateUpdate::EventOnly, event);
    }

    /// Persist local state; a failed write is retried by the next trigger.
    pub(crate) fn persist_logged(&self) {
        if let Err(e) = self.persist_local_state() {
            warn!(task = %self.task_name, error = %e, "failed to persist local state");
        }
    }
}
