use tracing::{debug, error, info, warn};
use ward_model::{TaskEvent, TaskEventKind, TaskState};

#[inline]
pub fn message_for(kind: TaskEventKind) -> &'static str {
    match kind {
        // start
        TaskEventKind::Started => "task started",
        TaskEventKind::Reattached => "reattached to running task",
        TaskEventKind::SetupFailure => "task setup failed",
        TaskEventKind::DriverFailure => "driver failed to start task",

        // exit
        TaskEventKind::Terminated => "task exited",
        TaskEventKind::Restarting => "task restart scheduled",
        TaskEventKind::NotRestarting => "task will not be restarted",

        // kill
        TaskEventKind::Killing => "task kill requested",
        TaskEventKind::Killed => "task killed",

        // driver
        TaskEventKind::DriverMessage => "driver message",
    }
}

#[inline]
pub fn log_task_event(task: &str, state: TaskState, e: &TaskEvent) {
    let msg = message_for(e.kind);
    let detail = e.message.as_str();

    match e.kind {
        TaskEventKind::Started | TaskEventKind::Reattached => {
            info!(task, %state, "{msg}")
        }
        TaskEventKind::SetupFailure | TaskEventKind::DriverFailure => {
            warn!(task, %state, fails_task = e.fails_task, detail, "{msg}")
        }

        TaskEventKind::Terminated => match &e.exit {
            Some(exit) if exit.successful() => info!(task, %state, detail, "{msg}"),
            _ => warn!(task, %state, detail, "{msg}"),
        },
        TaskEventKind::Restarting => info!(
            task,
            %state,
            delay_ms = e.restart_delay_ms.unwrap_or(0),
            reason = e.restart_reason.as_deref().unwrap_or(""),
            "{msg}"
        ),
        TaskEventKind::NotRestarting => {
            if e.fails_task {
                error!(task, %state, detail, "{msg}")
            } else {
                info!(task, %state, detail, "{msg}")
            }
        }

        TaskEventKind::Killing => info!(task, %state, "{msg}"),
        TaskEventKind::Killed => match &e.kill_error {
            Some(err) => error!(task, %state, error = %err, "task could not be killed"),
            None => info!(task, %state, "{msg}"),
        },

        TaskEventKind::DriverMessage => debug!(task, detail, "{msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventJournal;
    use ward_core::StateUpdater;
    use ward_model::TaskStatus;

    #[test]
    fn every_kind_has_a_message() {
        for kind in [
            TaskEventKind::SetupFailure,
            TaskEventKind::DriverFailure,
            TaskEventKind::Started,
            TaskEventKind::Reattached,
            TaskEventKind::Terminated,
            TaskEventKind::Restarting,
            TaskEventKind::NotRestarting,
            TaskEventKind::Killing,
            TaskEventKind::Killed,
            TaskEventKind::DriverMessage,
        ] {
            assert!(!message_for(kind).is_empty());
        }
    }

    #[test]
    fn journal_tolerates_statuses_without_events() {
        let journal = EventJournal::new();
        let mut status = TaskStatus::new();
        journal.task_state_updated("web", &status);

        status.events.push(TaskEvent::new(TaskEventKind::Killed).with_kill_error("refused"));
        journal.task_state_updated("web", &status);
    }
}
