//! Task-event journal: logs every recorded task event.

mod view;
pub use view::{log_task_event, message_for};

use ward_core::StateUpdater;
use ward_model::TaskStatus;

/// [`StateUpdater`] that writes each recorded event to the log.
///
/// The runner records exactly one event per status update, so the newest
/// event is the one that caused the call.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventJournal;

impl EventJournal {
    pub fn new() -> Self {
        Self
    }
}

impl StateUpdater for EventJournal {
    fn task_state_updated(&self, task: &str, status: &TaskStatus) {
        if let Some(event) = status.last_event() {
            log_task_event(task, status.state, event);
        }
    }
}
