use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{EventRing, TaskEvent, domain::time_serde};

/// Lifecycle state of a single task.
///
/// Transitions are `Pending → Running → Dead`; a restart re-enters `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    /// Waiting to be started, or waiting out a restart delay.
    #[default]
    Pending,
    /// A driver handle is live.
    Running,
    /// Terminal. No further transitions.
    Dead,
}

impl TaskState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Dead)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally reported status of one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub state: TaskState,
    /// Set once any recorded event fails the task.
    #[serde(default)]
    pub failed: bool,
    #[serde(default, with = "time_serde::option")]
    pub started_at: Option<SystemTime>,
    #[serde(default, with = "time_serde::option")]
    pub finished_at: Option<SystemTime>,
    #[serde(default)]
    pub restarts: u64,
    #[serde(default, with = "time_serde::option")]
    pub last_restart: Option<SystemTime>,
    #[serde(default)]
    pub events: EventRing,
}

impl TaskStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently recorded event.
    pub fn last_event(&self) -> Option<&TaskEvent> {
        self.events.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskEventKind;

    #[test]
    fn only_dead_is_terminal() {
        assert!(TaskState::Dead.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn status_json_uses_camel_case_and_millis() {
        let mut status = TaskStatus::new();
        status.state = TaskState::Running;
        status.started_at = Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1500));
        status.events.push(TaskEvent::new(TaskEventKind::Started));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["startedAt"], 1500);
        assert!(json["finishedAt"].is_null());

        let back: TaskStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back.state, TaskState::Running);
        assert_eq!(back.events.len(), 1);
        assert_eq!(back.started_at, status.started_at);
    }
}
