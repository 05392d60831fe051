use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::{WaitResult, domain::time_serde};

/// What a recorded task event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskEventKind {
    /// A prestart hook failed.
    SetupFailure,
    /// The driver failed to prestart or start the task.
    DriverFailure,
    /// The driver started the task.
    Started,
    /// A handle from before an agent restart was reopened.
    Reattached,
    /// The driver handle exited.
    Terminated,
    /// The restart policy scheduled another attempt.
    Restarting,
    /// The restart policy gave up.
    NotRestarting,
    /// A kill was requested.
    Killing,
    /// The handle was confirmed destroyed, or destroying it was given up on.
    Killed,
    /// Informational message emitted by the driver.
    DriverMessage,
}

impl TaskEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEventKind::SetupFailure => "Setup Failure",
            TaskEventKind::DriverFailure => "Driver Failure",
            TaskEventKind::Started => "Started",
            TaskEventKind::Reattached => "Reattached",
            TaskEventKind::Terminated => "Terminated",
            TaskEventKind::Restarting => "Restarting",
            TaskEventKind::NotRestarting => "Not Restarting",
            TaskEventKind::Killing => "Killing",
            TaskEventKind::Killed => "Killed",
            TaskEventKind::DriverMessage => "Driver",
        }
    }
}

impl std::fmt::Display for TaskEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a task's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    #[serde(with = "time_serde")]
    pub time: SystemTime,
    /// Human readable summary, filled by [`TaskEvent::populate_display_message`].
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fails_task: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<WaitResult>,
}

impl TaskEvent {
    pub fn new(kind: TaskEventKind) -> Self {
        Self {
            kind,
            time: SystemTime::now(),
            message: String::new(),
            fails_task: false,
            restart_reason: None,
            restart_delay_ms: None,
            setup_error: None,
            driver_error: None,
            driver_message: None,
            kill_error: None,
            exit: None,
        }
    }

    pub fn fails_task(mut self) -> Self {
        self.fails_task = true;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_restart_reason(mut self, reason: impl Into<String>) -> Self {
        self.restart_reason = Some(reason.into());
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn with_setup_error(mut self, err: impl std::fmt::Display) -> Self {
        self.setup_error = Some(err.to_string());
        self
    }

    pub fn with_driver_error(mut self, err: impl std::fmt::Display) -> Self {
        self.driver_error = Some(err.to_string());
        self
    }

    pub fn with_driver_message(mut self, msg: impl Into<String>) -> Self {
        self.driver_message = Some(msg.into());
        self
    }

    pub fn with_kill_error(mut self, err: impl std::fmt::Display) -> Self {
        self.kill_error = Some(err.to_string());
        self
    }

    pub fn with_exit(mut self, exit: WaitResult) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Restart delay carried by the event, if any.
    pub fn restart_delay(&self) -> Option<Duration> {
        self.restart_delay_ms.map(Duration::from_millis)
    }

    /// Fill `message` from the structured fields when the caller left it empty,
    /// and trim surrounding whitespace either way.
    pub fn populate_display_message(&mut self) {
        if !self.message.trim().is_empty() {
            self.message = self.message.trim().to_string();
            return;
        }

        let msg = match self.kind {
            TaskEventKind::SetupFailure => match &self.setup_error {
                Some(err) => format!("Task setup failed: {err}"),
                None => "Task setup failed".to_string(),
            },
            TaskEventKind::DriverFailure => match &self.driver_error {
                Some(err) => format!("Failed to start task: {err}"),
                None => "Failed to start task".to_string(),
            },
            TaskEventKind::Started => "Task started by client".to_string(),
            TaskEventKind::Reattached => "Reattached to running task".to_string(),
            TaskEventKind::Terminated => match &self.exit {
                Some(exit) => {
                    let mut msg = format!("Exit Code: {}", exit.exit_code);
                    if exit.signal != 0 {
                        msg.push_str(&format!(", Signal: {}", exit.signal));
                    }
                    if let Some(err) = &exit.error {
                        msg.push_str(&format!(", Exit Message: {err:?}"));
                    }
                    msg
                }
                None => "Task terminated".to_string(),
            },
            TaskEventKind::Restarting => {
                let reason = self.restart_reason.as_deref().unwrap_or("Restarting");
                match self.restart_delay() {
                    Some(delay) => format!("{reason} - Task restarting in {delay:?}"),
                    None => reason.to_string(),
                }
            }
            TaskEventKind::NotRestarting => self
                .restart_reason
                .clone()
                .unwrap_or_else(|| "Task not restarting".to_string()),
            TaskEventKind::Killing => "Sent interrupt".to_string(),
            TaskEventKind::Killed => match &self.kill_error {
                Some(err) => format!("Task failed to be killed: {err}"),
                None => "Task successfully killed".to_string(),
            },
            TaskEventKind::DriverMessage => self.driver_message.clone().unwrap_or_default(),
        };
        self.message = msg.trim().to_string();
    }
}
