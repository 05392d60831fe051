use thiserror::Error;
use ward_model::ModelError;

/// Errors that prevent a [`TaskRunner`](crate::TaskRunner) from being created.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("alloc {alloc_id} is missing task group {group:?}")]
    MissingTaskGroup { alloc_id: String, group: String },

    #[error("task {task:?} not found in task group {group:?}")]
    MissingTask { task: String, group: String },

    #[error("invalid allocation: {0}")]
    InvalidAlloc(#[from] ModelError),

    #[error("failed to create driver: {0}")]
    Driver(#[from] DriverError),

    #[error("failed to restore local state: {0}")]
    Restore(#[from] PersistError),
}

/// Errors returned across the driver boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("driver {0:?} is not registered")]
    NotFound(String),

    #[error("invalid driver config: {0}")]
    InvalidConfig(String),

    #[error("{message}")]
    Failed { message: String, recoverable: bool },

    #[error("kill failed: {0}")]
    Kill(String),

    #[error("handle {0:?} cannot be reopened")]
    Reattach(String),

    #[error("operation not supported by driver: {0}")]
    Unsupported(&'static str),
}

impl DriverError {
    /// Failure that may succeed on a later attempt.
    pub fn recoverable(message: impl Into<String>) -> Self {
        DriverError::Failed {
            message: message.into(),
            recoverable: true,
        }
    }

    /// Failure that will fail again no matter how often it is retried.
    pub fn fatal(message: impl Into<String>) -> Self {
        DriverError::Failed {
            message: message.into(),
            recoverable: false,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            DriverError::Failed { recoverable, .. } => *recoverable,
            DriverError::Kill(_) | DriverError::Reattach(_) => true,
            DriverError::NotFound(_)
            | DriverError::InvalidConfig(_)
            | DriverError::Unsupported(_) => false,
        }
    }
}

/// Failure of a lifecycle hook.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("hook {hook:?} failed: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub message: String,
    pub recoverable: bool,
}

impl HookError {
    pub fn recoverable(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
            recoverable: true,
        }
    }

    pub fn fatal(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
            recoverable: false,
        }
    }
}

/// Why a start attempt did not produce a running task.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("prestart: {0}")]
    Hook(#[from] HookError),
    #[error("driver: {0}")]
    Driver(#[from] DriverError),
}

impl StartError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            StartError::Hook(e) => e.recoverable,
            StartError::Driver(e) => e.is_recoverable(),
        }
    }
}

/// Failure of the durable store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateDbError {
    #[error("state db backend: {0}")]
    Backend(String),
    #[error("state db closed")]
    Closed,
}

/// Failure to persist or restore local state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Encoding/decoding failed; nothing was written.
    #[error("failed to serialize local state: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The transaction failed; a later trigger may retry.
    #[error("failed to write local state: {0}")]
    Store(#[from] StateDbError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_by_variant() {
        assert!(DriverError::recoverable("busy").is_recoverable());
        assert!(!DriverError::fatal("bad binary").is_recoverable());
        assert!(!DriverError::InvalidConfig("x".into()).is_recoverable());

        let hook = StartError::from(HookError::fatal("validate", "no name"));
        assert!(!hook.is_recoverable());
        let driver = StartError::from(DriverError::recoverable("port in use"));
        assert!(driver.is_recoverable());
    }

    #[test]
    fn hook_error_display_names_the_hook() {
        let e = HookError::recoverable("task_dir", "permission denied");
        assert_eq!(e.to_string(), "hook \"task_dir\" failed: permission denied");
    }
}
