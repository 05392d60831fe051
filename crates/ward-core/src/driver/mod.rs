//! Driver boundary.
//!
//! A [`Driver`] knows how to launch a task; the [`DriverHandle`] it returns is
//! the only thing the runner keeps of a live task. Concrete drivers live in
//! their own crates and are instantiated by name through a [`DriverRegistry`].

mod registry;
pub use registry::DriverRegistry;

use std::{fmt, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use ward_model::{Task, TaskEnv, WaitResult};

use crate::error::DriverError;

/// Everything a driver needs to launch one attempt.
///
/// Rebuilt before every driver call, since hooks may have changed the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecContext {
    pub task_dir: PathBuf,
    pub env: TaskEnv,
}

/// One live execution instance.
#[async_trait]
pub trait DriverHandle: Send + Sync {
    /// Stable identifier that [`Driver::open`] accepts after an agent restart.
    fn id(&self) -> String;

    /// Resolves once the task has exited.
    ///
    /// The exit is observed exactly once by the driver; every call after that
    /// returns the same result.
    async fn wait(&self) -> WaitResult;

    /// Ask the task to stop. `Ok` means the stop signal was delivered.
    async fn kill(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prepare the node for `task` (validate config, fetch artifacts).
    async fn prestart(&self, ctx: &ExecContext, task: &Task) -> Result<(), DriverError>;

    /// Launch `task` and return its handle.
    async fn start(
        &self,
        ctx: &ExecContext,
        task: &Task,
    ) -> Result<Arc<dyn DriverHandle>, DriverError>;

    /// Reattach to a task started before an agent restart.
    async fn open(
        &self,
        _ctx: &ExecContext,
        _handle_id: &str,
    ) -> Result<Arc<dyn DriverHandle>, DriverError> {
        Err(DriverError::Unsupported("open"))
    }
}

/// Builds a driver for one task runner.
pub trait DriverFactory: Send + Sync {
    /// Name tasks refer to in their `driver` field.
    fn name(&self) -> &'static str;

    fn build(&self, ctx: DriverContext) -> Result<Arc<dyn Driver>, DriverError>;
}

/// Sink for informational driver messages; recorded as task events without a
/// status change.
#[derive(Clone)]
pub struct EventEmitter(Arc<dyn Fn(String) + Send + Sync>);

impl EventEmitter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, msg: impl Into<String>) {
        (self.0)(msg.into())
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventEmitter")
    }
}

/// Identity of the task a driver is built for.
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub job_name: String,
    pub task_group: String,
    pub task_name: String,
    pub alloc_id: String,
    pub emitter: EventEmitter,
}
