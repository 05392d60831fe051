//! Node-local task execution engine.
//!
//! A [`TaskRunner`] owns one task of one allocation: it starts the task through
//! a pluggable [`Driver`], waits for it, consults the [`RestartTracker`] after
//! every exit, records status and events, persists node-local state through a
//! [`StateDb`], and tears the task down with bounded retries on kill.

pub mod config;
pub use config::{KillPolicy, RunnerConfig};

pub mod driver;
pub use driver::{
    Driver, DriverContext, DriverFactory, DriverHandle, DriverRegistry, EventEmitter, ExecContext,
};

pub mod env;
pub use env::EnvBuilder;

pub mod error;
pub use error::{DriverError, HookError, PersistError, RunnerError, StartError, StateDbError};

pub mod hooks;
pub use hooks::{HookPipeline, PoststartHook, PrestartHook, StopHook, TaskHook};

pub mod metrics;
pub use metrics::{AllocCounter, MetricLabels, MetricsBackend, NoopMetrics};

pub mod restarts;
pub use restarts::{RestartTracker, RestartVerdict};

pub mod runner;
pub use runner::{DestroyOutcome, StateUpdate, TaskRunner, TaskRunnerBuilder};

pub mod state;
pub use state::{LocalStateStore, MemStateDb, PersistOutcome, StateDb, StateTx, TaskKey};

pub mod updater;
pub use updater::{NoopUpdater, StateUpdater};

mod sync;
