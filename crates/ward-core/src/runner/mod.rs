//! Task runner: one long-lived run loop per task of an allocation.
//!
//! ```text
//!            ┌──────────── restart (after delay) ────────────┐
//!            ▼                                               │
//!   Pending ──prestart hooks──driver start──▶ Running ──exit──┤
//!      │                                       │             │
//!      └──── start error ──────────────────────┴─────────────┴──▶ Dead
//! ```
//!
//! The loop is driven by [`TaskRunner::run`]. Other actors talk to it only
//! through [`TaskRunner::update`], [`TaskRunner::kill`] and the shutdown token.

mod destroy;
pub use destroy::{DestroyOutcome, destroy_with_backoff};

mod lifecycle;

mod status;
pub use status::StateUpdate;


use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use ward_model::{Allocation, LocalState, Task, TaskEvent, TaskEventKind, TaskStatus};

use crate::{
    config::RunnerConfig,
    driver::{Driver, DriverContext, DriverHandle, DriverRegistry, EventEmitter},
    env::EnvBuilder,
    error::{PersistError, RunnerError},
    hooks::HookPipeline,
    metrics::{MetricLabels, MetricsBackend, NoopMetrics},
    restarts::RestartTracker,
    state::{LocalStateStore, MemStateDb, PersistOutcome, StateDb, TaskKey},
    sync::{lock, read, write},
    updater::{NoopUpdater, StateUpdater},
};

/// Pending allocation updates; a sender waits while one is unconsumed.
const UPDATE_QUEUE: usize = 1;

pub struct TaskRunner {
    alloc_id: String,
    task_name: String,
    config: RunnerConfig,

    alloc: Mutex<Allocation>,
    task: Task,

    // lock order: handle → status → local_state
    handle: Mutex<Option<Arc<dyn DriverHandle>>>,
    status: Mutex<TaskStatus>,
    local_state: RwLock<LocalState>,
    store: LocalStateStore,

    shutdown: CancellationToken,
    kill_requested: CancellationToken,
    done: CancellationToken,
    destroy_outcome: Mutex<Option<DestroyOutcome>>,

    update_tx: mpsc::Sender<Allocation>,
    update_rx: Mutex<Option<mpsc::Receiver<Allocation>>>,

    driver: Arc<dyn Driver>,
    env: Mutex<EnvBuilder>,
    restarts: Mutex<RestartTracker>,
    hooks: HookPipeline,

    metrics: Arc<dyn MetricsBackend>,
    labels: MetricLabels,
    updater: Arc<dyn StateUpdater>,
}

impl TaskRunner {
    pub fn builder(alloc: Allocation, task_name: impl Into<String>) -> TaskRunnerBuilder {
        TaskRunnerBuilder::new(alloc, task_name)
    }

    pub fn alloc_id(&self) -> &str {
        &self.alloc_id
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Latest allocation pushed through [`TaskRunner::update`].
    pub fn alloc(&self) -> Allocation {
        lock(&self.alloc).clone()
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> TaskStatus {
        lock(&self.status).clone()
    }

    pub fn local_state(&self) -> LocalState {
        read(&self.local_state).clone()
    }

    /// The live driver handle, if the task is running.
    pub fn handle(&self) -> Option<Arc<dyn DriverHandle>> {
        lock(&self.handle).clone()
    }

    /// Cancelling this token stops the run loop without killing the task.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once the run loop has exited.
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Run the loop on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }

    /// Hand a new version of the allocation to the run loop.
    ///
    /// Waits while a previous update is still unconsumed, but returns
    /// immediately once the run loop has exited.
    pub async fn update(&self, alloc: Allocation) {
        if self.done.is_cancelled() {
            return;
        }
        tokio::select! {
            res = self.update_tx.send(alloc) => {
                if res.is_err() {
                    debug!(task = %self.task_name, "update dropped, run loop gone");
                }
            }
            _ = self.done.cancelled() => {
                debug!(task = %self.task_name, "update dropped, run loop exited");
            }
        }
    }

    /// Stop the task and wait for the run loop to exit.
    ///
    /// The loop destroys the live handle with bounded retries; the returned
    /// outcome says whether it was confirmed gone. If the loop has already
    /// left a task running (after shutdown) or was never spawned, the handle
    /// is destroyed here instead and the loop can no longer be started.
    pub async fn kill(&self) -> DestroyOutcome {
        let never_spawned = lock(&self.update_rx).take().is_some();
        if !never_spawned {
            self.request_kill();
            self.done.cancelled().await;
            if let Some(outcome) = lock(&self.destroy_outcome).clone() {
                return outcome;
            }
        }
        self.kill_detached(never_spawned).await
    }

    /// Destroy whatever the exited (or never started) loop left behind.
    async fn kill_detached(&self, never_spawned: bool) -> DestroyOutcome {
        if never_spawned {
            self.restore().await;
        }
        if never_spawned || self.handle().is_some() {
            lock(&self.restarts).set_killed();
            self.emit_event(TaskEvent::new(TaskEventKind::Killing));
            self.handle_kill().await;
        }
        self.done.cancel();
        lock(&self.destroy_outcome)
            .clone()
            .unwrap_or_else(DestroyOutcome::nothing_to_destroy)
    }

    /// Ask the run loop to kill the task without waiting for it.
    pub fn request_kill(&self) {
        if self.kill_requested.is_cancelled() || self.done.is_cancelled() {
            return;
        }
        lock(&self.restarts).set_killed();
        self.kill_requested.cancel();
        self.emit_event(TaskEvent::new(TaskEventKind::Killing));
    }

    /// Write local state if it changed since the last write.
    pub fn persist_local_state(&self) -> Result<PersistOutcome, PersistError> {
        self.store.persist(&self.local_state)
    }

    /// Store `handle` and record its id in local state for reattachment.
    fn set_handle(&self, handle: Option<Arc<dyn DriverHandle>>) {
        let id = handle.as_ref().map(|h| h.id());
        *lock(&self.handle) = handle;
        write(&self.local_state).handle_id = id;
        self.persist_logged();
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("alloc_id", &self.alloc_id)
            .field("task", &self.task_name)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TaskRunner`].
pub struct TaskRunnerBuilder {
    alloc: Allocation,
    task_name: String,
    config: RunnerConfig,
    drivers: DriverRegistry,
    db: Arc<dyn StateDb>,
    metrics: Arc<dyn MetricsBackend>,
    updater: Arc<dyn StateUpdater>,
    hooks: HookPipeline,
}

impl TaskRunnerBuilder {
    pub fn new(alloc: Allocation, task_name: impl Into<String>) -> Self {
        Self {
            alloc,
            task_name: task_name.into(),
            config: RunnerConfig::default(),
            drivers: DriverRegistry::new(),
            db: Arc::new(MemStateDb::new()),
            metrics: Arc::new(NoopMetrics),
            updater: Arc::new(NoopUpdater),
            hooks: HookPipeline::builtin(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_state_db(mut self, db: Arc<dyn StateDb>) -> Self {
        self.db = db;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_updater(mut self, updater: Arc<dyn StateUpdater>) -> Self {
        self.updater = updater;
        self
    }

    /// Replace the hook pipeline. Start from [`HookPipeline::builtin`] to keep
    /// task validation and task directory setup.
    pub fn with_hooks(mut self, hooks: HookPipeline) -> Self {
        self.hooks = hooks;
        self
    }

    /// Resolve the task, build its driver and load persisted local state.
    pub fn build(self) -> Result<Arc<TaskRunner>, RunnerError> {
        let alloc = self.alloc;
        let group = alloc.group().ok_or_else(|| RunnerError::MissingTaskGroup {
            alloc_id: alloc.id.clone(),
            group: alloc.task_group.clone(),
        })?;
        group.restart_policy.validate()?;
        let task = group
            .lookup_task(&self.task_name)
            .cloned()
            .ok_or_else(|| RunnerError::MissingTask {
                task: self.task_name.clone(),
                group: group.name.clone(),
            })?;
        let policy = group.restart_policy;
        let job_type = alloc.job.job_type;

        let slot: Arc<OnceLock<Weak<TaskRunner>>> = Arc::new(OnceLock::new());
        let emitter = {
            let slot = Arc::clone(&slot);
            EventEmitter::new(move |msg| {
                if let Some(runner) = slot.get().and_then(Weak::upgrade) {
                    runner.emit_event(
                        TaskEvent::new(TaskEventKind::DriverMessage).with_driver_message(msg),
                    );
                }
            })
        };
        let driver = self.drivers.build(
            &task.driver,
            DriverContext {
                job_name: alloc.job.name.clone(),
                task_group: alloc.task_group.clone(),
                task_name: task.name.clone(),
                alloc_id: alloc.id.clone(),
                emitter,
            },
        )?;

        let store = LocalStateStore::new(self.db, TaskKey::new(&alloc.id, &task.name));
        let local_state = store.load()?.unwrap_or_default();

        let status = alloc
            .task_states
            .get(&task.name)
            .cloned()
            .unwrap_or_default();
        let labels = MetricLabels {
            job: alloc.job.name.clone(),
            task_group: alloc.task_group.clone(),
            alloc_id: alloc.id.clone(),
            task: task.name.clone(),
        };
        let env = EnvBuilder::new(&alloc, &task, &self.config.alloc_dir);
        let (update_tx, update_rx) = mpsc::channel(UPDATE_QUEUE);

        let runner = Arc::new(TaskRunner {
            alloc_id: alloc.id.clone(),
            task_name: task.name.clone(),
            config: self.config,
            alloc: Mutex::new(alloc),
            task,
            handle: Mutex::new(None),
            status: Mutex::new(status),
            local_state: RwLock::new(local_state),
            store,
            shutdown: CancellationToken::new(),
            kill_requested: CancellationToken::new(),
            done: CancellationToken::new(),
            destroy_outcome: Mutex::new(None),
            update_tx,
            update_rx: Mutex::new(Some(update_rx)),
            driver,
            env: Mutex::new(env),
            restarts: Mutex::new(RestartTracker::new(policy, job_type)),
            hooks: self.hooks,
            metrics: self.metrics,
            labels,
            updater: self.updater,
        });
        let _ = slot.set(Arc::downgrade(&runner));

        debug!(alloc = %runner.alloc_id, task = %runner.task_name, driver = runner.driver.name(), "task runner created");
        Ok(runner)
    }
}
