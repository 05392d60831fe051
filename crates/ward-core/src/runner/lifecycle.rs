use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use ward_model::{Allocation, TaskEvent, TaskEventKind, TaskState};

use super::{StateUpdate, TaskRunner};
use crate::{
    driver::DriverHandle,
    error::{DriverError, StartError},
    metrics::AllocCounter,
    restarts::RestartVerdict,
    sync::{lock, read, write},
};

/// How one start-and-wait cycle ended.
enum Attempt {
    /// The task ran and exited, or failed to start; ask the restart tracker.
    Finished,
    /// Shutdown was requested; leave the task as it is.
    Shutdown,
    /// Kill was requested.
    Killed,
}

enum Started {
    Handle(Arc<dyn DriverHandle>),
    Failed,
    Shutdown,
    Killed,
}

enum Decision {
    Restart(Duration),
    Kill,
    Exit,
}

enum Wake {
    Elapsed,
    Shutdown,
    Killed,
}

impl TaskRunner {
    /// Drive the task until it is dead, killed, or shutdown is requested.
    ///
    /// Stop hooks run on every exit path and completion is signalled once
    /// the loop is gone. Calling `run` a second time returns immediately.
    pub async fn run(self: Arc<Self>) {
        let Some(mut updates) = lock(&self.update_rx).take() else {
            warn!(task = %self.task_name, "run loop already started or runner killed");
            return;
        };
        let _done = self.done.clone().drop_guard();

        if lock(&self.status).state == TaskState::Dead {
            debug!(task = %self.task_name, "task already dead, not starting");
        } else {
            info!(alloc = %self.alloc_id, task = %self.task_name, "task run loop started");
            self.restore().await;
            self.run_loop(&mut updates).await;
        }

        let task_dir = lock(&self.env).task_dir();
        // failures are logged by the pipeline
        let _ = self.hooks.run_stop(&self.task, task_dir).await;
        debug!(task = %self.task_name, "task run loop exiting");
    }

    async fn run_loop(&self, updates: &mut mpsc::Receiver<Allocation>) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            if self.kill_requested.is_cancelled() {
                return self.handle_kill().await;
            }

            match self.run_attempt(updates).await {
                Attempt::Finished => {}
                Attempt::Shutdown => return,
                Attempt::Killed => return self.handle_kill().await,
            }

            let delay = match self.restart_decision() {
                Decision::Restart(delay) => delay,
                Decision::Kill => return self.handle_kill().await,
                Decision::Exit => return,
            };

            match self.sleep_restart(delay, updates).await {
                Wake::Elapsed => {}
                Wake::Shutdown => return,
                Wake::Killed => return self.handle_kill().await,
            }
        }
    }

    async fn run_attempt(&self, updates: &mut mpsc::Receiver<Allocation>) -> Attempt {
        let handle = match self.handle() {
            Some(reattached) => reattached,
            None => match self.start_task().await {
                Started::Handle(handle) => handle,
                Started::Failed => return Attempt::Finished,
                Started::Shutdown => return Attempt::Shutdown,
                Started::Killed => return Attempt::Killed,
            },
        };

        let handle_id = handle.id();
        if self.kill_requested.is_cancelled() {
            return Attempt::Killed;
        }
        // failures are logged by the pipeline
        let _ = self.hooks.run_poststart(&self.task, &handle_id).await;

        let wait = handle.wait();
        tokio::pin!(wait);
        let res = loop {
            tokio::select! {
                res = &mut wait => break res,
                _ = self.shutdown.cancelled() => {
                    debug!(task = %self.task_name, handle = %handle_id, "shutdown requested, leaving task running");
                    return Attempt::Shutdown;
                }
                _ = self.kill_requested.cancelled() => return Attempt::Killed,
                Some(alloc) = updates.recv() => self.apply_update(alloc),
            }
        };

        info!(task = %self.task_name, handle = %handle_id, exit = %res, "task exited");
        self.set_handle(None);
        self.emit_event(TaskEvent::new(TaskEventKind::Terminated).with_exit(res.clone()));
        lock(&self.restarts).set_wait_result(res);
        Attempt::Finished
    }

    /// Prestart hooks, then driver prestart and start, each with a freshly
    /// built execution context.
    async fn start_task(&self) -> Started {
        let (task_dir, base_env) = {
            let env = lock(&self.env);
            (env.task_dir(), env.build())
        };
        match self.hooks.run_prestart(&self.task, task_dir, base_env).await {
            Ok(contributed) => {
                let mut env = lock(&self.env);
                for (hook, vars) in contributed {
                    env.set_hook_env(hook, vars);
                }
            }
            Err(e) => {
                warn!(task = %self.task_name, error = %e, "prestart failed");
                self.emit_event(TaskEvent::new(TaskEventKind::SetupFailure).with_setup_error(&e));
                lock(&self.restarts).set_start_error(e.into());
                return Started::Failed;
            }
        }

        if self.shutdown.is_cancelled() {
            return Started::Shutdown;
        }
        if self.kill_requested.is_cancelled() {
            return Started::Killed;
        }

        let ctx = lock(&self.env).exec_context();
        if let Err(e) = self.driver.prestart(&ctx, &self.task).await {
            self.record_driver_failure(e);
            return Started::Failed;
        }

        let ctx = lock(&self.env).exec_context();
        match self.driver.start(&ctx, &self.task).await {
            Ok(handle) => {
                info!(task = %self.task_name, handle = %handle.id(), "task started");
                self.set_handle(Some(Arc::clone(&handle)));
                self.set_state(
                    StateUpdate::Transition(TaskState::Running),
                    TaskEvent::new(TaskEventKind::Started),
                );
                Started::Handle(handle)
            }
            Err(e) => {
                self.record_driver_failure(e);
                Started::Failed
            }
        }
    }

    fn record_driver_failure(&self, err: DriverError) {
        warn!(task = %self.task_name, driver = self.driver.name(), error = %err, "failed to start task");
        self.emit_event(TaskEvent::new(TaskEventKind::DriverFailure).with_driver_error(&err));
        lock(&self.restarts).set_start_error(StartError::Driver(err));
    }

    fn restart_decision(&self) -> Decision {
        let (verdict, reason) = {
            let mut tracker = lock(&self.restarts);
            let verdict = tracker.state();
            (verdict, tracker.reason().to_string())
        };
        if self.kill_requested.is_cancelled() {
            return Decision::Kill;
        }

        let with_reason = |event: TaskEvent| {
            if reason.is_empty() {
                event
            } else {
                event.with_restart_reason(reason.as_str())
            }
        };

        match verdict {
            RestartVerdict::Killed => Decision::Kill,
            RestartVerdict::Terminated => {
                info!(task = %self.task_name, reason = %reason, "task terminated, not restarting");
                self.set_state(
                    StateUpdate::Transition(TaskState::Dead),
                    with_reason(TaskEvent::new(TaskEventKind::NotRestarting)),
                );
                Decision::Exit
            }
            RestartVerdict::NotRestarting => {
                info!(task = %self.task_name, reason = %reason, "task failed, not restarting");
                self.set_state(
                    StateUpdate::Transition(TaskState::Dead),
                    with_reason(TaskEvent::new(TaskEventKind::NotRestarting)).fails_task(),
                );
                Decision::Exit
            }
            RestartVerdict::Restarting(delay) => {
                info!(task = %self.task_name, ?delay, reason = %reason, "restarting task");
                self.set_state(
                    StateUpdate::Transition(TaskState::Pending),
                    with_reason(TaskEvent::new(TaskEventKind::Restarting)).with_restart_delay(delay),
                );
                Decision::Restart(delay)
            }
            RestartVerdict::Undetermined(delay) => {
                warn!(task = %self.task_name, ?delay, "restart verdict undetermined, restarting");
                if !self.config.disable_tagged_metrics {
                    self.metrics.incr(AllocCounter::UndeterminedRestart, &self.labels);
                }
                self.set_state(
                    StateUpdate::Transition(TaskState::Pending),
                    with_reason(TaskEvent::new(TaskEventKind::Restarting)).with_restart_delay(delay),
                );
                Decision::Restart(delay)
            }
        }
    }

    async fn sleep_restart(
        &self,
        delay: Duration,
        updates: &mut mpsc::Receiver<Allocation>,
    ) -> Wake {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Wake::Elapsed,
                _ = self.shutdown.cancelled() => return Wake::Shutdown,
                _ = self.kill_requested.cancelled() => return Wake::Killed,
                Some(alloc) = updates.recv() => self.apply_update(alloc),
            }
        }
    }

    fn apply_update(&self, alloc: Allocation) {
        if let Some(group) = alloc.group() {
            match group.restart_policy.validate() {
                Ok(()) => lock(&self.restarts).set_policy(group.restart_policy),
                Err(e) => {
                    warn!(task = %self.task_name, error = %e, "ignoring invalid restart policy in update")
                }
            }
        }
        lock(&self.env).update_alloc(&alloc);
        *lock(&self.alloc) = alloc;
        debug!(task = %self.task_name, "applied allocation update");
    }

    /// Reopen a handle recorded before an agent restart.
    #[instrument(level = "debug", skip(self), fields(task = %self.task_name))]
    pub(super) async fn restore(&self) {
        let Some(id) = read(&self.local_state).handle_id.clone() else {
            return;
        };

        let ctx = lock(&self.env).exec_context();
        match self.driver.open(&ctx, &id).await {
            Ok(handle) => {
                info!(task = %self.task_name, handle = %id, "reattached to task");
                self.set_handle(Some(handle));
                self.set_state(
                    StateUpdate::Transition(TaskState::Running),
                    TaskEvent::new(TaskEventKind::Reattached),
                );
            }
            Err(e) => {
                warn!(task = %self.task_name, handle = %id, error = %e, "failed to reattach, starting fresh");
                write(&self.local_state).handle_id = None;
                self.persist_logged();
            }
        }
    }
}
