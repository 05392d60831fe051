//! Lifecycle hooks run around every start attempt.
//!
//! - prestart: runs before the driver; the first failure aborts the attempt.
//! - poststart: runs once a handle exists; failures are logged only.
//! - stop: runs once when the run loop exits; failures are logged only.

mod task_dir;
pub use task_dir::TaskDirHook;

mod validate;
pub use validate::ValidateHook;

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, warn};
use ward_model::{Task, TaskEnv};

use crate::error::HookError;

pub trait TaskHook: Send + Sync {
    fn name(&self) -> &'static str;
}

/// Input for prestart hooks.
#[derive(Debug, Clone)]
pub struct PrestartRequest {
    pub task: Task,
    pub task_dir: PathBuf,
    /// Environment as built so far, including earlier hooks' contributions.
    pub env: TaskEnv,
}

#[derive(Debug, Clone, Default)]
pub struct PrestartResponse {
    /// Variables to merge into the task environment.
    pub env: TaskEnv,
}

#[derive(Debug, Clone)]
pub struct PoststartRequest {
    pub task: Task,
    pub handle_id: String,
}

#[derive(Debug, Clone)]
pub struct StopRequest {
    pub task: Task,
    pub task_dir: PathBuf,
}

#[async_trait]
pub trait PrestartHook: TaskHook {
    async fn prestart(&self, req: &PrestartRequest) -> Result<PrestartResponse, HookError>;
}

#[async_trait]
pub trait PoststartHook: TaskHook {
    async fn poststart(&self, req: &PoststartRequest) -> Result<(), HookError>;
}

#[async_trait]
pub trait StopHook: TaskHook {
    async fn stop(&self, req: &StopRequest) -> Result<(), HookError>;
}

/// Ordered hooks of one task runner.
#[derive(Clone, Default)]
pub struct HookPipeline {
    prestart: Vec<Arc<dyn PrestartHook>>,
    poststart: Vec<Arc<dyn PoststartHook>>,
    stop: Vec<Arc<dyn StopHook>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks every runner gets: task validation, then task directory setup.
    pub fn builtin() -> Self {
        Self::new()
            .with_prestart(Arc::new(ValidateHook))
            .with_prestart(Arc::new(TaskDirHook))
    }

    pub fn with_prestart(mut self, hook: Arc<dyn PrestartHook>) -> Self {
        self.prestart.push(hook);
        self
    }

    pub fn with_poststart(mut self, hook: Arc<dyn PoststartHook>) -> Self {
        self.poststart.push(hook);
        self
    }

    pub fn with_stop(mut self, hook: Arc<dyn StopHook>) -> Self {
        self.stop.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.prestart.len() + self.poststart.len() + self.stop.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run prestart hooks in order, stopping at the first failure.
    ///
    /// Each hook sees the environment produced by the ones before it. Returns
    /// the contribution of every hook by name.
    pub async fn run_prestart(
        &self,
        task: &Task,
        task_dir: PathBuf,
        base_env: TaskEnv,
    ) -> Result<Vec<(&'static str, TaskEnv)>, HookError> {
        let mut req = PrestartRequest {
            task: task.clone(),
            task_dir,
            env: base_env,
        };
        let mut out = Vec::with_capacity(self.prestart.len());

        for hook in &self.prestart {
            debug!(hook = hook.name(), task = %task.name, "running prestart hook");
            let resp = hook.prestart(&req).await?;
            if !resp.env.is_empty() {
                req.env = req.env.merged(&resp.env);
            }
            out.push((hook.name(), resp.env));
        }
        Ok(out)
    }

    /// Run every poststart hook; failures are logged and the first is returned.
    pub async fn run_poststart(&self, task: &Task, handle_id: &str) -> Result<(), HookError> {
        let req = PoststartRequest {
            task: task.clone(),
            handle_id: handle_id.to_string(),
        };
        let mut first = None;
        for hook in &self.poststart {
            if let Err(e) = hook.poststart(&req).await {
                warn!(hook = hook.name(), task = %task.name, error = %e, "poststart hook failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Run every stop hook; failures are logged and the first is returned.
    pub async fn run_stop(&self, task: &Task, task_dir: PathBuf) -> Result<(), HookError> {
        let req = StopRequest {
            task: task.clone(),
            task_dir,
        };
        let mut first = None;
        for hook in &self.stop {
            if let Err(e) = hook.stop(&req).await {
                warn!(hook = hook.name(), task = %task.name, error = %e, "stop hook failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prestart: Vec<_> = self.prestart.iter().map(|h| h.name()).collect();
        let poststart: Vec<_> = self.poststart.iter().map(|h| h.name()).collect();
        let stop: Vec<_> = self.stop.iter().map(|h| h.name()).collect();
        f.debug_struct("HookPipeline")
            .field("prestart", &prestart)
            .field("poststart", &poststart)
            .field("stop", &stop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Static {
        name: &'static str,
        env: Option<(&'static str, &'static str)>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Static {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                env: None,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TaskHook for Static {
        fn name(&self) -> &'static str {
            self.name
        }
    }

    #[async_trait]
    impl PrestartHook for Static {
        async fn prestart(&self, req: &PrestartRequest) -> Result<PrestartResponse, HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HookError::recoverable(self.name, "boom"));
            }
            let mut env = TaskEnv::new();
            if let Some((k, v)) = self.env {
                let seen = req.env.get(k).unwrap_or("none");
                env.push(k, format!("{v}<-{seen}"));
            }
            Ok(PrestartResponse { env })
        }
    }

    #[async_trait]
    impl StopHook for Static {
        async fn stop(&self, _req: &StopRequest) -> Result<(), HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HookError::recoverable(self.name, "boom"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn prestart_chains_env_and_stops_on_failure() {
        let a = Arc::new(Static {
            env: Some(("X", "a")),
            ..Static::new("a")
        });
        let b = Arc::new(Static {
            env: Some(("X", "b")),
            ..Static::new("b")
        });
        let pipeline = HookPipeline::new().with_prestart(a.clone()).with_prestart(b.clone());

        let out = pipeline
            .run_prestart(&Task::new("t", "mock"), PathBuf::from("/tmp"), TaskEnv::new())
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].1.get("X"), Some("b<-a<-none"));

        let failing = Arc::new(Static {
            fail: true,
            ..Static::new("failing")
        });
        let after = Arc::new(Static::new("after"));
        let pipeline = HookPipeline::new().with_prestart(failing).with_prestart(after.clone());
        let err = pipeline
            .run_prestart(&Task::new("t", "mock"), PathBuf::from("/tmp"), TaskEnv::new())
            .await
            .unwrap_err();
        assert_eq!(err.hook, "failing");
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_runs_every_hook_despite_failures() {
        let failing = Arc::new(Static {
            fail: true,
            ..Static::new("failing")
        });
        let after = Arc::new(Static::new("after"));
        let pipeline = HookPipeline::new().with_stop(failing).with_stop(after.clone());

        let err = pipeline
            .run_stop(&Task::new("t", "mock"), PathBuf::from("/tmp"))
            .await
            .unwrap_err();
        assert_eq!(err.hook, "failing");
        assert_eq!(after.calls.load(Ordering::SeqCst), 1);
    }
}
