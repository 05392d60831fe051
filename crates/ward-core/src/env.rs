use std::path::{Path, PathBuf};

use ward_model::{Allocation, Task, TaskEnv};

use crate::driver::ExecContext;

pub const ENV_ALLOC_ID: &str = "WARD_ALLOC_ID";
pub const ENV_JOB_NAME: &str = "WARD_JOB_NAME";
pub const ENV_GROUP_NAME: &str = "WARD_GROUP_NAME";
pub const ENV_TASK_NAME: &str = "WARD_TASK_NAME";
pub const ENV_ALLOC_DIR: &str = "WARD_ALLOC_DIR";
pub const ENV_TASK_DIR: &str = "WARD_TASK_DIR";

/// Builds a task's environment from its allocation, its definition and
/// whatever prestart hooks contributed.
///
/// Layering, later wins: runner variables, task `env`, hook variables in
/// registration order.
#[derive(Debug, Clone)]
pub struct EnvBuilder {
    alloc_id: String,
    job_name: String,
    group_name: String,
    task_name: String,
    alloc_dir: PathBuf,
    task_env: TaskEnv,
    hook_env: Vec<(String, TaskEnv)>,
}

impl EnvBuilder {
    pub fn new(alloc: &Allocation, task: &Task, alloc_dir: &Path) -> Self {
        Self {
            alloc_id: alloc.id.clone(),
            job_name: alloc.job.name.clone(),
            group_name: alloc.task_group.clone(),
            task_name: task.name.clone(),
            alloc_dir: alloc_dir.join(&alloc.id),
            task_env: task.env.clone(),
            hook_env: Vec::new(),
        }
    }

    /// Directory owned by this task: `<alloc_dir>/<alloc_id>/<task>`.
    pub fn task_dir(&self) -> PathBuf {
        self.alloc_dir.join(&self.task_name)
    }

    /// Replace the variables contributed by `hook`.
    pub fn set_hook_env(&mut self, hook: &str, env: TaskEnv) {
        match self.hook_env.iter_mut().find(|(name, _)| name == hook) {
            Some((_, existing)) => *existing = env,
            None => self.hook_env.push((hook.to_string(), env)),
        }
    }

    /// Refresh allocation-derived variables after an update.
    pub fn update_alloc(&mut self, alloc: &Allocation) {
        self.job_name = alloc.job.name.clone();
        self.group_name = alloc.task_group.clone();
    }

    pub fn build(&self) -> TaskEnv {
        let mut env = TaskEnv::new();
        env.push(ENV_ALLOC_ID, &self.alloc_id);
        env.push(ENV_JOB_NAME, &self.job_name);
        env.push(ENV_GROUP_NAME, &self.group_name);
        env.push(ENV_TASK_NAME, &self.task_name);
        env.push(ENV_ALLOC_DIR, self.alloc_dir.to_string_lossy());

        let mut env = env.merged(&self.task_env);
        for (_, hook) in &self.hook_env {
            env = env.merged(hook);
        }
        env
    }

    pub fn exec_context(&self) -> ExecContext {
        ExecContext {
            task_dir: self.task_dir(),
            env: self.build(),
        }
    }
}
