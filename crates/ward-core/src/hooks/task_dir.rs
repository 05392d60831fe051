use async_trait::async_trait;
use ward_model::TaskEnv;

use super::{PrestartHook, PrestartRequest, PrestartResponse, TaskHook};
use crate::{env::ENV_TASK_DIR, error::HookError};

/// Subdirectory of the task directory handed to the task as scratch space.
pub const LOCAL_DIR: &str = "local";

/// Creates the task directory and exports its path.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskDirHook;

impl TaskHook for TaskDirHook {
    fn name(&self) -> &'static str {
        "task_dir"
    }
}

#[async_trait]
impl PrestartHook for TaskDirHook {
    async fn prestart(&self, req: &PrestartRequest) -> Result<PrestartResponse, HookError> {
        let local = req.task_dir.join(LOCAL_DIR);
        tokio::fs::create_dir_all(&local).await.map_err(|e| {
            HookError::recoverable(
                self.name(),
                format!("failed to create {}: {e}", local.display()),
            )
        })?;

        let mut env = TaskEnv::new();
        env.push(ENV_TASK_DIR, req.task_dir.to_string_lossy());
        Ok(PrestartResponse { env })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_model::Task;

    #[tokio::test]
    async fn creates_local_dir_and_exports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let task_dir = tmp.path().join("a-1").join("web");
        let req = PrestartRequest {
            task: Task::new("web", "exec"),
            task_dir: task_dir.clone(),
            env: TaskEnv::new(),
        };

        let resp = TaskDirHook.prestart(&req).await.unwrap();
        assert!(task_dir.join(LOCAL_DIR).is_dir());
        assert_eq!(
            resp.env.get(ENV_TASK_DIR),
            Some(task_dir.to_string_lossy().as_ref())
        );
    }
}
