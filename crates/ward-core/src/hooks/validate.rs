use async_trait::async_trait;

use super::{PrestartHook, PrestartRequest, PrestartResponse, TaskHook};
use crate::error::HookError;

/// Rejects malformed task definitions before anything touches the node.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidateHook;

impl TaskHook for ValidateHook {
    fn name(&self) -> &'static str {
        "validate"
    }
}

#[async_trait]
impl PrestartHook for ValidateHook {
    async fn prestart(&self, req: &PrestartRequest) -> Result<PrestartResponse, HookError> {
        req.task
            .validate()
            .map_err(|e| HookError::fatal(self.name(), e.to_string()))?;
        Ok(PrestartResponse::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use ward_model::{Task, TaskEnv};

    #[tokio::test]
    async fn invalid_task_is_fatal() {
        let req = PrestartRequest {
            task: Task::new("../escape", "exec"),
            task_dir: PathBuf::from("/tmp"),
            env: TaskEnv::new(),
        };
        let err = ValidateHook.prestart(&req).await.unwrap_err();
        assert!(!err.recoverable);
        assert_eq!(err.hook, "validate");
    }
}
