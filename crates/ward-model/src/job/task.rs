use serde::{Deserialize, Serialize};

use crate::{ModelError, TaskEnv};

/// A single task inside a task group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    /// Name of the driver that runs this task (e.g. `"exec"`).
    pub driver: String,
    /// Driver-specific configuration; the runner never looks inside.
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "TaskEnv::is_empty")]
    pub env: TaskEnv,
}

impl Task {
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
            config: serde_json::Value::Null,
            env: TaskEnv::new(),
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_env(mut self, env: TaskEnv) -> Self {
        self.env = env;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidTask("task name is empty".into()));
        }
        if self.name.contains('/') || self.name.contains("..") {
            return Err(ModelError::InvalidTask(format!(
                "task name {:?} is not a valid path component",
                self.name
            )));
        }
        if self.driver.trim().is_empty() {
            return Err(ModelError::InvalidTask(format!(
                "task {:?} has no driver",
                self.name
            )));
        }
        self.env.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_name_and_driver() {
        assert!(Task::new("web", "exec").validate().is_ok());
        assert!(Task::new("", "exec").validate().is_err());
        assert!(Task::new("web", " ").validate().is_err());
        assert!(Task::new("../etc", "exec").validate().is_err());
    }
}
