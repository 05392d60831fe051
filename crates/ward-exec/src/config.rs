use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Driver config of an `exec` task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Forward stdout lines to the agent log at debug level.
    #[serde(default)]
    pub log_stdout: bool,
}

impl ExecConfig {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ExecError> {
        let cfg: ExecConfig = serde_json::from_value(value.clone())?;
        if cfg.command.trim().is_empty() {
            return Err(ExecError::MissingCommand);
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_and_requires_command() {
        let cfg = ExecConfig::from_value(&json!({"command": "sleep", "args": ["1"]})).unwrap();
        assert_eq!(cfg.command, "sleep");
        assert_eq!(cfg.args, vec!["1".to_string()]);
        assert!(!cfg.log_stdout);

        assert!(matches!(
            ExecConfig::from_value(&json!({"command": " "})),
            Err(ExecError::MissingCommand)
        ));
        assert!(matches!(
            ExecConfig::from_value(&json!({"args": []})),
            Err(ExecError::Config(_))
        ));
    }
}
