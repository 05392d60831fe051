use serde::{Deserialize, Serialize};

/// How a driver handle finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitResult {
    pub exit_code: i32,
    /// Terminating signal, `0` if none.
    #[serde(default)]
    pub signal: i32,
    /// Driver-side error observed while waiting, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WaitResult {
    pub fn new(exit_code: i32, signal: i32) -> Self {
        Self {
            exit_code,
            signal,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Exit code zero, no signal, no error.
    pub fn successful(&self) -> bool {
        self.exit_code == 0 && self.signal == 0 && self.error.is_none()
    }
}

impl std::fmt::Display for WaitResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exit code: {}, signal: {}", self.exit_code, self.signal)?;
        if let Some(err) = &self.error {
            write!(f, ", error: {err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::WaitResult;

    #[test]
    fn successful_requires_clean_exit() {
        assert!(WaitResult::new(0, 0).successful());
        assert!(!WaitResult::new(1, 0).successful());
        assert!(!WaitResult::new(0, 9).successful());
        assert!(!WaitResult::new(0, 0).with_error("lost").successful());
    }
}
