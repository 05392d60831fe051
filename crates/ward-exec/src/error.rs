use thiserror::Error;
use ward_core::DriverError;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("missing command")]
    MissingCommand,
    #[error("invalid exec config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("malformed handle id {0:?}")]
    HandleId(String),
    #[error("process {0} is not running")]
    Gone(i32),
}

impl From<ExecError> for DriverError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::MissingCommand | ExecError::Config(_) => {
                DriverError::InvalidConfig(e.to_string())
            }
            ExecError::NotFound(_) => DriverError::fatal(e.to_string()),
            ExecError::Spawn(_) => DriverError::recoverable(e.to_string()),
            ExecError::HandleId(_) | ExecError::Gone(_) => DriverError::Reattach(e.to_string()),
        }
    }
}
