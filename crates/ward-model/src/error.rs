use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid restart policy: {0}")]
    InvalidRestartPolicy(String),
    #[error("invalid task: {0}")]
    InvalidTask(String),
}
