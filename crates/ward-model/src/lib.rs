//! Data model shared by the ward task runner crates.
//!
//! Everything here is plain serde data: the allocation handed down by the
//! cluster, the task definitions it carries, and the status/event records the
//! runner reports back up.

mod domain;
pub use domain::*;

mod job;
pub use job::*;

mod error;
pub use error::ModelError;
