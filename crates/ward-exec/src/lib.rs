//! `exec` driver: runs a task as a plain child process of the agent.
//!
//! Task config:
//!
//! ```json
//! { "command": "/usr/bin/redis-server", "args": ["--port", "6380"] }
//! ```

mod config;
pub use config::ExecConfig;

mod driver;
pub use driver::{DRIVER_NAME, ExecDriver, ExecDriverFactory};

mod error;
pub use error::ExecError;

mod handle;
pub use handle::ExecHandle;

mod util;
