mod allocation;
pub use allocation::{Allocation, Job, JobType, TaskGroup};

mod restart;
pub use restart::{DelayStrategy, RestartMode, RestartPolicy};

mod task;
pub use task::Task;
