mod kv;
pub use kv::KeyValue;

mod task_env;
pub use task_env::TaskEnv;

mod task_state;
pub use task_state::{TaskState, TaskStatus};

mod task_event;
pub use task_event::{TaskEvent, TaskEventKind};

mod event_ring;
pub use event_ring::{EventRing, TASK_EVENT_CAPACITY};

mod wait_result;
pub use wait_result::WaitResult;

mod local_state;
pub use local_state::LocalState;

pub(crate) mod time_serde;

/// Allocation identifier assigned by the cluster controller.
pub type AllocId = String;
