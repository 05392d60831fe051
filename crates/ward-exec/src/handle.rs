use std::time::Duration;

use async_trait::async_trait;
use tokio::{process::Child, sync::watch};
use tracing::{debug, trace};
use ward_core::{DriverError, DriverHandle};
use ward_model::WaitResult;

use crate::util::{is_alive, signal, wait_result};

/// Poll period for processes adopted after an agent restart.
const ADOPTED_POLL: Duration = Duration::from_secs(1);

/// Handle of one `exec` process.
///
/// A background task owns the child and publishes its exit once; every
/// `wait` observes that same result.
#[derive(Debug)]
pub struct ExecHandle {
    pid: i32,
    exit: watch::Receiver<Option<WaitResult>>,
}

impl ExecHandle {
    pub const ID_PREFIX: &'static str = "exec:";

    /// Take ownership of a freshly spawned child.
    pub(crate) fn spawned(mut child: Child, pid: i32) -> Self {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            let res = match child.wait().await {
                Ok(status) => wait_result(status),
                Err(e) => WaitResult::new(-1, 0).with_error(format!("wait: {e}")),
            };
            trace!(pid, exit = %res, "process exited");
            let _ = tx.send(Some(res));
        });
        Self { pid, exit: rx }
    }

    /// Watch a process this agent did not spawn; its exit status is unknown.
    pub(crate) fn adopted(pid: i32) -> Self {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            while is_alive(pid) {
                tokio::time::sleep(ADOPTED_POLL).await;
            }
            debug!(pid, "adopted process exited");
            let _ = tx.send(Some(
                WaitResult::new(-1, 0).with_error("exit status of reattached process is unknown"),
            ));
        });
        Self { pid, exit: rx }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn parse_id(id: &str) -> Option<i32> {
        id.strip_prefix(Self::ID_PREFIX)?
            .parse()
            .ok()
            .filter(|pid| *pid > 0)
    }

    fn exited(&self) -> bool {
        self.exit.borrow().is_some()
    }
}

#[async_trait]
impl DriverHandle for ExecHandle {
    fn id(&self) -> String {
        format!("{}{}", Self::ID_PREFIX, self.pid)
    }

    async fn wait(&self) -> WaitResult {
        let mut rx = self.exit.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(res) => res.clone().unwrap_or_default(),
            Err(_) => WaitResult::new(-1, 0).with_error("process waiter went away"),
        }
    }

    async fn kill(&self) -> Result<(), DriverError> {
        if self.exited() {
            return Ok(());
        }
        signal(self.pid, libc::SIGKILL).map_err(|e| DriverError::Kill(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_ids_round_trip() {
        assert_eq!(ExecHandle::parse_id("exec:4242"), Some(4242));
        assert_eq!(ExecHandle::parse_id("exec:0"), None);
        assert_eq!(ExecHandle::parse_id("exec:-1"), None);
        assert_eq!(ExecHandle::parse_id("docker:abc"), None);
    }
}
