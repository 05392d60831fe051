use std::{io, process::ExitStatus};

use tokio::process::Command;
use ward_model::WaitResult;

pub(crate) fn cmd_program(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|s| s.as_str()));
    cmd
}

#[cfg(target_family = "unix")]
pub(crate) fn wait_result(status: ExitStatus) -> WaitResult {
    use std::os::unix::process::ExitStatusExt;
    WaitResult::new(status.code().unwrap_or(-1), status.signal().unwrap_or(0))
}

#[cfg(not(target_family = "unix"))]
pub(crate) fn wait_result(status: ExitStatus) -> WaitResult {
    WaitResult::new(status.code().unwrap_or(-1), 0)
}

/// Send `sig` to `pid`. A process that is already gone counts as success.
pub(crate) fn signal(pid: i32, sig: libc::c_int) -> io::Result<()> {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

/// Whether a process with `pid` exists.
pub(crate) fn is_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only performs the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
