use std::{process::Stdio, sync::Arc};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, trace};
use ward_core::{Driver, DriverContext, DriverError, DriverFactory, DriverHandle, ExecContext};
use ward_model::Task;

use crate::{
    config::ExecConfig,
    error::ExecError,
    handle::ExecHandle,
    util::{cmd_program, is_alive},
};

pub const DRIVER_NAME: &str = "exec";

/// Registers the `exec` driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecDriverFactory;

impl DriverFactory for ExecDriverFactory {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn build(&self, ctx: DriverContext) -> Result<Arc<dyn Driver>, DriverError> {
        Ok(Arc::new(ExecDriver::new(ctx)))
    }
}

#[derive(Debug)]
pub struct ExecDriver {
    ctx: DriverContext,
}

impl ExecDriver {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Driver for ExecDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    async fn prestart(&self, _ctx: &ExecContext, task: &Task) -> Result<(), DriverError> {
        let cfg = ExecConfig::from_value(&task.config)?;
        if cfg.command.contains('/') && !std::path::Path::new(&cfg.command).exists() {
            return Err(ExecError::NotFound(cfg.command).into());
        }
        Ok(())
    }

    async fn start(
        &self,
        ctx: &ExecContext,
        task: &Task,
    ) -> Result<Arc<dyn DriverHandle>, DriverError> {
        let cfg = ExecConfig::from_value(&task.config)?;
        trace!(target: "ward.exec", program = %cfg.command, args = ?cfg.args, "spawn");

        let mut cmd = cmd_program(&cfg.command, &cfg.args);
        cmd.envs(ctx.env.resolved());
        if ctx.task_dir.is_dir() {
            cmd.current_dir(&ctx.task_dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(if cfg.log_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExecError::NotFound(cfg.command.clone()),
            _ => ExecError::Spawn(e.to_string()),
        })?;
        let pid = child
            .id()
            .ok_or_else(|| ExecError::Spawn("process exited before its pid was read".into()))?
            as i32;

        if let Some(stdout) = child.stdout.take() {
            let task_name = self.ctx.task_name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "ward.exec.out", task = %task_name, %line);
                }
            });
        }

        debug!(target: "ward.exec", task = %self.ctx.task_name, pid, "process spawned");
        self.ctx.emitter.emit(format!("spawned pid {pid}"));
        Ok(Arc::new(ExecHandle::spawned(child, pid)))
    }

    async fn open(
        &self,
        _ctx: &ExecContext,
        handle_id: &str,
    ) -> Result<Arc<dyn DriverHandle>, DriverError> {
        let pid = ExecHandle::parse_id(handle_id)
            .ok_or_else(|| ExecError::HandleId(handle_id.to_string()))?;
        if !is_alive(pid) {
            return Err(ExecError::Gone(pid).into());
        }
        debug!(target: "ward.exec", task = %self.ctx.task_name, pid, "reattached to process");
        Ok(Arc::new(ExecHandle::adopted(pid)))
    }
}
