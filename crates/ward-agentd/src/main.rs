mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use ward_core::{DriverRegistry, MemStateDb, RunnerConfig, StateDb, TaskRunner};
use ward_exec::ExecDriverFactory;
use ward_model::Allocation;
use ward_observe::{EventJournal, logger_init};
use ward_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
use ward_state::SqliteStateDb;

use crate::config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AgentConfig::from_env()?;
    logger_init(&cfg.logger)?;
    info!(format = %cfg.logger.format, level = %cfg.logger.level, "logger initialized");

    let raw = std::fs::read(&cfg.alloc_file)
        .with_context(|| format!("reading {}", cfg.alloc_file.display()))?;
    let alloc: Allocation = serde_json::from_slice(&raw)
        .with_context(|| format!("decoding {}", cfg.alloc_file.display()))?;
    let group = alloc
        .group()
        .with_context(|| format!("alloc {} has no task group {:?}", alloc.id, alloc.task_group))?;
    let task_names: Vec<String> = group.tasks.iter().map(|t| t.name.clone()).collect();

    let db: Arc<dyn StateDb> = match &cfg.state_db {
        Some(path) => Arc::new(SqliteStateDb::open(path).context("opening state db")?),
        None => {
            warn!("no state db configured, local state will not survive a restart");
            Arc::new(MemStateDb::new())
        }
    };
    let metrics = PrometheusMetrics::new().context("registering metrics")?;
    let drivers = DriverRegistry::new().with(Arc::new(ExecDriverFactory));

    let mut runner_cfg = RunnerConfig {
        disable_tagged_metrics: cfg.disable_tagged_metrics,
        ..RunnerConfig::default()
    };
    if let Some(dir) = &cfg.alloc_dir {
        runner_cfg.alloc_dir = dir.clone();
    }

    let mut runners = Vec::with_capacity(task_names.len());
    for name in &task_names {
        let runner = TaskRunner::builder(alloc.clone(), name)
            .with_config(runner_cfg.clone())
            .with_drivers(drivers.clone())
            .with_state_db(db.clone())
            .with_metrics(Arc::new(metrics.clone()))
            .with_updater(Arc::new(EventJournal::new()))
            .build()
            .with_context(|| format!("creating runner for task {name:?}"))?;
        runner.spawn();
        runners.push(runner);
    }
    info!(alloc = %alloc.id, tasks = runners.len(), "allocation running");

    let all_done = wait_all(&runners);
    tokio::select! {
        _ = all_done => info!("all tasks finished"),
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutting down, tasks are left running");
            for runner in &runners {
                runner.shutdown();
            }
            wait_all(&runners).await;
        }
    }

    for runner in &runners {
        let status = runner.status();
        info!(task = runner.task_name(), state = %status.state, failed = status.failed, restarts = status.restarts, "final task status");
    }

    if let Some(path) = &cfg.metrics_file {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metrics.gather(), &mut buf)
            .context("encoding metrics")?;
        std::fs::write(path, buf).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Resolves once every runner's loop has exited.
async fn wait_all(runners: &[Arc<TaskRunner>]) {
    for runner in runners {
        runner.wait().await;
    }
}
