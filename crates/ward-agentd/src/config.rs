use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use ward_observe::LoggerConfig;

pub const ENV_STATE_DB: &str = "WARD_STATE_DB";
pub const ENV_ALLOC_DIR: &str = "WARD_ALLOC_DIR";
pub const ENV_METRICS_FILE: &str = "WARD_METRICS_FILE";
pub const ENV_DISABLE_TAGGED_METRICS: &str = "WARD_DISABLE_TAGGED_METRICS";

/// Agent settings, read from the environment plus one positional argument.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub logger: LoggerConfig,
    /// Allocation JSON to run.
    pub alloc_file: PathBuf,
    /// SQLite file for local state; in-memory when unset.
    pub state_db: Option<PathBuf>,
    pub alloc_dir: Option<PathBuf>,
    /// Where to write the Prometheus text exposition on exit.
    pub metrics_file: Option<PathBuf>,
    pub disable_tagged_metrics: bool,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_parts(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    pub fn from_parts(
        mut args: impl Iterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let Some(alloc_file) = args.next() else {
            bail!("usage: ward-agentd <alloc.json>");
        };
        let logger = LoggerConfig::from_lookup(&lookup).context("invalid logger config")?;
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        let disable_tagged_metrics = match lookup(ENV_DISABLE_TAGGED_METRICS).as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("{ENV_DISABLE_TAGGED_METRICS} must be true or false, got {other:?}"),
        };

        Ok(Self {
            logger,
            alloc_file: PathBuf::from(alloc_file),
            state_db: path(ENV_STATE_DB),
            alloc_dir: path(ENV_ALLOC_DIR),
            metrics_file: path(ENV_METRICS_FILE),
            disable_tagged_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(args: &[&str], env: &[(&str, &str)]) -> Result<AgentConfig> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_parts(args.iter().map(|s| s.to_string()), |k| env.get(k).cloned())
    }

    #[test]
    fn reads_paths_and_flags() {
        let cfg = parse(
            &["alloc.json"],
            &[
                (ENV_STATE_DB, "/var/lib/ward/state.db"),
                (ENV_ALLOC_DIR, ""),
                (ENV_DISABLE_TAGGED_METRICS, "true"),
                ("WARD_LOG_LEVEL", "debug"),
            ],
        )
        .unwrap();
        assert_eq!(cfg.alloc_file, PathBuf::from("alloc.json"));
        assert_eq!(cfg.state_db, Some(PathBuf::from("/var/lib/ward/state.db")));
        assert_eq!(cfg.alloc_dir, None);
        assert!(cfg.disable_tagged_metrics);
        assert_eq!(cfg.logger.level, "debug");
    }

    #[test]
    fn rejects_missing_alloc_and_bad_flag() {
        assert!(parse(&[], &[]).is_err());
        assert!(parse(&["a.json"], &[(ENV_DISABLE_TAGGED_METRICS, "maybe")]).is_err());
    }
}
