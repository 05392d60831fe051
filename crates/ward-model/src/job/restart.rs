use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{JobType, ModelError};

/// What happens once `attempts` restarts have been spent inside one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestartMode {
    /// Give up; the task is marked dead and failed.
    #[default]
    Fail,
    /// Wait until the interval rolls over, then keep restarting.
    Delay,
}

/// How the per-restart delay grows within an interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DelayStrategy {
    /// Every restart waits `delay`.
    #[default]
    Fixed,
    /// The n-th restart in the interval waits `delay × 2^(n-1)`, capped at `max_delay_ms`.
    #[serde(rename_all = "camelCase")]
    Exponential { max_delay_ms: u64 },
}

/// Restart policy of a task group.
///
/// At most `attempts` restarts are allowed per `interval`; each restart waits
/// `delay` (grown per [`DelayStrategy`]) before the task is started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartPolicy {
    pub attempts: u32,
    pub interval_ms: u64,
    pub delay_ms: u64,
    #[serde(default)]
    pub mode: RestartMode,
    #[serde(default)]
    pub delay_strategy: DelayStrategy,
}

impl RestartPolicy {
    /// Defaults applied when a job does not carry its own policy.
    ///
    /// - service/system: 2 attempts per 30m, 15s delay
    /// - batch: 3 attempts per 24h, 15s delay
    pub fn for_job_type(job_type: JobType) -> Self {
        match job_type {
            JobType::Service | JobType::System => Self {
                attempts: 2,
                interval_ms: 30 * 60 * 1000,
                delay_ms: 15_000,
                mode: RestartMode::Fail,
                delay_strategy: DelayStrategy::Fixed,
            },
            JobType::Batch => Self {
                attempts: 3,
                interval_ms: 24 * 60 * 60 * 1000,
                delay_ms: 15_000,
                mode: RestartMode::Fail,
                delay_strategy: DelayStrategy::Fixed,
            },
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Base delay (before jitter) for the `attempt`-th restart in the current interval (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.delay_strategy {
            DelayStrategy::Fixed => self.delay(),
            DelayStrategy::Exponential { max_delay_ms } => {
                let exp = attempt.saturating_sub(1).min(32) as i32;
                let ms = self.delay_ms as f64 * 2f64.powi(exp);
                if !ms.is_finite() || ms > max_delay_ms as f64 {
                    Duration::from_millis(max_delay_ms)
                } else {
                    Duration::from_millis(ms as u64)
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.attempts > 0 && self.interval_ms == 0 {
            return Err(ModelError::InvalidRestartPolicy(
                "interval must be positive when attempts are allowed".into(),
            ));
        }
        if let DelayStrategy::Exponential { max_delay_ms } = self.delay_strategy
            && max_delay_ms < self.delay_ms
        {
            return Err(ModelError::InvalidRestartPolicy(format!(
                "max delay {max_delay_ms}ms is below base delay {}ms",
                self.delay_ms
            )));
        }
        Ok(())
    }
}
