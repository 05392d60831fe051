//! Restart decisions.
//!
//! [`RestartTracker`] turns the outcome of the last attempt (an exit result or
//! a start error) and the group's [`RestartPolicy`] into a [`RestartVerdict`].
//! It does no I/O; the runner feeds it and acts on the verdict.
//!
//! ```text
//! killed?                        → Killed
//! attempts == 0                  → Terminated (batch success) | NotRestarting
//! forget restarts older than one interval
//! nothing recorded               → Undetermined
//! unrecoverable start error      → NotRestarting
//! success && !restart_on_success → Terminated
//! restarts in window >= attempts → NotRestarting (mode fail) | Restarting(until oldest ages out)
//! otherwise                      → Restarting(delay + jitter)
//! ```
//!
//! The window slides: every granted restart is remembered for one interval,
//! so no span of `interval` ever holds more than `attempts` restarts.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use rand::Rng;
use ward_model::{JobType, RestartMode, RestartPolicy, WaitResult};

use crate::error::StartError;

/// Fraction of the delay added as random jitter to within-policy restarts.
pub const RESTART_JITTER: f64 = 0.25;

pub const REASON_NO_RESTARTS_ALLOWED: &str = "Policy allows no restarts";
pub const REASON_UNRECOVERABLE_ERROR: &str = "Error was unrecoverable";
pub const REASON_WITHIN_POLICY: &str = "Restart within policy";
pub const REASON_DELAY: &str = "Exceeded allowed attempts, applying a delay";
pub const REASON_SUCCESSFUL_EXIT: &str = "Restart unnecessary as task terminated successfully";

/// Outcome of one restart evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartVerdict {
    /// The task was killed on purpose; never restart.
    Killed,
    /// The task finished and does not need to run again.
    Terminated,
    /// The policy gave up; the task has failed.
    NotRestarting,
    /// Start again after the delay.
    Restarting(Duration),
    /// Evaluated without any recorded outcome. Callers restart after the delay
    /// but should surface it, since it points at a bookkeeping bug.
    Undetermined(Duration),
}

#[derive(Debug)]
pub struct RestartTracker {
    policy: RestartPolicy,
    restart_on_success: bool,

    wait_res: Option<WaitResult>,
    start_err: Option<StartError>,
    failure: bool,
    killed: bool,

    /// When each restart inside the current window was scheduled to happen.
    restarts: VecDeque<Instant>,
    reason: String,
}

impl RestartTracker {
    /// Service and system jobs restart after a clean exit; batch jobs do not.
    pub fn new(policy: RestartPolicy, job_type: JobType) -> Self {
        Self {
            policy,
            restart_on_success: job_type != JobType::Batch,
            wait_res: None,
            start_err: None,
            failure: false,
            killed: false,
            restarts: VecDeque::new(),
            reason: String::new(),
        }
    }

    pub fn set_policy(&mut self, policy: RestartPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Record that the last start attempt failed before a handle existed.
    pub fn set_start_error(&mut self, err: StartError) -> &mut Self {
        self.start_err = Some(err);
        self.failure = true;
        self
    }

    /// Record how the last handle exited.
    pub fn set_wait_result(&mut self, res: WaitResult) -> &mut Self {
        self.wait_res = Some(res);
        self.failure = true;
        self
    }

    /// Mark the task as deliberately killed; the next verdict is [`RestartVerdict::Killed`].
    pub fn set_killed(&mut self) -> &mut Self {
        self.killed = true;
        self
    }

    /// Explanation for the last verdict.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Restarts granted within the last evaluated window.
    pub fn count(&self) -> u32 {
        self.restarts.len() as u32
    }

    pub fn state(&mut self) -> RestartVerdict {
        self.state_at(Instant::now())
    }

    /// Evaluate as of `now` and clear the recorded outcome.
    pub fn state_at(&mut self, now: Instant) -> RestartVerdict {
        let verdict = self.evaluate(now);
        self.wait_res = None;
        self.start_err = None;
        self.failure = false;
        self.killed = false;
        verdict
    }

    fn evaluate(&mut self, now: Instant) -> RestartVerdict {
        if self.killed {
            self.reason.clear();
            return RestartVerdict::Killed;
        }

        let succeeded = self.wait_res.as_ref().is_some_and(WaitResult::successful);

        if self.policy.attempts == 0 {
            if !self.restart_on_success && succeeded {
                self.reason = REASON_SUCCESSFUL_EXIT.to_string();
                return RestartVerdict::Terminated;
            }
            self.reason = REASON_NO_RESTARTS_ALLOWED.to_string();
            return RestartVerdict::NotRestarting;
        }

        let interval = self.policy.interval();
        while let Some(&oldest) = self.restarts.front()
            && now.saturating_duration_since(oldest) >= interval
        {
            self.restarts.pop_front();
        }

        if !self.failure {
            self.reason.clear();
            self.restarts.push_back(now);
            return RestartVerdict::Undetermined(Duration::ZERO);
        }

        if let Some(err) = &self.start_err {
            if !err.is_recoverable() {
                self.reason = REASON_UNRECOVERABLE_ERROR.to_string();
                return RestartVerdict::NotRestarting;
            }
        } else if succeeded && !self.restart_on_success {
            self.reason = REASON_SUCCESSFUL_EXIT.to_string();
            return RestartVerdict::Terminated;
        }

        if self.count() >= self.policy.attempts {
            return match self.policy.mode {
                RestartMode::Fail => {
                    self.reason = format!(
                        "Exceeded allowed attempts {} in interval {:?} and mode is \"fail\"",
                        self.policy.attempts, interval
                    );
                    RestartVerdict::NotRestarting
                }
                RestartMode::Delay => {
                    self.reason = REASON_DELAY.to_string();
                    // the restart takes the slot the oldest one frees
                    let at = self.restarts.pop_front().map_or(now, |oldest| oldest + interval);
                    self.restarts.push_back(at);
                    RestartVerdict::Restarting(at.saturating_duration_since(now))
                }
            };
        }

        self.restarts.push_back(now);
        self.reason = REASON_WITHIN_POLICY.to_string();
        RestartVerdict::Restarting(self.jittered(self.policy.delay_for(self.count())))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().max(1) as u64;
        let extra = rand::rng().random_range(0..ms) as f64 * RESTART_JITTER;
        Duration::from_millis(ms + extra as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriverError, HookError};
    use ward_model::DelayStrategy;

    fn policy(attempts: u32, interval: Duration, delay: Duration, mode: RestartMode) -> RestartPolicy {
        RestartPolicy {
            attempts,
            interval_ms: interval.as_millis() as u64,
            delay_ms: delay.as_millis() as u64,
            mode,
            delay_strategy: DelayStrategy::Fixed,
        }
    }

    fn failed() -> WaitResult {
        WaitResult::new(1, 0)
    }

    fn assert_restarting_near(v: RestartVerdict, base: Duration) {
        match v {
            RestartVerdict::Restarting(d) => {
                assert!(d >= base, "{d:?} < {base:?}");
                assert!(d <= base + base.mul_f64(RESTART_JITTER), "{d:?} too large");
            }
            other => panic!("expected Restarting, got {other:?}"),
        }
    }

    #[test]
    fn batch_success_terminates_without_restart() {
        let p = policy(3, Duration::from_secs(600), Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Batch);

        t.set_wait_result(WaitResult::new(0, 0));
        assert_eq!(t.state(), RestartVerdict::Terminated);
        assert_eq!(t.reason(), REASON_SUCCESSFUL_EXIT);
    }

    #[test]
    fn service_success_restarts() {
        let p = policy(3, Duration::from_secs(600), Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        t.set_wait_result(WaitResult::new(0, 0));
        assert_restarting_near(t.state(), Duration::from_secs(1));
    }

    #[test]
    fn attempts_per_interval_then_fail() {
        let now = Instant::now();
        let p = policy(2, Duration::from_secs(600), Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        for i in 0..2 {
            t.set_wait_result(failed());
            assert_restarting_near(t.state_at(now + Duration::from_secs(i)), Duration::from_secs(1));
        }
        t.set_wait_result(failed());
        assert_eq!(
            t.state_at(now + Duration::from_secs(3)),
            RestartVerdict::NotRestarting
        );
        assert!(t.reason().contains("mode is \"fail\""));
    }

    #[test]
    fn restarts_age_out_of_the_window() {
        let now = Instant::now();
        let p = policy(1, Duration::from_secs(60), Duration::from_millis(10), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        t.set_wait_result(failed());
        assert!(matches!(t.state_at(now), RestartVerdict::Restarting(_)));

        t.set_wait_result(failed());
        assert!(matches!(
            t.state_at(now + Duration::from_secs(60)),
            RestartVerdict::Restarting(_)
        ));
        assert_eq!(t.count(), 1);
    }

    #[test]
    fn window_slides_across_boundaries() {
        let now = Instant::now();
        let at = |s: u64| now + Duration::from_secs(s);
        let p = policy(2, Duration::from_secs(600), Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        for s in [0, 595, 601] {
            t.set_wait_result(failed());
            assert!(matches!(t.state_at(at(s)), RestartVerdict::Restarting(_)), "at {s}s");
        }
        // 595s and 601s are both inside [2s, 602s]
        t.set_wait_result(failed());
        assert_eq!(t.state_at(at(602)), RestartVerdict::NotRestarting);
        t.set_wait_result(failed());
        assert_eq!(t.state_at(at(1194)), RestartVerdict::NotRestarting);
        t.set_wait_result(failed());
        assert!(matches!(t.state_at(at(1195)), RestartVerdict::Restarting(_)));
    }

    #[test]
    fn no_window_holds_more_than_attempts() {
        let now = Instant::now();
        let attempts = 3;
        let interval = Duration::from_secs(600);
        let p = policy(attempts, interval, Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        let mut granted = Vec::new();
        for step in 0..200u64 {
            let when = now + Duration::from_secs(step * 37);
            t.set_wait_result(failed());
            if matches!(t.state_at(when), RestartVerdict::Restarting(_)) {
                granted.push(when);
            }
        }
        assert!(granted.len() > attempts as usize);
        for (i, start) in granted.iter().enumerate() {
            let in_window = granted[i..].iter().take_while(|&&g| g < *start + interval).count();
            assert!(in_window <= attempts as usize, "{in_window} restarts within {interval:?}");
        }
    }

    #[test]
    fn delay_mode_waits_for_oldest_restart_to_age_out() {
        let now = Instant::now();
        let p = policy(1, Duration::from_secs(60), Duration::from_millis(10), RestartMode::Delay);
        let mut t = RestartTracker::new(p, JobType::Service);

        t.set_wait_result(failed());
        t.state_at(now);
        t.set_wait_result(failed());
        assert_eq!(
            t.state_at(now + Duration::from_secs(20)),
            RestartVerdict::Restarting(Duration::from_secs(40))
        );
        assert_eq!(t.reason(), REASON_DELAY);

        // the delayed restart at 60s now occupies the window
        t.set_wait_result(failed());
        assert_eq!(
            t.state_at(now + Duration::from_secs(61)),
            RestartVerdict::Restarting(Duration::from_secs(59))
        );
    }

    #[test]
    fn zero_attempts_never_restart() {
        let p = policy(0, Duration::ZERO, Duration::ZERO, RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        t.set_wait_result(failed());
        assert_eq!(t.state(), RestartVerdict::NotRestarting);
        assert_eq!(t.reason(), REASON_NO_RESTARTS_ALLOWED);
    }

    #[test]
    fn unrecoverable_start_error_is_final() {
        let p = policy(5, Duration::from_secs(600), Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        t.set_start_error(HookError::fatal("validate", "bad task").into());
        assert_eq!(t.state(), RestartVerdict::NotRestarting);
        assert_eq!(t.reason(), REASON_UNRECOVERABLE_ERROR);

        t.set_start_error(DriverError::recoverable("busy").into());
        assert_restarting_near(t.state(), Duration::from_secs(1));
    }

    #[test]
    fn killed_wins_and_is_cleared_after_evaluation() {
        let p = policy(5, Duration::from_secs(600), Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);

        t.set_wait_result(failed()).set_killed();
        assert_eq!(t.state(), RestartVerdict::Killed);
        assert_eq!(t.count(), 0);

        t.set_wait_result(failed());
        assert!(matches!(t.state(), RestartVerdict::Restarting(_)));
    }

    #[test]
    fn nothing_recorded_is_undetermined() {
        let p = policy(5, Duration::from_secs(600), Duration::from_secs(1), RestartMode::Fail);
        let mut t = RestartTracker::new(p, JobType::Service);
        assert_eq!(t.state(), RestartVerdict::Undetermined(Duration::ZERO));
    }

    #[test]
    fn exponential_strategy_grows_within_interval() {
        let now = Instant::now();
        let p = RestartPolicy {
            delay_strategy: DelayStrategy::Exponential { max_delay_ms: 350 },
            ..policy(5, Duration::from_secs(600), Duration::from_millis(100), RestartMode::Fail)
        };
        let mut t = RestartTracker::new(p, JobType::Service);

        for base in [100, 200, 350, 350] {
            t.set_wait_result(failed());
            assert_restarting_near(t.state_at(now), Duration::from_millis(base));
        }
    }
}
