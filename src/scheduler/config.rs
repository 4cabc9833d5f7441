//! Incremental scheduler configuration.
//!
//! [`SchedulerConfig`] holds the step sizes and limits of the incremental
//! construction. The step sizes are heuristic knobs; no value is correct in
//! general.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decomposition::SolveLimits;

/// Shortest per-call time limit derived by [`SchedulerConfig::from_time_limit`].
pub const MIN_ITERATION_SECS: u64 = 10;

/// Configuration for [`IncrementalScheduler`](super::IncrementalScheduler).
///
/// # Defaults
///
/// ```
/// use u_mrcpsp::scheduler::SchedulerConfig;
///
/// let config = SchedulerConfig::default();
/// assert_eq!(config.window_step, 5);
/// assert_eq!(config.mode_batch, 3);
/// assert_eq!(config.time_limit_secs, 180);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_mrcpsp::scheduler::SchedulerConfig;
///
/// let config = SchedulerConfig::default()
///     .with_window_step(10)
///     .with_mode_batch(2)
///     .with_time_limit_secs(30);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Jobs added per horizon-growth window.
    pub window_step: usize,

    /// Jobs whose modes are re-opened per refinement batch.
    pub mode_batch: usize,

    /// Periods added to every window horizon on top of
    /// `makespan + Σ max_duration(window)`.
    pub horizon_slack: u32,

    /// Wall-clock limit of every engine call, in seconds.
    pub time_limit_secs: u64,

    /// Number of periods in the model.
    ///
    /// `None` uses the loose bound Σ max durations, plus one.
    pub max_period: Option<u32>,

    /// Re-solve all jobs and modes once over `0..=makespan` after the windows.
    pub consolidate: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window_step: 5,
            mode_batch: 3,
            horizon_slack: 3,
            time_limit_secs: 180,
            max_period: None,
            consolidate: true,
        }
    }
}

impl SchedulerConfig {
    /// Derives the per-call limit from a total budget: a tenth of it, at
    /// least [`MIN_ITERATION_SECS`].
    pub fn from_time_limit(total: Duration) -> Self {
        Self {
            time_limit_secs: (total.as_secs() / 10).max(MIN_ITERATION_SECS),
            ..Self::default()
        }
    }

    /// Sets the window step.
    pub fn with_window_step(mut self, step: usize) -> Self {
        self.window_step = step;
        self
    }

    /// Sets the mode refinement batch size.
    pub fn with_mode_batch(mut self, batch: usize) -> Self {
        self.mode_batch = batch;
        self
    }

    /// Sets the horizon slack.
    pub fn with_horizon_slack(mut self, slack: u32) -> Self {
        self.horizon_slack = slack;
        self
    }

    /// Sets the per-call time limit.
    pub fn with_time_limit_secs(mut self, secs: u64) -> Self {
        self.time_limit_secs = secs;
        self
    }

    /// Sets the number of periods.
    pub fn with_max_period(mut self, periods: u32) -> Self {
        self.max_period = Some(periods);
        self
    }

    /// Enables or disables the consolidation solve.
    pub fn with_consolidate(mut self, consolidate: bool) -> Self {
        self.consolidate = consolidate;
        self
    }

    /// Limits handed to every engine call.
    pub fn limits(&self) -> SolveLimits {
        SolveLimits::new(Duration::from_secs(self.time_limit_secs))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_step == 0 {
            return Err("window_step must be at least 1".into());
        }
        if self.mode_batch == 0 {
            return Err("mode_batch must be at least 1".into());
        }
        if self.time_limit_secs == 0 {
            return Err("time_limit_secs must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.horizon_slack, 3);
        assert!(config.consolidate);
        assert!(config.max_period.is_none());
        assert_eq!(config.limits().time_limit, Duration::from_secs(180));
    }

    #[test]
    fn test_from_time_limit() {
        assert_eq!(SchedulerConfig::from_time_limit(Duration::from_secs(600)).time_limit_secs, 60);
        assert_eq!(SchedulerConfig::from_time_limit(Duration::from_secs(30)).time_limit_secs, 10);
    }

    #[test]
    fn test_validate() {
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(SchedulerConfig::default().with_window_step(0).validate().is_err());
        assert!(SchedulerConfig::default().with_mode_batch(0).validate().is_err());
        assert!(SchedulerConfig::default().with_time_limit_secs(0).validate().is_err());
    }

    #[test]
    fn test_serde_partial() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"window_step": 2, "max_period": 40}"#).unwrap();
        assert_eq!(config.window_step, 2);
        assert_eq!(config.max_period, Some(40));
        assert_eq!(config.mode_batch, 3);
    }
}
