//! Process-wide scheduling defaults.

use chrono::TimeDelta;
use thiserror::Error;

/// Environment variable overriding [`SchedulingConfig::max_runs`].
pub const MAX_RUNS_ENV: &str = "CADENCE_SCHEDULER_MAX_RUNS";

/// Environment variable overriding [`SchedulingConfig::horizon`], in seconds.
pub const MAX_SCHEDULED_TIME_ENV: &str = "CADENCE_SCHEDULER_MAX_SCHEDULED_TIME_SECS";

const DEFAULT_MAX_RUNS: usize = 100;
const DEFAULT_HORIZON_DAYS: i64 = 100;

/// Defaults applied when a scheduling request leaves them unset.
///
/// # Examples
///
/// ```
/// use cadence::scheduling::services::SchedulingConfig;
///
/// let config = SchedulingConfig::default();
/// assert_eq!(config.max_runs, 100);
/// assert_eq!(config.horizon.num_days(), 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingConfig {
    /// Maximum number of runs created per invocation.
    pub max_runs: usize,
    /// How far past the window start runs are created.
    pub horizon: TimeDelta,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            max_runs: DEFAULT_MAX_RUNS,
            horizon: TimeDelta::days(DEFAULT_HORIZON_DAYS),
        }
    }
}

/// Errors raised while reading scheduling configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulingConfigError {
    /// A variable holds a value that is not a valid non-negative integer.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The horizon is zero, negative or out of range.
    #[error("scheduling horizon must be a positive number of seconds, got {0}")]
    InvalidHorizon(i64),
}

impl SchedulingConfig {
    /// Sets the default run cap.
    #[must_use]
    pub const fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = max_runs;
        self
    }

    /// Sets the default horizon.
    #[must_use]
    pub const fn with_horizon(mut self, horizon: TimeDelta) -> Self {
        self.horizon = horizon;
        self
    }

    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingConfigError`] when a variable is set to an invalid
    /// value.
    pub fn from_env() -> Result<Self, SchedulingConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, falling back to defaults for unset
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingConfigError`] when a key maps to an invalid value.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SchedulingConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_RUNS_ENV) {
            config.max_runs = parse_value(MAX_RUNS_ENV, &raw)?;
        }
        if let Some(raw) = lookup(MAX_SCHEDULED_TIME_ENV) {
            let seconds: i64 = parse_value(MAX_SCHEDULED_TIME_ENV, &raw)?;
            config.horizon = TimeDelta::try_seconds(seconds)
                .filter(|horizon| *horizon > TimeDelta::zero())
                .ok_or(SchedulingConfigError::InvalidHorizon(seconds))?;
        }
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(
    key: &'static str,
    raw: &str,
) -> Result<T, SchedulingConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| SchedulingConfigError::InvalidValue {
            key,
            value: raw.to_owned(),
        })
}
