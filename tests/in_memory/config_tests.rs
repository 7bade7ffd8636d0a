//! Scheduling configuration read from the process environment.

use crate::test_helpers::EnvVarGuard;
use cadence::scheduling::services::{
    MAX_RUNS_ENV, MAX_SCHEDULED_TIME_ENV, SchedulingConfig, SchedulingConfigError,
};
use chrono::TimeDelta;
use rstest::rstest;
use std::ffi::OsString;

fn env_changes(max_runs: Option<&str>, horizon: Option<&str>) -> Vec<(OsString, Option<OsString>)> {
    vec![
        (OsString::from(MAX_RUNS_ENV), max_runs.map(OsString::from)),
        (
            OsString::from(MAX_SCHEDULED_TIME_ENV),
            horizon.map(OsString::from),
        ),
    ]
}

#[rstest]
fn unset_environment_yields_defaults() {
    let _guard = EnvVarGuard::set_many(&env_changes(None, None));

    let config = SchedulingConfig::from_env().expect("defaults are valid");

    assert_eq!(config, SchedulingConfig::default());
}

#[rstest]
fn environment_overrides_cap_and_horizon() {
    let _guard = EnvVarGuard::set_many(&env_changes(Some("25"), Some("7200")));

    let config = SchedulingConfig::from_env().expect("overrides are valid");

    assert_eq!(config.max_runs, 25);
    assert_eq!(config.horizon, TimeDelta::hours(2));
}

#[rstest]
fn malformed_cap_is_rejected() {
    let _guard = EnvVarGuard::set_many(&env_changes(Some("lots"), None));

    let result = SchedulingConfig::from_env();

    assert_eq!(
        result,
        Err(SchedulingConfigError::InvalidValue {
            key: MAX_RUNS_ENV,
            value: "lots".to_owned(),
        })
    );
}

#[rstest]
fn zero_horizon_is_rejected() {
    let _guard = EnvVarGuard::set_many(&env_changes(None, Some("0")));

    let result = SchedulingConfig::from_env();

    assert_eq!(result, Err(SchedulingConfigError::InvalidHorizon(0)));
}
