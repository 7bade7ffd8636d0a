//! Application services for scheduled run materialization.

mod config;
mod error;
mod linker;
mod persister;
mod scheduling;

pub use config::{MAX_RUNS_ENV, MAX_SCHEDULED_TIME_ENV, SchedulingConfig, SchedulingConfigError};
pub use error::{RunSchedulingError, RunSchedulingResult};
pub use linker::StateLinker;
pub use persister::IdempotentRunPersister;
pub use scheduling::{RunSchedulingService, ScheduleRunsRequest};
