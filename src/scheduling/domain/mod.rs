//! Domain model for scheduled run materialization.
//!
//! The scheduling domain covers schedule enumeration, run candidate
//! construction and the run/state records the scheduler writes, while keeping
//! all infrastructure concerns outside of the domain boundary.

mod deployment;
mod error;
mod ids;
mod run;
mod schedule;
mod state;

pub use deployment::{DeploymentSnapshot, Parameters};
pub use error::{ParseStateTypeError, SchedulingDomainError};
pub use ids::{DeploymentId, FlowId, FlowRunId, IdempotencyKey, StateId};
pub use run::{AUTO_SCHEDULED_TAG, FlowRun, PersistedFlowRunData, RunCandidate};
pub use schedule::{
    DateListSchedule, IntervalSchedule, Occurrences, Schedule, ScheduleDates, ScheduleSpec,
    ScheduleWindow,
};
pub use state::{
    PersistedRunStateData, RunState, SCHEDULED_STATE_MESSAGE, ScheduledStatePayload, StateType,
};
