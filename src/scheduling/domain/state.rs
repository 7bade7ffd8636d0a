//! Run lifecycle state records.

use super::{FlowRunId, ParseStateTypeError, StateId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Message recorded on states created by the scheduler.
pub const SCHEDULED_STATE_MESSAGE: &str = "Flow run scheduled";

/// Lifecycle state kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateType {
    /// Run is waiting for its scheduled time.
    Scheduled,
    /// Run has been picked up but not started.
    Pending,
    /// Run is executing.
    Running,
    /// Run finished successfully.
    Completed,
    /// Run finished with an error.
    Failed,
    /// Run was cancelled.
    Cancelled,
}

impl StateType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns the human-readable state name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl TryFrom<&str> for StateType {
    type Error = ParseStateTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "SCHEDULED" => Ok(Self::Scheduled),
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(ParseStateTypeError(value.to_owned())),
        }
    }
}

/// Initial state payload carried by a run candidate until it is linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledStatePayload {
    /// State kind; always [`StateType::Scheduled`] for scheduler output.
    pub state_type: StateType,
    /// Human-readable message.
    pub message: String,
    /// When the run is due.
    pub scheduled_time: DateTime<Utc>,
}

impl ScheduledStatePayload {
    /// Creates the standard scheduled payload for `scheduled_time`.
    #[must_use]
    pub fn new(scheduled_time: DateTime<Utc>) -> Self {
        Self {
            state_type: StateType::Scheduled,
            message: SCHEDULED_STATE_MESSAGE.to_owned(),
            scheduled_time,
        }
    }
}

/// A run's lifecycle state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    id: StateId,
    run_id: FlowRunId,
    state_type: StateType,
    name: String,
    message: Option<String>,
    timestamp: DateTime<Utc>,
    scheduled_time: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRunStateData {
    /// Persisted state identifier.
    pub id: StateId,
    /// Run the state belongs to.
    pub run_id: FlowRunId,
    /// Persisted state kind.
    pub state_type: StateType,
    /// Persisted display name.
    pub name: String,
    /// Persisted message, if any.
    pub message: Option<String>,
    /// When the state was entered.
    pub timestamp: DateTime<Utc>,
    /// Scheduled time, for scheduled states.
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl RunState {
    /// Creates a new state for `run_id` from a scheduled payload, stamped
    /// with the current clock time.
    #[must_use]
    pub fn from_payload(
        run_id: FlowRunId,
        payload: &ScheduledStatePayload,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: StateId::new(),
            run_id,
            state_type: payload.state_type,
            name: payload.state_type.display_name().to_owned(),
            message: Some(payload.message.clone()),
            timestamp: clock.utc(),
            scheduled_time: Some(payload.scheduled_time),
        }
    }

    /// Reconstructs a state from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedRunStateData) -> Self {
        Self {
            id: data.id,
            run_id: data.run_id,
            state_type: data.state_type,
            name: data.name,
            message: data.message,
            timestamp: data.timestamp,
            scheduled_time: data.scheduled_time,
        }
    }

    /// Returns the state identifier.
    #[must_use]
    pub const fn id(&self) -> StateId {
        self.id
    }

    /// Returns the run this state belongs to.
    #[must_use]
    pub const fn run_id(&self) -> FlowRunId {
        self.run_id
    }

    /// Returns the state kind.
    #[must_use]
    pub const fn state_type(&self) -> StateType {
        self.state_type
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns when the state was entered.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the scheduled time, for scheduled states.
    #[must_use]
    pub const fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        self.scheduled_time
    }
}
