//! Run candidates and persisted flow runs.

use super::{
    DeploymentId, DeploymentSnapshot, FlowId, FlowRunId, IdempotencyKey, Parameters, RunState,
    ScheduledStatePayload, SchedulingDomainError, StateId, StateType,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Tag added to every run the scheduler creates.
pub const AUTO_SCHEDULED_TAG: &str = "auto-scheduled";

/// In-memory run built from one schedule occurrence, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCandidate {
    id: FlowRunId,
    flow_id: FlowId,
    deployment_id: DeploymentId,
    parameters: Parameters,
    tags: Vec<String>,
    idempotency_key: IdempotencyKey,
    scheduled_time: DateTime<Utc>,
    state: ScheduledStatePayload,
    created_at: DateTime<Utc>,
}

impl RunCandidate {
    /// Builds the candidate for `deployment` at `scheduled_time`.
    ///
    /// The idempotency key depends only on the deployment identifier and
    /// `scheduled_time`; the run identifier is fresh on every call.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingDomainError::MissingFlowId`] when the snapshot has
    /// no owning flow.
    pub fn for_occurrence(
        deployment: &DeploymentSnapshot,
        scheduled_time: DateTime<Utc>,
        clock: &impl Clock,
    ) -> Result<Self, SchedulingDomainError> {
        let flow_id = deployment
            .flow_id()
            .ok_or(SchedulingDomainError::MissingFlowId(deployment.id()))?;

        Ok(Self {
            id: FlowRunId::new(),
            flow_id,
            deployment_id: deployment.id(),
            parameters: deployment.parameters().clone(),
            tags: scheduled_tags(deployment.tags()),
            idempotency_key: IdempotencyKey::scheduled(deployment.id(), scheduled_time),
            scheduled_time,
            state: ScheduledStatePayload::new(scheduled_time),
            created_at: clock.utc(),
        })
    }

    /// Returns the run identifier the candidate will be stored under.
    #[must_use]
    pub const fn id(&self) -> FlowRunId {
        self.id
    }

    /// Returns the owning flow.
    #[must_use]
    pub const fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    /// Returns the source deployment.
    #[must_use]
    pub const fn deployment_id(&self) -> DeploymentId {
        self.deployment_id
    }

    /// Returns the run parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the run tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the deduplication key.
    #[must_use]
    pub const fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    /// Returns when the run is due.
    #[must_use]
    pub const fn scheduled_time(&self) -> DateTime<Utc> {
        self.scheduled_time
    }

    /// Returns the initial state payload.
    #[must_use]
    pub const fn state(&self) -> &ScheduledStatePayload {
        &self.state
    }

    /// Returns when the candidate was built.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// `auto-scheduled` followed by the deployment tags, without duplicates.
fn scheduled_tags(deployment_tags: &[String]) -> Vec<String> {
    let mut tags = Vec::with_capacity(deployment_tags.len() + 1);
    tags.push(AUTO_SCHEDULED_TAG.to_owned());
    for tag in deployment_tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}

/// A stored flow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRun {
    id: FlowRunId,
    flow_id: FlowId,
    deployment_id: Option<DeploymentId>,
    parameters: Parameters,
    tags: Vec<String>,
    idempotency_key: IdempotencyKey,
    auto_scheduled: bool,
    expected_start_time: Option<DateTime<Utc>>,
    next_scheduled_start_time: Option<DateTime<Utc>>,
    state_id: Option<StateId>,
    state_type: Option<StateType>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted flow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedFlowRunData {
    /// Persisted run identifier.
    pub id: FlowRunId,
    /// Owning flow.
    pub flow_id: FlowId,
    /// Source deployment, if the run came from one.
    pub deployment_id: Option<DeploymentId>,
    /// Run parameters.
    pub parameters: Parameters,
    /// Run tags.
    pub tags: Vec<String>,
    /// Deduplication key.
    pub idempotency_key: IdempotencyKey,
    /// Whether the scheduler created the run.
    pub auto_scheduled: bool,
    /// When the run is expected to start.
    pub expected_start_time: Option<DateTime<Utc>>,
    /// Next scheduled start time.
    pub next_scheduled_start_time: Option<DateTime<Utc>>,
    /// Current state pointer.
    pub state_id: Option<StateId>,
    /// Current state kind.
    pub state_type: Option<StateType>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl FlowRun {
    /// Creates the stored form of a candidate, before any state is linked.
    #[must_use]
    pub fn from_candidate(candidate: &RunCandidate) -> Self {
        Self {
            id: candidate.id(),
            flow_id: candidate.flow_id(),
            deployment_id: Some(candidate.deployment_id()),
            parameters: candidate.parameters().clone(),
            tags: candidate.tags().to_vec(),
            idempotency_key: candidate.idempotency_key().clone(),
            auto_scheduled: true,
            expected_start_time: Some(candidate.scheduled_time()),
            next_scheduled_start_time: Some(candidate.scheduled_time()),
            state_id: None,
            state_type: None,
            created_at: candidate.created_at(),
            updated_at: candidate.created_at(),
        }
    }

    /// Reconstructs a flow run from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedFlowRunData) -> Self {
        Self {
            id: data.id,
            flow_id: data.flow_id,
            deployment_id: data.deployment_id,
            parameters: data.parameters,
            tags: data.tags,
            idempotency_key: data.idempotency_key,
            auto_scheduled: data.auto_scheduled,
            expected_start_time: data.expected_start_time,
            next_scheduled_start_time: data.next_scheduled_start_time,
            state_id: data.state_id,
            state_type: data.state_type,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Points the run at `state` as its current state.
    pub fn link_state(&mut self, state: &RunState) {
        self.state_id = Some(state.id());
        self.state_type = Some(state.state_type());
        self.updated_at = self.updated_at.max(state.timestamp());
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn id(&self) -> FlowRunId {
        self.id
    }

    /// Returns the owning flow.
    #[must_use]
    pub const fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    /// Returns the source deployment, if any.
    #[must_use]
    pub const fn deployment_id(&self) -> Option<DeploymentId> {
        self.deployment_id
    }

    /// Returns the run parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the run tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the deduplication key.
    #[must_use]
    pub const fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    /// Returns whether the scheduler created the run.
    #[must_use]
    pub const fn auto_scheduled(&self) -> bool {
        self.auto_scheduled
    }

    /// Returns when the run is expected to start.
    #[must_use]
    pub const fn expected_start_time(&self) -> Option<DateTime<Utc>> {
        self.expected_start_time
    }

    /// Returns the next scheduled start time.
    #[must_use]
    pub const fn next_scheduled_start_time(&self) -> Option<DateTime<Utc>> {
        self.next_scheduled_start_time
    }

    /// Returns the current state pointer, if linked.
    #[must_use]
    pub const fn state_id(&self) -> Option<StateId> {
        self.state_id
    }

    /// Returns the current state kind, if linked.
    #[must_use]
    pub const fn state_type(&self) -> Option<StateType> {
        self.state_type
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
