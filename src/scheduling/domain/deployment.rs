//! Read-only deployment snapshot consumed by the scheduler.

use super::{DeploymentId, FlowId, Schedule};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Deployment parameters passed through to every scheduled run.
pub type Parameters = Map<String, Value>;

/// Scheduling-relevant view of a deployment at lookup time.
#[derive(Debug, Clone)]
pub struct DeploymentSnapshot {
    id: DeploymentId,
    flow_id: Option<FlowId>,
    schedule: Option<Arc<dyn Schedule>>,
    is_schedule_active: bool,
    tags: Vec<String>,
    parameters: Parameters,
}

impl DeploymentSnapshot {
    /// Creates a snapshot for a deployment of `flow_id` with no schedule,
    /// no tags and no parameters. The schedule flag defaults to active.
    #[must_use]
    pub fn new(id: DeploymentId, flow_id: FlowId) -> Self {
        Self {
            id,
            flow_id: Some(flow_id),
            schedule: None,
            is_schedule_active: true,
            tags: Vec::new(),
            parameters: Parameters::new(),
        }
    }

    /// Creates a snapshot whose owning flow is unknown.
    ///
    /// Such snapshots cannot produce runs; they model malformed records
    /// surfaced by a deployment store.
    #[must_use]
    pub fn without_flow(id: DeploymentId) -> Self {
        Self {
            flow_id: None,
            ..Self::new(id, FlowId::new())
        }
    }

    /// Attaches a schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule: Arc<dyn Schedule>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Sets whether the schedule is active.
    #[must_use]
    pub const fn with_schedule_active(mut self, is_schedule_active: bool) -> Self {
        self.is_schedule_active = is_schedule_active;
        self
    }

    /// Sets deployment tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Sets deployment parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns the deployment identifier.
    #[must_use]
    pub const fn id(&self) -> DeploymentId {
        self.id
    }

    /// Returns the owning flow, if known.
    #[must_use]
    pub const fn flow_id(&self) -> Option<FlowId> {
        self.flow_id
    }

    /// Returns the attached schedule, if any.
    #[must_use]
    pub fn schedule(&self) -> Option<&dyn Schedule> {
        self.schedule.as_deref()
    }

    /// Returns the schedule only when one is attached and active.
    #[must_use]
    pub fn active_schedule(&self) -> Option<&dyn Schedule> {
        self.schedule().filter(|_| self.is_schedule_active)
    }

    /// Returns whether the schedule flag is set.
    #[must_use]
    pub const fn is_schedule_active(&self) -> bool {
        self.is_schedule_active
    }

    /// Returns deployment tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns deployment parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}
