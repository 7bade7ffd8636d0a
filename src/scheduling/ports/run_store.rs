//! Storage port for flow runs and their lifecycle states.

use crate::scheduling::domain::{
    DeploymentId, FlowRun, FlowRunId, RunCandidate, RunState, StateId,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Result type for run store operations.
pub type RunStoreResult<T> = Result<T, RunStoreError>;

/// Durable storage contract for scheduled runs.
///
/// Implementations must provide the conflict handling natively: a
/// check-then-insert sequence in application code reopens the race this
/// contract exists to close.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Inserts all candidates as runs in one batch, skipping any whose
    /// `(flow_id, idempotency_key)` already exists.
    ///
    /// Conflicting rows are neither overwritten nor reported as errors.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::Persistence`] when the batch write fails.
    async fn insert_if_absent(&self, candidates: &[RunCandidate]) -> RunStoreResult<()>;

    /// Returns the subset of `run_ids` that exist and have no state record.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::Persistence`] when the lookup fails.
    async fn find_runs_without_state(
        &self,
        run_ids: &[FlowRunId],
    ) -> RunStoreResult<HashSet<FlowRunId>>;

    /// Writes `state` and makes it the current state of its run, as one
    /// atomic unit.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::RunNotFound`] when the run does not exist,
    /// [`RunStoreError::PartialLink`] when the state was written but the run
    /// pointer was not updated, or [`RunStoreError::Persistence`] when
    /// nothing could be written.
    async fn insert_state_and_link(&self, state: &RunState) -> RunStoreResult<()>;

    /// Finds a run by identifier.
    ///
    /// Returns `None` when the run does not exist.
    async fn find_run(&self, id: FlowRunId) -> RunStoreResult<Option<FlowRun>>;

    /// Returns the state the run's current-state pointer references.
    ///
    /// Returns `None` when the run does not exist or is not linked.
    async fn find_current_state(&self, run_id: FlowRunId) -> RunStoreResult<Option<RunState>>;

    /// Returns all runs created from the deployment, ordered by
    /// `next_scheduled_start_time`.
    async fn find_runs_by_deployment(
        &self,
        deployment_id: DeploymentId,
    ) -> RunStoreResult<Vec<FlowRun>>;

    /// Returns the deployment's runs whose current-state pointer is unset.
    async fn find_unlinked_runs(&self, deployment_id: DeploymentId)
    -> RunStoreResult<Vec<FlowRun>>;
}

/// Errors returned by run store implementations.
#[derive(Debug, Clone, Error)]
pub enum RunStoreError {
    /// The run referenced by a state does not exist.
    #[error("flow run not found: {0}")]
    RunNotFound(FlowRunId),

    /// The state record was written but the run pointer was not updated.
    #[error("state {state_id} written for run {run_id} but the run was not linked: {source}")]
    PartialLink {
        /// Run left without a current-state pointer.
        run_id: FlowRunId,
        /// Orphaned state record.
        state_id: StateId,
        /// Underlying failure.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl RunStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Builds a partial-link error for `state`.
    pub fn partial_link(
        state: &RunState,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::PartialLink {
            run_id: state.run_id(),
            state_id: state.id(),
            source: Arc::new(err),
        }
    }
}
