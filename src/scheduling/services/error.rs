//! Service-level errors for run scheduling.

use crate::scheduling::{
    domain::{FlowRunId, SchedulingDomainError},
    ports::{DeploymentRepositoryError, RunStoreError},
};
use thiserror::Error;

/// Errors surfaced by scheduling services.
#[derive(Debug, Error)]
pub enum RunSchedulingError {
    /// The deployment snapshot cannot produce runs.
    #[error("invalid deployment state: {0}")]
    InvalidDeploymentState(#[from] SchedulingDomainError),

    /// The deployment lookup failed.
    #[error(transparent)]
    Deployment(#[from] DeploymentRepositoryError),

    /// The run store failed.
    #[error(transparent)]
    Store(#[from] RunStoreError),

    /// Some runs were stored without a current state and await repair.
    #[error("{} run(s) left without a linked state: {}", .run_ids.len(), format_ids(.run_ids))]
    PartialLinkFailure {
        /// Runs left unlinked.
        run_ids: Vec<FlowRunId>,
    },

    /// The persistence task ended without reporting a result.
    #[error("scheduling task aborted: {0}")]
    Aborted(String),
}

impl RunSchedulingError {
    /// Returns `true` for failures caused by the storage layer being
    /// unreachable or rejecting I/O.
    ///
    /// A deployment record that was read but failed to decode is not a
    /// storage failure.
    #[must_use]
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Deployment(DeploymentRepositoryError::Persistence(_))
                | Self::Store(RunStoreError::Persistence(_))
        )
    }
}

fn format_ids(ids: &[FlowRunId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for scheduling service operations.
pub type RunSchedulingResult<T> = Result<T, RunSchedulingError>;
