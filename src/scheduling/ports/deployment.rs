//! Read port for deployment lookups.

use crate::scheduling::domain::{DeploymentId, DeploymentSnapshot};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for deployment repository operations.
pub type DeploymentRepositoryResult<T> = Result<T, DeploymentRepositoryError>;

/// Narrow read contract the scheduler needs from the deployment store.
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    /// Returns the scheduling view of a deployment.
    ///
    /// Returns `None` when the deployment does not exist.
    async fn get_deployment(
        &self,
        id: DeploymentId,
    ) -> DeploymentRepositoryResult<Option<DeploymentSnapshot>>;
}

/// Errors returned by deployment repository implementations.
#[derive(Debug, Clone, Error)]
pub enum DeploymentRepositoryError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),

    /// The stored deployment could be read but not decoded into a snapshot.
    #[error("deployment {deployment_id} is malformed: {reason}")]
    InvalidSnapshot {
        /// Deployment whose record failed to decode.
        deployment_id: DeploymentId,
        /// Decoding failure.
        reason: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl DeploymentRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Wraps a decoding failure for the given deployment.
    pub fn invalid_snapshot(
        deployment_id: DeploymentId,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InvalidSnapshot {
            deployment_id,
            reason: Arc::new(err),
        }
    }
}
