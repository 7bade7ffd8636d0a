//! In-memory deployment repository for scheduling tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::scheduling::{
    domain::{DeploymentId, DeploymentSnapshot},
    ports::{DeploymentRepository, DeploymentRepositoryError, DeploymentRepositoryResult},
};

/// Thread-safe in-memory deployment repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeploymentRepository {
    deployments: Arc<RwLock<HashMap<DeploymentId, DeploymentSnapshot>>>,
}

impl InMemoryDeploymentRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a deployment snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentRepositoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn upsert(&self, deployment: DeploymentSnapshot) -> DeploymentRepositoryResult<()> {
        let mut deployments = self.deployments.write().map_err(|err| {
            DeploymentRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        deployments.insert(deployment.id(), deployment);
        Ok(())
    }
}

#[async_trait]
impl DeploymentRepository for InMemoryDeploymentRepository {
    async fn get_deployment(
        &self,
        id: DeploymentId,
    ) -> DeploymentRepositoryResult<Option<DeploymentSnapshot>> {
        let deployments = self.deployments.read().map_err(|err| {
            DeploymentRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(deployments.get(&id).cloned())
    }
}
