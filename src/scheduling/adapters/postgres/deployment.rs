//! `PostgreSQL` deployment reader.

use super::{
    blocking::{SchedulingPgPool, run_blocking_with},
    models::DeploymentRow,
    schema::deployments,
};
use crate::scheduling::{
    domain::{DeploymentId, DeploymentSnapshot, FlowId, Parameters, ScheduleSpec},
    ports::{DeploymentRepository, DeploymentRepositoryError, DeploymentRepositoryResult},
};
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

/// `PostgreSQL`-backed deployment repository.
#[derive(Debug, Clone)]
pub struct PostgresDeploymentRepository {
    pool: SchedulingPgPool,
}

impl PostgresDeploymentRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: SchedulingPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentRepository for PostgresDeploymentRepository {
    async fn get_deployment(
        &self,
        id: DeploymentId,
    ) -> DeploymentRepositoryResult<Option<DeploymentSnapshot>> {
        run_blocking_with(
            &self.pool,
            move |connection| {
                let row = deployments::table
                    .filter(deployments::id.eq(id.into_inner()))
                    .select(DeploymentRow::as_select())
                    .first::<DeploymentRow>(connection)
                    .optional()
                    .map_err(DeploymentRepositoryError::persistence)?;
                row.map(row_to_snapshot).transpose()
            },
            DeploymentRepositoryError::persistence,
            DeploymentRepositoryError::persistence,
        )
        .await
    }
}

fn row_to_snapshot(row: DeploymentRow) -> DeploymentRepositoryResult<DeploymentSnapshot> {
    let DeploymentRow {
        id,
        flow_id,
        schedule: persisted_schedule,
        is_schedule_active,
        tags: persisted_tags,
        parameters: persisted_parameters,
    } = row;
    let deployment_id = DeploymentId::from_uuid(id);
    let malformed =
        |err: serde_json::Error| DeploymentRepositoryError::invalid_snapshot(deployment_id, err);

    let tags = serde_json::from_value::<Vec<String>>(persisted_tags).map_err(malformed)?;
    let parameters =
        serde_json::from_value::<Parameters>(persisted_parameters).map_err(malformed)?;

    let mut snapshot = DeploymentSnapshot::new(deployment_id, FlowId::from_uuid(flow_id))
        .with_schedule_active(is_schedule_active)
        .with_tags(tags)
        .with_parameters(parameters);
    if let Some(value) = persisted_schedule {
        let schedule = serde_json::from_value::<ScheduleSpec>(value).map_err(malformed)?;
        snapshot = snapshot.with_schedule(Arc::new(schedule));
    }
    Ok(snapshot)
}
