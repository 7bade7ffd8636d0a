//! Diesel row models for scheduling persistence.

use super::schema::{deployments, flow_run_states, flow_runs};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for deployment records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = deployments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeploymentRow {
    /// Deployment identifier.
    pub id: uuid::Uuid,
    /// Owning flow identifier.
    pub flow_id: uuid::Uuid,
    /// Serialized schedule definition.
    pub schedule: Option<Value>,
    /// Whether the schedule may produce runs.
    pub is_schedule_active: bool,
    /// Tags JSON array.
    pub tags: Value,
    /// Parameters JSON object.
    pub parameters: Value,
}

/// Query result row for flow run records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = flow_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FlowRunRow {
    /// Run identifier.
    pub id: uuid::Uuid,
    /// Owning flow identifier.
    pub flow_id: uuid::Uuid,
    /// Source deployment.
    pub deployment_id: Option<uuid::Uuid>,
    /// Deduplication key.
    pub idempotency_key: String,
    /// Parameters JSON object.
    pub parameters: Value,
    /// Tags JSON array.
    pub tags: Value,
    /// Whether the scheduler created the run.
    pub auto_scheduled: bool,
    /// Expected start time.
    pub expected_start_time: Option<DateTime<Utc>>,
    /// Next scheduled start time.
    pub next_scheduled_start_time: Option<DateTime<Utc>>,
    /// Current state pointer.
    pub state_id: Option<uuid::Uuid>,
    /// Current state kind.
    pub state_type: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for flow run records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = flow_runs)]
pub struct NewFlowRunRow {
    /// Run identifier.
    pub id: uuid::Uuid,
    /// Owning flow identifier.
    pub flow_id: uuid::Uuid,
    /// Source deployment.
    pub deployment_id: Option<uuid::Uuid>,
    /// Deduplication key.
    pub idempotency_key: String,
    /// Parameters JSON object.
    pub parameters: Value,
    /// Tags JSON array.
    pub tags: Value,
    /// Whether the scheduler created the run.
    pub auto_scheduled: bool,
    /// Expected start time.
    pub expected_start_time: Option<DateTime<Utc>>,
    /// Next scheduled start time.
    pub next_scheduled_start_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result and insert row for run state records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = flow_run_states)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FlowRunStateRow {
    /// State identifier.
    pub id: uuid::Uuid,
    /// Run the state belongs to.
    pub flow_run_id: uuid::Uuid,
    /// State kind.
    pub state_type: String,
    /// Display name.
    pub name: String,
    /// Optional message.
    pub message: Option<String>,
    /// When the state was entered.
    pub timestamp: DateTime<Utc>,
    /// Scheduled time for scheduled states.
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Identifier row returned by raw probe queries.
#[derive(Debug, Clone, QueryableByName)]
pub struct RunIdRow {
    /// Run identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
}
