//! `PostgreSQL` run store implementation.

use super::{
    blocking::{SchedulingPgPool, run_blocking_with},
    models::{FlowRunRow, FlowRunStateRow, NewFlowRunRow, RunIdRow},
    schema::{flow_run_states, flow_runs},
};
use crate::scheduling::{
    domain::{
        DeploymentId, FlowId, FlowRun, FlowRunId, IdempotencyKey, Parameters,
        PersistedFlowRunData, PersistedRunStateData, RunCandidate, RunState, StateId, StateType,
    },
    ports::{RunStore, RunStoreError, RunStoreResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashSet;

/// Rows per `INSERT` statement; each row binds 11 parameters and
/// `PostgreSQL` accepts at most 65535 per statement.
const INSERT_CHUNK_ROWS: usize = 1_000;

/// `PostgreSQL`-backed run store.
///
/// Deduplication relies on the unique index over
/// `(flow_id, idempotency_key)`; the state link runs inside one transaction.
///
/// A batch of runs and their state links commit in separate transactions.
/// Between the two commits other readers can observe runs whose
/// `state_id` is still `NULL`. If the linking step never completes those
/// runs stay unlinked until
/// `RunSchedulingService::repair_unlinked_runs` attaches their
/// `Scheduled` state.
#[derive(Debug, Clone)]
pub struct PostgresRunStore {
    pool: SchedulingPgPool,
}

impl PostgresRunStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: SchedulingPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> RunStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> RunStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking_with(
            &self.pool,
            f,
            RunStoreError::persistence,
            RunStoreError::persistence,
        )
        .await
    }
}

#[async_trait]
impl RunStore for PostgresRunStore {
    async fn insert_if_absent(&self, candidates: &[RunCandidate]) -> RunStoreResult<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        let rows = candidates
            .iter()
            .map(to_new_row)
            .collect::<RunStoreResult<Vec<_>>>()?;

        self.run_blocking(move |connection| {
            connection
                .transaction::<_, DieselError, _>(|tx| {
                    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                        diesel::insert_into(flow_runs::table)
                            .values(chunk)
                            .on_conflict((flow_runs::flow_id, flow_runs::idempotency_key))
                            .do_nothing()
                            .execute(tx)?;
                    }
                    Ok(())
                })
                .map_err(RunStoreError::persistence)
        })
        .await
    }

    async fn find_runs_without_state(
        &self,
        run_ids: &[FlowRunId],
    ) -> RunStoreResult<HashSet<FlowRunId>> {
        if run_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<uuid::Uuid> = run_ids.iter().map(|id| id.into_inner()).collect();

        self.run_blocking(move |connection| {
            let rows = diesel::sql_query(concat!(
                "SELECT flow_runs.id FROM flow_runs ",
                "LEFT OUTER JOIN flow_run_states ",
                "ON flow_run_states.flow_run_id = flow_runs.id ",
                "WHERE flow_runs.id = ANY($1) ",
                "AND flow_run_states.id IS NULL",
            ))
            .bind::<diesel::sql_types::Array<diesel::sql_types::Uuid>, _>(ids)
            .load::<RunIdRow>(connection)
            .map_err(RunStoreError::persistence)?;
            Ok(rows
                .into_iter()
                .map(|row| FlowRunId::from_uuid(row.id))
                .collect())
        })
        .await
    }

    async fn insert_state_and_link(&self, state: &RunState) -> RunStoreResult<()> {
        let run_id = state.run_id();
        let row = to_state_row(state);

        self.run_blocking(move |connection| {
            connection
                .transaction::<_, DieselError, _>(|tx| {
                    diesel::insert_into(flow_run_states::table)
                        .values(&row)
                        .execute(tx)?;
                    let updated = diesel::update(
                        flow_runs::table.filter(flow_runs::id.eq(run_id.into_inner())),
                    )
                    .set((
                        flow_runs::state_id.eq(Some(row.id)),
                        flow_runs::state_type.eq(Some(row.state_type.clone())),
                        flow_runs::updated_at.eq(row.timestamp),
                    ))
                    .execute(tx)?;
                    if updated == 0 {
                        return Err(DieselError::NotFound);
                    }
                    Ok(())
                })
                .map_err(|err| match err {
                    DieselError::NotFound
                    | DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        RunStoreError::RunNotFound(run_id)
                    }
                    _ => RunStoreError::persistence(err),
                })
        })
        .await
    }

    async fn find_run(&self, id: FlowRunId) -> RunStoreResult<Option<FlowRun>> {
        self.run_blocking(move |connection| {
            let row = flow_runs::table
                .filter(flow_runs::id.eq(id.into_inner()))
                .select(FlowRunRow::as_select())
                .first::<FlowRunRow>(connection)
                .optional()
                .map_err(RunStoreError::persistence)?;
            row.map(row_to_run).transpose()
        })
        .await
    }

    async fn find_current_state(&self, run_id: FlowRunId) -> RunStoreResult<Option<RunState>> {
        self.run_blocking(move |connection| {
            let state_id = flow_runs::table
                .filter(flow_runs::id.eq(run_id.into_inner()))
                .select(flow_runs::state_id)
                .first::<Option<uuid::Uuid>>(connection)
                .optional()
                .map_err(RunStoreError::persistence)?
                .flatten();
            let Some(state_id) = state_id else {
                return Ok(None);
            };
            let row = flow_run_states::table
                .filter(flow_run_states::id.eq(state_id))
                .select(FlowRunStateRow::as_select())
                .first::<FlowRunStateRow>(connection)
                .optional()
                .map_err(RunStoreError::persistence)?;
            row.map(row_to_state).transpose()
        })
        .await
    }

    async fn find_runs_by_deployment(
        &self,
        deployment_id: DeploymentId,
    ) -> RunStoreResult<Vec<FlowRun>> {
        self.run_blocking(move |connection| {
            let rows = flow_runs::table
                .filter(flow_runs::deployment_id.eq(deployment_id.into_inner()))
                .order((
                    flow_runs::next_scheduled_start_time.asc(),
                    flow_runs::id.asc(),
                ))
                .select(FlowRunRow::as_select())
                .load::<FlowRunRow>(connection)
                .map_err(RunStoreError::persistence)?;
            rows.into_iter().map(row_to_run).collect()
        })
        .await
    }

    async fn find_unlinked_runs(
        &self,
        deployment_id: DeploymentId,
    ) -> RunStoreResult<Vec<FlowRun>> {
        self.run_blocking(move |connection| {
            let rows = flow_runs::table
                .filter(flow_runs::deployment_id.eq(deployment_id.into_inner()))
                .filter(flow_runs::state_id.is_null())
                .order((
                    flow_runs::next_scheduled_start_time.asc(),
                    flow_runs::id.asc(),
                ))
                .select(FlowRunRow::as_select())
                .load::<FlowRunRow>(connection)
                .map_err(RunStoreError::persistence)?;
            rows.into_iter().map(row_to_run).collect()
        })
        .await
    }
}

fn to_new_row(candidate: &RunCandidate) -> RunStoreResult<NewFlowRunRow> {
    let run = FlowRun::from_candidate(candidate);
    let tags = serde_json::to_value(run.tags()).map_err(RunStoreError::persistence)?;

    Ok(NewFlowRunRow {
        id: run.id().into_inner(),
        flow_id: run.flow_id().into_inner(),
        deployment_id: run.deployment_id().map(DeploymentId::into_inner),
        idempotency_key: run.idempotency_key().as_str().to_owned(),
        parameters: serde_json::Value::Object(run.parameters().clone()),
        tags,
        auto_scheduled: run.auto_scheduled(),
        expected_start_time: run.expected_start_time(),
        next_scheduled_start_time: run.next_scheduled_start_time(),
        created_at: run.created_at(),
        updated_at: run.updated_at(),
    })
}

fn to_state_row(state: &RunState) -> FlowRunStateRow {
    FlowRunStateRow {
        id: state.id().into_inner(),
        flow_run_id: state.run_id().into_inner(),
        state_type: state.state_type().as_str().to_owned(),
        name: state.name().to_owned(),
        message: state.message().map(str::to_owned),
        timestamp: state.timestamp(),
        scheduled_time: state.scheduled_time(),
    }
}

fn row_to_run(row: FlowRunRow) -> RunStoreResult<FlowRun> {
    let FlowRunRow {
        id,
        flow_id,
        deployment_id,
        idempotency_key,
        parameters: persisted_parameters,
        tags: persisted_tags,
        auto_scheduled,
        expected_start_time,
        next_scheduled_start_time,
        state_id,
        state_type: persisted_state_type,
        created_at,
        updated_at,
    } = row;

    let parameters = serde_json::from_value::<Parameters>(persisted_parameters)
        .map_err(RunStoreError::persistence)?;
    let tags = serde_json::from_value::<Vec<String>>(persisted_tags)
        .map_err(RunStoreError::persistence)?;
    let state_type = persisted_state_type
        .as_deref()
        .map(StateType::try_from)
        .transpose()
        .map_err(RunStoreError::persistence)?;

    Ok(FlowRun::from_persisted(PersistedFlowRunData {
        id: FlowRunId::from_uuid(id),
        flow_id: FlowId::from_uuid(flow_id),
        deployment_id: deployment_id.map(DeploymentId::from_uuid),
        parameters,
        tags,
        idempotency_key: IdempotencyKey::from_persisted(idempotency_key),
        auto_scheduled,
        expected_start_time,
        next_scheduled_start_time,
        state_id: state_id.map(StateId::from_uuid),
        state_type,
        created_at,
        updated_at,
    }))
}

fn row_to_state(row: FlowRunStateRow) -> RunStoreResult<RunState> {
    let state_type =
        StateType::try_from(row.state_type.as_str()).map_err(RunStoreError::persistence)?;
    Ok(RunState::from_persisted(PersistedRunStateData {
        id: StateId::from_uuid(row.id),
        run_id: FlowRunId::from_uuid(row.flow_run_id),
        state_type,
        name: row.name,
        message: row.message,
        timestamp: row.timestamp,
        scheduled_time: row.scheduled_time,
    }))
}
