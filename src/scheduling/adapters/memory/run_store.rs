//! In-memory run store for scheduling tests.
//!
//! Every operation runs under a single write or read lock, which gives the
//! batch insert and the state link the same all-or-nothing behaviour the
//! `PostgreSQL` adapter gets from its unique index and transactions.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::scheduling::{
    domain::{
        DeploymentId, FlowId, FlowRun, FlowRunId, IdempotencyKey, RunCandidate, RunState, StateId,
    },
    ports::{RunStore, RunStoreError, RunStoreResult},
};

/// Thread-safe in-memory run store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunStore {
    state: Arc<RwLock<InMemoryRunState>>,
}

#[derive(Debug, Default)]
struct InMemoryRunState {
    runs: HashMap<FlowRunId, FlowRun>,
    key_index: HashMap<(FlowId, IdempotencyKey), FlowRunId>,
    states: HashMap<StateId, RunState>,
    run_states: HashMap<FlowRunId, Vec<StateId>>,
}

impl InMemoryRunStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored runs.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::Persistence`] when the lock is poisoned.
    pub fn run_count(&self) -> RunStoreResult<usize> {
        Ok(self.read()?.runs.len())
    }

    /// Returns every state recorded for a run, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::Persistence`] when the lock is poisoned.
    pub fn state_history(&self, run_id: FlowRunId) -> RunStoreResult<Vec<RunState>> {
        let state = self.read()?;
        let history = state
            .run_states
            .get(&run_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.states.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(history)
    }

    fn read(&self) -> RunStoreResult<RwLockReadGuard<'_, InMemoryRunState>> {
        self.state
            .read()
            .map_err(|err| RunStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> RunStoreResult<RwLockWriteGuard<'_, InMemoryRunState>> {
        self.state
            .write()
            .map_err(|err| RunStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

fn sorted_by_schedule(mut runs: Vec<FlowRun>) -> Vec<FlowRun> {
    runs.sort_by_key(|run| (run.next_scheduled_start_time(), run.id()));
    runs
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn insert_if_absent(&self, candidates: &[RunCandidate]) -> RunStoreResult<()> {
        let mut state = self.write()?;
        for candidate in candidates {
            let key = (candidate.flow_id(), candidate.idempotency_key().clone());
            if state.key_index.contains_key(&key) || state.runs.contains_key(&candidate.id()) {
                continue;
            }
            state.key_index.insert(key, candidate.id());
            state
                .runs
                .insert(candidate.id(), FlowRun::from_candidate(candidate));
        }
        Ok(())
    }

    async fn find_runs_without_state(
        &self,
        run_ids: &[FlowRunId],
    ) -> RunStoreResult<HashSet<FlowRunId>> {
        let state = self.read()?;
        Ok(run_ids
            .iter()
            .copied()
            .filter(|id| state.runs.contains_key(id))
            .filter(|id| state.run_states.get(id).is_none_or(Vec::is_empty))
            .collect())
    }

    async fn insert_state_and_link(&self, run_state: &RunState) -> RunStoreResult<()> {
        let mut state = self.write()?;
        let run_id = run_state.run_id();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or(RunStoreError::RunNotFound(run_id))?;
        run.link_state(run_state);
        state.states.insert(run_state.id(), run_state.clone());
        state
            .run_states
            .entry(run_id)
            .or_default()
            .push(run_state.id());
        Ok(())
    }

    async fn find_run(&self, id: FlowRunId) -> RunStoreResult<Option<FlowRun>> {
        Ok(self.read()?.runs.get(&id).cloned())
    }

    async fn find_current_state(&self, run_id: FlowRunId) -> RunStoreResult<Option<RunState>> {
        let state = self.read()?;
        let current = state
            .runs
            .get(&run_id)
            .and_then(FlowRun::state_id)
            .and_then(|state_id| state.states.get(&state_id))
            .cloned();
        Ok(current)
    }

    async fn find_runs_by_deployment(
        &self,
        deployment_id: DeploymentId,
    ) -> RunStoreResult<Vec<FlowRun>> {
        let state = self.read()?;
        let runs = state
            .runs
            .values()
            .filter(|run| run.deployment_id() == Some(deployment_id))
            .cloned()
            .collect();
        Ok(sorted_by_schedule(runs))
    }

    async fn find_unlinked_runs(
        &self,
        deployment_id: DeploymentId,
    ) -> RunStoreResult<Vec<FlowRun>> {
        let state = self.read()?;
        let runs = state
            .runs
            .values()
            .filter(|run| run.deployment_id() == Some(deployment_id) && run.state_id().is_none())
            .cloned()
            .collect();
        Ok(sorted_by_schedule(runs))
    }
}
