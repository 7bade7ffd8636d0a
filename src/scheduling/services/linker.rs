//! Initial state creation for newly stored runs.

use super::error::{RunSchedulingError, RunSchedulingResult};
use crate::scheduling::{
    domain::{FlowRun, RunCandidate, RunState, ScheduledStatePayload},
    ports::{RunStore, RunStoreError},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{error, warn};

/// Creates each new run's SCHEDULED state and points the run at it.
#[derive(Debug)]
pub struct StateLinker<S, C>
where
    S: RunStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> Clone for StateLinker<S, C>
where
    S: RunStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> StateLinker<S, C>
where
    S: RunStore,
    C: Clock + Send + Sync,
{
    /// Creates a linker over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Links the scheduled state carried by each newly created candidate.
    ///
    /// # Errors
    ///
    /// Returns [`RunSchedulingError::PartialLinkFailure`] after attempting
    /// every run when one or more state writes were not linked, or
    /// [`RunSchedulingError::Store`] as soon as the store fails outright.
    pub async fn link(&self, created: Vec<RunCandidate>) -> RunSchedulingResult<Vec<FlowRun>> {
        let pending = created
            .into_iter()
            .map(|candidate| {
                let payload = candidate.state().clone();
                (FlowRun::from_candidate(&candidate), payload)
            })
            .collect();
        self.link_all(pending).await
    }

    /// Links a fresh SCHEDULED state to stored runs that have no current
    /// state, using each run's next scheduled start time.
    ///
    /// Runs without a recorded start time are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`Self::link`].
    pub async fn relink(&self, unlinked: Vec<FlowRun>) -> RunSchedulingResult<Vec<FlowRun>> {
        let pending = unlinked
            .into_iter()
            .filter_map(|run| {
                let scheduled_time = run
                    .next_scheduled_start_time()
                    .or_else(|| run.expected_start_time());
                if scheduled_time.is_none() {
                    warn!(
                        run_id = %run.id(),
                        "unlinked run has no scheduled time; skipping repair"
                    );
                }
                scheduled_time.map(|time| (run, ScheduledStatePayload::new(time)))
            })
            .collect();
        self.link_all(pending).await
    }

    async fn link_all(
        &self,
        pending: Vec<(FlowRun, ScheduledStatePayload)>,
    ) -> RunSchedulingResult<Vec<FlowRun>> {
        let mut linked = Vec::with_capacity(pending.len());
        let mut unlinked = Vec::new();
        let mut remaining = pending.into_iter();

        while let Some((mut run, payload)) = remaining.next() {
            let state = RunState::from_payload(run.id(), &payload, &*self.clock);
            match self.store.insert_state_and_link(&state).await {
                Ok(()) => {
                    run.link_state(&state);
                    linked.push(run);
                }
                Err(RunStoreError::PartialLink {
                    run_id,
                    state_id,
                    source,
                }) => {
                    error!(
                        %run_id,
                        %state_id,
                        error = %source,
                        "state written but run not linked; flagged for repair"
                    );
                    unlinked.push(run_id);
                }
                Err(err) => {
                    let awaiting_repair = remaining.len() + 1 + unlinked.len();
                    warn!(
                        run_id = %run.id(),
                        awaiting_repair,
                        error = %err,
                        "linking aborted; runs left without state"
                    );
                    return Err(err.into());
                }
            }
        }

        if unlinked.is_empty() {
            Ok(linked)
        } else {
            Err(RunSchedulingError::PartialLinkFailure { run_ids: unlinked })
        }
    }
}
