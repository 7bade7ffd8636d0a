//! Conflict-safe batch persistence of run candidates.

use crate::scheduling::{
    domain::{FlowRunId, RunCandidate},
    ports::{RunStore, RunStoreResult},
};
use std::sync::Arc;
use tracing::debug;

/// Writes run candidates once per idempotency key and reports which ones
/// were newly created.
#[derive(Debug)]
pub struct IdempotentRunPersister<S>
where
    S: RunStore,
{
    store: Arc<S>,
}

impl<S> Clone for IdempotentRunPersister<S>
where
    S: RunStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> IdempotentRunPersister<S>
where
    S: RunStore,
{
    /// Creates a persister over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Inserts `candidates` with skip-on-conflict and returns the ones that
    /// were stored by this call, in input order.
    ///
    /// Newly created runs are identified by probing which candidate ids now
    /// exist without any state record. A candidate whose key collided was
    /// never stored under its own id, and a run stored by an earlier pass
    /// already carries the state that pass linked, so neither is returned.
    ///
    /// # Errors
    ///
    /// Returns the store error when the batch write or the probe fails.
    pub async fn persist(
        &self,
        candidates: Vec<RunCandidate>,
    ) -> RunStoreResult<Vec<RunCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        self.store.insert_if_absent(&candidates).await?;

        let candidate_ids: Vec<FlowRunId> = candidates.iter().map(RunCandidate::id).collect();
        let unlinked = self.store.find_runs_without_state(&candidate_ids).await?;
        debug_assert!(
            unlinked.iter().all(|id| candidate_ids.contains(id)),
            "unlinked lookup must only report ids from the inserted batch"
        );

        let created: Vec<RunCandidate> = candidates
            .into_iter()
            .filter(|candidate| unlinked.contains(&candidate.id()))
            .collect();
        debug!(
            submitted = candidate_ids.len(),
            created = created.len(),
            "persisted run candidates"
        );
        Ok(created)
    }
}
