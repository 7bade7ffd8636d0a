//! Orchestration of scheduled run materialization for a deployment.

use super::{
    config::SchedulingConfig,
    error::{RunSchedulingError, RunSchedulingResult},
    linker::StateLinker,
    persister::IdempotentRunPersister,
};
use crate::scheduling::{
    domain::{
        DeploymentId, DeploymentSnapshot, FlowRun, RunCandidate, ScheduleDates, ScheduleWindow,
    },
    ports::{DeploymentRepository, RunStore},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Request payload for materializing a deployment's scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRunsRequest {
    deployment_id: DeploymentId,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    max_runs: Option<usize>,
}

impl ScheduleRunsRequest {
    /// Creates a request that uses the configured window and run cap.
    #[must_use]
    pub const fn new(deployment_id: DeploymentId) -> Self {
        Self {
            deployment_id,
            start_time: None,
            end_time: None,
            max_runs: None,
        }
    }

    /// Sets the inclusive window start.
    #[must_use]
    pub const fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Sets the exclusive window end.
    #[must_use]
    pub const fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Caps the number of runs considered.
    #[must_use]
    pub const fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Returns the target deployment.
    #[must_use]
    pub const fn deployment_id(&self) -> DeploymentId {
        self.deployment_id
    }
}

/// Turns a deployment's schedule into stored runs, each with a current
/// SCHEDULED state, exactly once per scheduled time.
#[derive(Debug)]
pub struct RunSchedulingService<D, S, C>
where
    D: DeploymentRepository,
    S: RunStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    deployments: Arc<D>,
    store: Arc<S>,
    clock: Arc<C>,
    config: SchedulingConfig,
}

impl<D, S, C> Clone for RunSchedulingService<D, S, C>
where
    D: DeploymentRepository,
    S: RunStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            deployments: Arc::clone(&self.deployments),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}

impl<D, S, C> RunSchedulingService<D, S, C>
where
    D: DeploymentRepository,
    S: RunStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a scheduling service.
    #[must_use]
    pub const fn new(
        deployments: Arc<D>,
        store: Arc<S>,
        clock: Arc<C>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            deployments,
            store,
            clock,
            config,
        }
    }

    /// Returns the defaults applied to requests.
    #[must_use]
    pub const fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// Materializes the deployment's scheduled runs inside the request
    /// window and returns the runs this call created.
    ///
    /// An unknown deployment, or one without an active schedule, yields an
    /// empty result without touching the run store. Runs whose scheduled
    /// time already has a stored run are skipped, so overlapping and
    /// concurrent calls are safe.
    ///
    /// Once candidates are built, storage and linking run to completion on a
    /// separate task even if the returned future is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RunSchedulingError::InvalidDeploymentState`] before any
    /// write when the deployment cannot produce runs,
    /// [`RunSchedulingError::Deployment`] or [`RunSchedulingError::Store`] on
    /// storage failures, and [`RunSchedulingError::PartialLinkFailure`] when
    /// runs were stored but left without a current state.
    pub async fn schedule_runs(
        &self,
        request: ScheduleRunsRequest,
    ) -> RunSchedulingResult<Vec<FlowRun>> {
        let deployment_id = request.deployment_id;
        let Some(deployment) = self.deployments.get_deployment(deployment_id).await? else {
            warn!(%deployment_id, "deployment not found; nothing to schedule");
            return Ok(Vec::new());
        };

        let window = self.resolve_window(&request);
        let max_runs = request.max_runs.unwrap_or(self.config.max_runs);
        let candidates = self.build_candidates(&deployment, window, max_runs)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let persister = IdempotentRunPersister::new(Arc::clone(&self.store));
        let linker = StateLinker::new(Arc::clone(&self.store), Arc::clone(&self.clock));
        let submitted = candidates.len();
        let created = tokio::spawn(async move {
            let stored = persister
                .persist(candidates)
                .await
                .map_err(RunSchedulingError::from)?;
            linker.link(stored).await
        })
        .await
        .map_err(|err| RunSchedulingError::Aborted(err.to_string()))??;

        info!(
            %deployment_id,
            submitted,
            created = created.len(),
            "materialized scheduled runs"
        );
        Ok(created)
    }

    /// Links a SCHEDULED state to every run of the deployment that was
    /// stored without one, and returns the repaired runs.
    ///
    /// # Errors
    ///
    /// Returns [`RunSchedulingError::Store`] when the lookup or a link fails
    /// outright, or [`RunSchedulingError::PartialLinkFailure`] when some runs
    /// are still unlinked afterwards.
    pub async fn repair_unlinked_runs(
        &self,
        deployment_id: DeploymentId,
    ) -> RunSchedulingResult<Vec<FlowRun>> {
        let unlinked = self.store.find_unlinked_runs(deployment_id).await?;
        if unlinked.is_empty() {
            debug!(%deployment_id, "no unlinked runs to repair");
            return Ok(Vec::new());
        }

        warn!(
            %deployment_id,
            unlinked = unlinked.len(),
            "repairing runs stored without a state"
        );
        let linker = StateLinker::new(Arc::clone(&self.store), Arc::clone(&self.clock));
        let repaired = linker.relink(unlinked).await?;
        info!(%deployment_id, repaired = repaired.len(), "repaired unlinked runs");
        Ok(repaired)
    }

    fn resolve_window(&self, request: &ScheduleRunsRequest) -> ScheduleWindow {
        let start = request.start_time.unwrap_or_else(|| self.clock.utc());
        let end = request.end_time.unwrap_or_else(|| {
            start
                .checked_add_signed(self.config.horizon)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        ScheduleWindow::new(start, end)
    }

    fn build_candidates(
        &self,
        deployment: &DeploymentSnapshot,
        window: ScheduleWindow,
        max_runs: usize,
    ) -> RunSchedulingResult<Vec<RunCandidate>> {
        let deployment_id = deployment.id();
        let Some(schedule) = deployment.active_schedule() else {
            debug!(
                %deployment_id,
                has_schedule = deployment.schedule().is_some(),
                "no active schedule; nothing to schedule"
            );
            return Ok(Vec::new());
        };

        let candidates = ScheduleDates::new(schedule, window, max_runs)
            .map(|scheduled_time| {
                RunCandidate::for_occurrence(deployment, scheduled_time, &*self.clock)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            %deployment_id,
            window_start = %window.start(),
            window_end = %window.end(),
            dates = candidates.len(),
            "enumerated schedule dates"
        );
        Ok(candidates)
    }
}
