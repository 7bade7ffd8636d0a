//! Given steps for run scheduling BDD scenarios.

use super::world::{SchedulingWorld, minute, run_async, scenario_origin};
use cadence::scheduling::{
    domain::{DeploymentId, DeploymentSnapshot, FlowId, IntervalSchedule},
    services::ScheduleRunsRequest,
};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use std::sync::Arc;

fn interval_deployment(
    minutes: i64,
    flow_id: Option<FlowId>,
) -> Result<DeploymentSnapshot, eyre::Report> {
    let schedule = IntervalSchedule::new(minutes * 60, scenario_origin()?)
        .wrap_err("build interval schedule")?;
    let snapshot = flow_id.map_or_else(
        || DeploymentSnapshot::without_flow(DeploymentId::new()),
        |flow| DeploymentSnapshot::new(DeploymentId::new(), flow),
    );
    Ok(snapshot.with_schedule(Arc::new(schedule)))
}

fn register(world: &mut SchedulingWorld, deployment: DeploymentSnapshot) -> eyre::Result<()> {
    world.deployment_id = Some(deployment.id());
    world
        .deployments
        .upsert(deployment)
        .wrap_err("register deployment")
}

#[given("an active deployment that runs every {minutes:i64} minutes")]
fn active_interval_deployment(world: &mut SchedulingWorld, minutes: i64) -> eyre::Result<()> {
    let deployment = interval_deployment(minutes, Some(FlowId::new()))?;
    register(world, deployment)
}

#[given("a paused deployment that runs every {minutes:i64} minutes")]
fn paused_interval_deployment(world: &mut SchedulingWorld, minutes: i64) -> eyre::Result<()> {
    let deployment = interval_deployment(minutes, Some(FlowId::new()))?.with_schedule_active(false);
    register(world, deployment)
}

#[given("an active deployment without a flow that runs every {minutes:i64} minutes")]
fn flowless_interval_deployment(world: &mut SchedulingWorld, minutes: i64) -> eyre::Result<()> {
    let deployment = interval_deployment(minutes, None)?;
    register(world, deployment)
}

#[given("a deployment that was never registered")]
fn unregistered_deployment(world: &mut SchedulingWorld) {
    world.deployment_id = Some(DeploymentId::new());
}

#[given("runs were already scheduled between minute {start:i64} and minute {end:i64}")]
fn runs_already_scheduled(world: &mut SchedulingWorld, start: i64, end: i64) -> eyre::Result<()> {
    let deployment_id = world
        .deployment_id
        .ok_or_else(|| eyre::eyre!("missing deployment in scenario world"))?;
    let request = ScheduleRunsRequest::new(deployment_id)
        .with_start_time(minute(start)?)
        .with_end_time(minute(end)?);
    run_async(world.service.schedule_runs(request)).wrap_err("schedule initial window")?;
    Ok(())
}
