//! When steps for run scheduling BDD scenarios.

use super::world::{SchedulingWorld, minute, run_async};
use cadence::scheduling::services::ScheduleRunsRequest;
use rstest_bdd_macros::when;

#[when("runs are scheduled between minute {start:i64} and minute {end:i64}")]
fn schedule_window(world: &mut SchedulingWorld, start: i64, end: i64) -> eyre::Result<()> {
    let deployment_id = world
        .deployment_id
        .ok_or_else(|| eyre::eyre!("missing deployment in scenario world"))?;
    let request = ScheduleRunsRequest::new(deployment_id)
        .with_start_time(minute(start)?)
        .with_end_time(minute(end)?);
    world.last_result = Some(run_async(world.service.schedule_runs(request)));
    Ok(())
}
