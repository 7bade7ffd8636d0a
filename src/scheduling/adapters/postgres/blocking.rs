//! Blocking operation helpers for `PostgreSQL` scheduling adapters.
//!
//! Diesel connections are synchronous, so every query runs on Tokio's
//! blocking pool with a connection checked out from the shared r2d2 pool.

use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};

/// `PostgreSQL` connection pool type used by scheduling adapters.
pub type SchedulingPgPool = Pool<ConnectionManager<PgConnection>>;

/// Runs `f` with a pooled connection on the blocking thread pool.
///
/// Pool checkout failures and join errors are mapped into the caller's error
/// type so each adapter keeps its own port error.
pub(super) async fn run_blocking_with<F, T, E>(
    pool: &SchedulingPgPool,
    f: F,
    map_pool_err: fn(PoolError) -> E,
    map_join_err: fn(tokio::task::JoinError) -> E,
) -> Result<T, E>
where
    F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut connection = pool.get().map_err(map_pool_err)?;
        f(&mut connection)
    })
    .await
    .map_err(map_join_err)?
}
