//! `PostgreSQL` adapters for scheduling persistence.

mod blocking;
mod deployment;
mod models;
mod run_store;
mod schema;

pub use blocking::SchedulingPgPool;
pub use deployment::PostgresDeploymentRepository;
pub use run_store::PostgresRunStore;
