//! In-memory adapters for scheduling ports.

mod deployment;
mod run_store;

pub use deployment::InMemoryDeploymentRepository;
pub use run_store::InMemoryRunStore;
