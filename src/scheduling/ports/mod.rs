//! Port contracts for scheduled run materialization.
//!
//! Ports define infrastructure-agnostic interfaces used by scheduling
//! services.

pub mod deployment;
pub mod run_store;

pub use deployment::{DeploymentRepository, DeploymentRepositoryError, DeploymentRepositoryResult};
pub use run_store::{RunStore, RunStoreError, RunStoreResult};
