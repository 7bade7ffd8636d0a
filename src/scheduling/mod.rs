//! Scheduled run materialization.
//!
//! Turns a deployment's recurring schedule into concrete stored flow runs,
//! each carrying a current SCHEDULED state, exactly once per scheduled time
//! even under repeated or concurrent invocation. Deduplication rests on the
//! store's native skip-on-conflict insert keyed by `(flow_id,
//! idempotency_key)`. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
