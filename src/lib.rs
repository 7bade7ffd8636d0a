//! Cadence: scheduled flow run materialization.
//!
//! This crate turns deployment schedules into concrete, persisted flow runs
//! with an initial SCHEDULED state. Repeated and concurrent invocations over
//! overlapping windows create each scheduled run exactly once.
//!
//! # Architecture
//!
//! Cadence follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory, PostgreSQL)
//!
//! # Modules
//!
//! - [`scheduling`]: Schedule enumeration, idempotent run persistence and
//!   initial state linking

pub mod scheduling;
