//! Step definitions for scheduled run materialization scenarios.

mod given;
mod when;
