//! Error types for scheduling domain validation and parsing.

use super::DeploymentId;
use thiserror::Error;

/// Errors returned while constructing scheduling domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulingDomainError {
    /// The deployment snapshot has no owning flow, so runs cannot be built.
    #[error("deployment {0} has no flow identifier")]
    MissingFlowId(DeploymentId),

    /// An interval schedule was given a zero or negative interval.
    #[error("schedule interval must be positive, got {seconds}s")]
    NonPositiveInterval {
        /// The rejected interval in whole seconds.
        seconds: i64,
    },
}

/// Error returned while parsing state types from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown state type: {0}")]
pub struct ParseStateTypeError(pub String);
