//! Identifier types for the scheduling domain.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the wrapped UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a deployment definition.
    DeploymentId
);

uuid_id!(
    /// Unique identifier for the flow a deployment runs.
    FlowId
);

uuid_id!(
    /// Unique identifier for a flow run.
    FlowRunId
);

uuid_id!(
    /// Unique identifier for a run state record.
    StateId
);

/// Deterministic deduplication key for a scheduled run.
///
/// Two keys built from the same deployment and scheduled time are always
/// equal, which is what lets repeated or concurrent scheduling passes collapse
/// onto a single stored run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Builds the key for a run of `deployment_id` scheduled at
    /// `scheduled_time`.
    ///
    /// The timestamp is rendered as RFC 3339 in UTC with the shortest
    /// fractional-second precision that preserves it, so the same instant
    /// always produces the same text.
    #[must_use]
    pub fn scheduled(deployment_id: DeploymentId, scheduled_time: DateTime<Utc>) -> Self {
        Self(format!(
            "scheduled {deployment_id} {}",
            scheduled_time.to_rfc3339_opts(SecondsFormat::AutoSi, false)
        ))
    }

    /// Wraps a key loaded from storage.
    #[must_use]
    pub fn from_persisted(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
