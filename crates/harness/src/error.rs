//! Error taxonomy for the harness primitives.
//!
//! Every variant is terminal for the scenario step it occurs in: the retry
//! and wait machinery has already spent its budget by the time one of these
//! surfaces, and callers are expected to abort rather than recover.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input does not look like a version at all (no `MAJOR.MINOR` prefix).
    #[error("invalid version {value:?}: expected at least MAJOR.MINOR")]
    InvalidFormat { value: String },

    /// Well-shaped input that still fails to parse as a version or
    /// constraint expression.
    #[error("unparsable {what} {value:?}")]
    Parse { what: &'static str, value: String },

    /// Rejected retry policy (the poll interval must fit inside the budget).
    #[error(
        "invalid retry policy: poll interval {poll_interval:?} must be shorter than total timeout {total_timeout:?}"
    )]
    InvalidPolicy {
        total_timeout: Duration,
        poll_interval: Duration,
    },

    /// The program could not be started at all (missing binary, permissions).
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A single, non-retried invocation exited non-zero.
    #[error("{program} failed: {detail}")]
    Command { program: String, detail: String },

    /// Retry budget exhausted. Carries the full attempt log for diagnostics;
    /// the display line only shows the most recent failure.
    #[error("{what} timed out after {budget:?} ({attempts} attempts); last failure: {last_failure}")]
    Timeout {
        what: String,
        budget: Duration,
        attempts: u32,
        last_failure: String,
        log: Vec<String>,
    },

    /// Phase one of a wait gate ran out of budget: the resource was never
    /// observed to exist. The condition was never polled.
    #[error("{namespace}/{resource} was not created within {budget:?}")]
    NotFound {
        namespace: String,
        resource: String,
        budget: Duration,
    },

    /// Phase two of a wait gate ran out of budget: the resource exists but
    /// never reported the requested condition.
    #[error("{namespace}/{resource} did not reach condition {condition} within {budget:?}")]
    ConditionTimeout {
        namespace: String,
        resource: String,
        condition: String,
        budget: Duration,
    },

    /// Label-selector wait gate ran out of budget for one or more selectors.
    #[error("pods not ready within {budget:?}: {}", .unsatisfied.join(", "))]
    PodsNotReady {
        unsatisfied: Vec<String>,
        budget: Duration,
    },

    /// The kubeconfig file could not be loaded or turned into a client.
    #[error("failed to load kubeconfig {path}: {detail}")]
    Kubeconfig { path: String, detail: String },

    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    #[error("kubernetes api request failed")]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
