//! helm wrapper with retrying invocation.
//!
//! helm talks to the cluster through `KUBECONFIG`, so the wrapper passes the
//! kubeconfig through the environment rather than a flag. Registry and chart
//! operations are flaky enough on fresh clusters that every invocation runs
//! under a retry budget by default.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cmd::CommandSpec;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// helm invocations bound to an optional kubeconfig.
#[derive(Debug, Clone, Default)]
pub struct Helm {
    kubeconfig: Option<PathBuf>,
}

impl Helm {
    /// Use the ambient `KUBECONFIG`.
    #[must_use]
    pub fn new() -> Self {
        Self { kubeconfig: None }
    }

    /// Bind all invocations to an explicit kubeconfig file.
    #[must_use]
    pub fn with_kubeconfig(path: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: Some(path.into()),
        }
    }

    /// The bound kubeconfig, if any.
    #[must_use]
    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    fn spec(&self, args: &[&str]) -> CommandSpec {
        let mut spec = CommandSpec::new("helm").args(args.iter().copied());
        if let Some(path) = &self.kubeconfig {
            spec = spec.env("KUBECONFIG", path.display().to_string());
        }
        spec
    }

    /// Run a helm command once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Command`] on non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        self.spec(args).run()
    }

    /// Run a helm command under a retry policy, returning the successful
    /// attempt's output.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] carrying every attempt's output once
    /// the budget is exhausted.
    pub async fn run_with_retry(&self, args: &[&str], policy: &RetryPolicy) -> Result<String> {
        info!(args = ?args, "helm");
        self.spec(args).run_with_retry(policy).await
    }

    /// `helm repo add` — safe to repeat on an already-registered repo.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] once the budget is exhausted.
    pub async fn repo_add(&self, name: &str, url: &str, policy: &RetryPolicy) -> Result<()> {
        self.run_with_retry(&["repo", "add", name, url, "--force-update"], policy)
            .await
            .map(|_| ())
    }

    /// `helm repo update`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] once the budget is exhausted.
    pub async fn repo_update(&self, policy: &RetryPolicy) -> Result<()> {
        self.run_with_retry(&["repo", "update"], policy)
            .await
            .map(|_| ())
    }
}
