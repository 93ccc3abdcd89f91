//! kubectl wrapper and the named-resource wait gate.
//!
//! The gate is two-phase: first wait for the resource to be observed at all,
//! then wait for the requested condition. The phases are strictly
//! sequential — condition polling never starts before existence is
//! confirmed — and each phase owns its own budget.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::cmd::CommandSpec;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Per-invocation timeout handed to `kubectl wait` so a single call never
/// outlives one poll step of the surrounding loop.
const PER_CALL_TIMEOUT: &str = "--timeout=30s";

/// kubectl invocations bound to an optional kubeconfig.
#[derive(Debug, Clone, Default)]
pub struct Kubectl {
    kubeconfig: Option<PathBuf>,
}

impl Kubectl {
    /// Use the ambient kubeconfig (`KUBECONFIG` or the default location).
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
        let mut spec = CommandSpec::new("kubectl");
        if let Some(path) = &self.kubeconfig {
            spec = spec.arg("--kubeconfig").arg(path.display().to_string());
        }
        spec.args(args.iter().copied())
    }

    /// Run a kubectl command, returning its stdout/stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] on non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        self.spec(args).run()
    }

    /// Run a kubectl command under a retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] once the budget is exhausted.
    pub async fn run_with_retry(&self, args: &[&str], policy: &RetryPolicy) -> Result<String> {
        self.spec(args).run_with_retry(policy).await
    }

    fn try_wait(&self, namespace: &str, resource: &str, waiter: &str) -> std::result::Result<(), String> {
        self.spec(&[
            "wait",
            "--namespace",
            namespace,
            waiter,
            resource,
            PER_CALL_TIMEOUT,
        ])
        .run_once()
        .map(|_| ())
    }

    /// Wait for `namespace/resource` to exist and then to report
    /// `condition`, each phase bounded by `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the resource is never observed, and
    /// [`Error::ConditionTimeout`] if it exists but the condition never
    /// holds.
    pub async fn wait_for_condition(
        &self,
        namespace: &str,
        resource: &str,
        condition: &str,
        policy: &RetryPolicy,
    ) -> Result<()> {
        info!(namespace, resource, condition, "waiting for resource");

        let waiter = format!("--for=condition={condition}");
        let waiter_flag: &str = &waiter;
        two_phase(
            namespace,
            resource,
            condition,
            policy,
            || async move { self.try_wait(namespace, resource, "--for=create") },
            || async move { self.try_wait(namespace, resource, waiter_flag) },
        )
        .await?;

        info!(namespace, resource, condition, "resource is ready");
        Ok(())
    }
}

/// Sequenced two-phase wait over arbitrary probes. Phase two is not entered
/// until phase one has succeeded.
async fn two_phase<E, EF, C, CF>(
    namespace: &str,
    resource: &str,
    condition: &str,
    policy: &RetryPolicy,
    mut exists: E,
    mut ready: C,
) -> Result<()>
where
    E: FnMut() -> EF,
    EF: Future<Output = std::result::Result<(), String>>,
    C: FnMut() -> CF,
    CF: Future<Output = std::result::Result<(), String>>,
{
    let start = Instant::now();
    loop {
        match exists().await {
            Ok(()) => break,
            Err(failure) => {
                debug!(namespace, resource, %failure, "resource not observed yet");
            }
        }
        if start.elapsed() >= policy.total_timeout {
            return Err(Error::NotFound {
                namespace: namespace.to_string(),
                resource: resource.to_string(),
                budget: policy.total_timeout,
            });
        }
        tokio::time::sleep(policy.poll_interval).await;
    }

    let start = Instant::now();
    loop {
        match ready().await {
            Ok(()) => return Ok(()),
            Err(failure) => {
                debug!(namespace, resource, condition, %failure, "condition not met yet");
            }
        }
        if start.elapsed() >= policy.total_timeout {
            return Err(Error::ConditionTimeout {
                namespace: namespace.to_string(),
                resource: resource.to_string(),
                condition: condition.to_string(),
                budget: policy.total_timeout,
            });
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(100), Duration::from_millis(10)).unwrap()
    }

    #[tokio::test]
    async fn missing_resource_never_polls_condition() {
        let condition_polls = Arc::new(AtomicU32::new(0));
        let polls = Arc::clone(&condition_polls);

        let err = two_phase(
            "kube-system",
            "deployment/coredns",
            "Available",
            &quick_policy(),
            || async { Err("no such resource".to_string()) },
            move || {
                let polls = Arc::clone(&polls);
                async move {
                    polls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(condition_polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn condition_phase_starts_after_existence() {
        let exists_polls = Arc::new(AtomicU32::new(0));
        let exists_counter = Arc::clone(&exists_polls);

        two_phase(
            "cert-manager",
            "deployment/cert-manager",
            "Available",
            &quick_policy(),
            move || {
                let counter = Arc::clone(&exists_counter);
                async move {
                    // Observed on the second poll.
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("not yet".to_string())
                    } else {
                        Ok(())
                    }
                }
            },
            || async { Ok(()) },
        )
        .await
        .unwrap();

        assert_eq!(exists_polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stuck_condition_reports_condition_timeout() {
        let err = two_phase(
            "cattle-system",
            "deployments/rancher-webhook",
            "Available",
            &quick_policy(),
            || async { Ok(()) },
            || async { Err("0 of 1 updated replicas are available".to_string()) },
        )
        .await
        .unwrap_err();

        match err {
            Error::ConditionTimeout {
                namespace,
                resource,
                condition,
                ..
            } => {
                assert_eq!(namespace, "cattle-system");
                assert_eq!(resource, "deployments/rancher-webhook");
                assert_eq!(condition, "Available");
            }
            other => panic!("expected ConditionTimeout, got {other:?}"),
        }
    }

    #[test]
    fn kubeconfig_is_threaded_into_args() {
        let kubectl = Kubectl::with_kubeconfig("/etc/rancher/k3s/k3s.yaml");
        assert_eq!(
            kubectl.kubeconfig(),
            Some(Path::new("/etc/rancher/k3s/k3s.yaml"))
        );
    }
}
