//! Label-selector pod readiness gate.
//!
//! The alternative to the named-resource gate in [`crate::kubectl`]: given a
//! set of `(namespace, selector)` pairs, wait until every pod matching each
//! selector reports the `Ready` condition. Selectors are waited on
//! concurrently, each with an independent budget, and the failure lists
//! every selector that remained unsatisfied.

use std::path::Path;
use std::time::Instant;

use futures::future::join_all;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// One unit of the pod wait: all pods matching `selector` in `namespace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSelector {
    pub namespace: String,
    pub selector: String,
}

impl PodSelector {
    #[must_use]
    pub fn new(namespace: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: selector.into(),
        }
    }
}

impl std::fmt::Display for PodSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.selector, self.namespace)
    }
}

/// Build a Kubernetes client from a kubeconfig file.
///
/// # Errors
///
/// Returns [`Error::Kubeconfig`] if the file cannot be read or converted
/// into a client configuration.
pub async fn client_from_kubeconfig(path: &Path) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| Error::Kubeconfig {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::Kubeconfig {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;

    Client::try_from(config).map_err(Error::from)
}

fn pod_is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Whether a selector is currently satisfied: at least one matching pod, and
/// every matching pod Ready.
fn all_ready(pods: &[Pod]) -> bool {
    !pods.is_empty() && pods.iter().all(pod_is_ready)
}

async fn wait_selector(
    client: Client,
    selector: PodSelector,
    policy: RetryPolicy,
) -> std::result::Result<(), PodSelector> {
    let api: Api<Pod> = Api::namespaced(client, &selector.namespace);
    let params = ListParams::default().labels(&selector.selector);
    let start = Instant::now();

    loop {
        match api.list(&params).await {
            Ok(list) if all_ready(&list.items) => {
                info!(%selector, pods = list.items.len(), "all pods ready");
                return Ok(());
            }
            Ok(list) => {
                let ready = list.items.iter().filter(|p| pod_is_ready(p)).count();
                debug!(%selector, ready, total = list.items.len(), "pods not ready yet");
            }
            Err(e) => {
                // API hiccups count as an unsatisfied poll, not a failure.
                debug!(%selector, error = %e, "pod list failed");
            }
        }

        if start.elapsed() >= policy.total_timeout {
            return Err(selector);
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Wait until every pod matching each selector is Ready. The whole set is
/// satisfied only when all members are; selectors that time out are
/// aggregated into the returned error.
///
/// # Errors
///
/// Returns [`Error::PodsNotReady`] naming each selector that remained
/// unsatisfied at the end of its budget.
pub async fn wait_for_pods_ready(
    client: &Client,
    selectors: &[PodSelector],
    policy: &RetryPolicy,
) -> Result<()> {
    info!(count = selectors.len(), "waiting for pod selectors");

    let waits = selectors
        .iter()
        .map(|selector| wait_selector(client.clone(), selector.clone(), *policy));

    let unsatisfied: Vec<String> = join_all(waits)
        .await
        .into_iter()
        .filter_map(|outcome| outcome.err().map(|selector| selector.to_string()))
        .collect();

    if unsatisfied.is_empty() {
        Ok(())
    } else {
        Err(Error::PodsNotReady {
            unsatisfied,
            budget: policy.total_timeout,
        })
    }
}
