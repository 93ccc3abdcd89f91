//! K3s bootstrap helpers.
//!
//! Provisions the single-node cluster the scenario runs against: download
//! the upstream install script, run it with the standard flags, start the
//! service. The installer is idempotent under re-runs, which is what the
//! retry budgets rely on.

use std::path::Path;

use tracing::info;

use crate::cmd::CommandSpec;
use crate::error::Result;
use crate::retry::{retry, RetryPolicy};

/// Upstream installation script.
pub const INSTALL_SCRIPT_URL: &str = "https://get.k3s.io";

/// Where K3s writes the cluster kubeconfig.
pub const KUBECONFIG_PATH: &str = "/etc/rancher/k3s/k3s.yaml";

/// Installer flags: the metrics server is dead weight for an e2e run, and
/// the kubeconfig must be world-readable for the non-root tooling.
pub const INSTALL_EXEC: &str = "--disable metrics-server --write-kubeconfig-mode 0644";

/// Download the install script to `dest`, retrying transient fetch failures.
///
/// # Errors
///
/// Returns [`crate::Error::Timeout`] once the budget is exhausted.
pub async fn fetch_install_script(url: &str, dest: &Path, policy: &RetryPolicy) -> Result<()> {
    info!(url, dest = %dest.display(), "fetching k3s install script");

    let body = retry(policy, "fetch k3s install script", || async move {
        let response = reqwest::get(url).await.map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response.text().await.map_err(|e| e.to_string())
    })
    .await?;

    std::fs::write(dest, body)?;
    Ok(())
}

/// Run the install script with [`INSTALL_EXEC`], retrying sporadic failures.
/// Returns the successful attempt's output.
///
/// # Errors
///
/// Returns [`crate::Error::Timeout`] once the budget is exhausted.
pub async fn install(script: &Path, policy: &RetryPolicy) -> Result<String> {
    info!(script = %script.display(), "installing k3s");

    CommandSpec::new("sh")
        .arg(script.display().to_string())
        .env("INSTALL_K3S_EXEC", INSTALL_EXEC)
        .run_with_retry(policy)
        .await
}

/// Start the K3s service.
///
/// # Errors
///
/// Returns [`crate::Error::Command`] if systemctl fails.
pub fn start() -> Result<()> {
    info!("starting k3s service");
    CommandSpec::new("sudo")
        .args(["systemctl", "start", "k3s"])
        .run()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(2), Duration::from_millis(50)).unwrap()
    }

    #[tokio::test]
    async fn fetches_script_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#!/bin/sh\necho k3s\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("k3s-install.sh");

        fetch_install_script(&server.uri(), &dest, &quick_policy())
            .await
            .unwrap();

        let written = std::fs::read_to_string(&dest).unwrap();
        assert!(written.contains("echo k3s"));
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let server = MockServer::start().await;
        // Two failures, then the script. expect() pins the attempt count.
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("k3s-install.sh");

        fetch_install_script(&server.uri(), &dest, &quick_policy())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "ok");
    }

    #[tokio::test]
    async fn persistent_server_errors_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let policy =
            RetryPolicy::new(Duration::from_millis(300), Duration::from_millis(100)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("k3s-install.sh");

        let err = fetch_install_script(&server.uri(), &dest, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Timeout { .. }));
        assert!(!dest.exists());
    }
}
