//! Scenario driver.
//!
//! Sequences the full install/upgrade run: K3s bootstrap, core workload
//! waits, cert-manager, Rancher Manager deploy, workload health gates and
//! the optional post-install patch. Steps execute strictly sequentially and
//! each owns its own retry budget; the first failure aborts the scenario.

use std::time::Duration;

use anyhow::{Context, Result};
use harness::pods::{self, PodSelector};
use harness::version;
use harness::{Helm, Kubectl, RetryPolicy};
use tracing::{info, warn};

use crate::config::EnvConfig;
use crate::rancher;
use crate::ui;
use crate::validator::PrerequisitesValidator;

const INSTALL_STEPS: u8 = 9;
const UPGRADE_STEPS: u8 = 5;

/// Per-step retry budgets, scaled once from the configured multiplier.
#[derive(Debug, Clone)]
struct StepBudgets {
    script_fetch: RetryPolicy,
    k3s_install: RetryPolicy,
    helm: RetryPolicy,
    resource: RetryPolicy,
    pods: RetryPolicy,
    settle: Duration,
}

impl StepBudgets {
    fn new(scale: f64) -> Result<Self> {
        Ok(Self {
            script_fetch: RetryPolicy::new(Duration::from_secs(120), Duration::from_secs(10))?
                .scaled(scale),
            k3s_install: RetryPolicy::new(Duration::from_secs(120), Duration::from_secs(5))?
                .scaled(scale),
            helm: RetryPolicy::new(Duration::from_secs(120), Duration::from_secs(20))?
                .scaled(scale),
            resource: RetryPolicy::new(Duration::from_secs(300), Duration::from_secs(10))?
                .scaled(scale),
            pods: RetryPolicy::new(Duration::from_secs(300), Duration::from_secs(10))?
                .scaled(scale),
            settle: Duration::from_secs_f64(20.0 * scale),
        })
    }
}

/// One end-to-end run against a single cluster.
pub struct Scenario<'a> {
    config: &'a EnvConfig,
    kubectl: Kubectl,
    helm: Helm,
    budgets: StepBudgets,
}

impl<'a> Scenario<'a> {
    /// Build a scenario bound to the configured kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if the step budgets cannot be constructed.
    pub fn new(config: &'a EnvConfig) -> Result<Self> {
        let kubeconfig = config.kubeconfig_path();
        Ok(Self {
            config,
            kubectl: Kubectl::with_kubeconfig(&kubeconfig),
            helm: Helm::with_kubeconfig(&kubeconfig),
            budgets: StepBudgets::new(config.timeout_scale)?,
        })
    }

    /// Full install: bootstrap the cluster, then install everything on it.
    ///
    /// # Errors
    ///
    /// Any step failure aborts the scenario; the error chain carries the
    /// accumulated output of failed attempts.
    pub async fn run_install(&self) -> Result<()> {
        let started = chrono::Utc::now();

        ui::print_progress_step(1, INSTALL_STEPS, "Checking prerequisites");
        PrerequisitesValidator::for_install().validate()?;

        ui::print_progress_step(2, INSTALL_STEPS, "Fetching K3s install script");
        let script_dir = std::env::temp_dir();
        let script = script_dir.join("k3s-install.sh");
        harness::k3s::fetch_install_script(
            harness::k3s::INSTALL_SCRIPT_URL,
            &script,
            &self.budgets.script_fetch,
        )
        .await
        .context("Failed to fetch K3s install script")?;

        ui::print_progress_step(3, INSTALL_STEPS, "Installing K3s");
        let output = harness::k3s::install(&script, &self.budgets.k3s_install)
            .await
            .context("K3s installation failed")?;
        info!(output = %output.trim(), "k3s installer finished");

        ui::print_progress_step(4, INSTALL_STEPS, "Starting K3s");
        harness::k3s::start().context("Failed to start the K3s service")?;
        tokio::time::sleep(self.budgets.settle).await;

        ui::print_progress_step(5, INSTALL_STEPS, "Waiting for K3s core workloads");
        self.wait_core_workloads().await?;

        ui::print_progress_step(6, INSTALL_STEPS, "Installing cert-manager");
        self.install_cert_manager().await?;

        ui::print_progress_step(7, INSTALL_STEPS, "Deploying Rancher Manager");
        self.deploy_rancher().await?;

        ui::print_progress_step(8, INSTALL_STEPS, "Waiting for Rancher workloads");
        self.wait_rancher_workloads().await?;

        ui::print_progress_step(9, INSTALL_STEPS, "Applying post-install patches");
        self.post_install_patch().await?;

        let elapsed = chrono::Utc::now() - started;
        self.print_success_summary(elapsed.num_seconds());
        Ok(())
    }

    /// Upgrade an existing installation: same sequence minus the cluster
    /// bootstrap.
    ///
    /// # Errors
    ///
    /// Any step failure aborts the scenario.
    pub async fn run_upgrade(&self) -> Result<()> {
        let started = chrono::Utc::now();

        ui::print_progress_step(1, UPGRADE_STEPS, "Checking prerequisites");
        PrerequisitesValidator::for_upgrade().validate()?;

        ui::print_progress_step(2, UPGRADE_STEPS, "Updating chart repositories");
        self.helm
            .repo_update(&self.budgets.helm)
            .await
            .context("helm repo update failed")?;

        ui::print_progress_step(3, UPGRADE_STEPS, "Upgrading Rancher Manager");
        self.deploy_rancher().await?;

        ui::print_progress_step(4, UPGRADE_STEPS, "Waiting for Rancher workloads");
        self.wait_rancher_workloads().await?;

        ui::print_progress_step(5, UPGRADE_STEPS, "Applying post-install patches");
        self.post_install_patch().await?;

        let elapsed = chrono::Utc::now() - started;
        self.print_success_summary(elapsed.num_seconds());
        Ok(())
    }

    /// The deployments K3s itself must bring up before anything else is
    /// installed on top.
    async fn wait_core_workloads(&self) -> Result<()> {
        for deployment in [
            "deployment/local-path-provisioner",
            "deployment/coredns",
            "deployment/traefik",
        ] {
            self.kubectl
                .wait_for_condition("kube-system", deployment, "Available", &self.budgets.resource)
                .await?;
        }
        Ok(())
    }

    async fn install_cert_manager(&self) -> Result<()> {
        self.helm
            .repo_add("jetstack", "https://charts.jetstack.io", &self.budgets.helm)
            .await?;
        self.helm.repo_update(&self.budgets.helm).await?;

        let mut args = vec![
            "upgrade",
            "--install",
            "cert-manager",
            "jetstack/cert-manager",
            "--namespace",
            "cert-manager",
            "--create-namespace",
            "--set",
            "crds.enabled=true",
            "--wait",
            "--wait-for-jobs",
        ];
        if let Some(chart_version) = self.config.cert_manager_version.as_deref() {
            args.push("--version");
            args.push(chart_version);
        }

        self.helm
            .run_with_retry(&args, &self.budgets.helm)
            .await
            .context("cert-manager installation failed")?;

        self.kubectl
            .wait_for_condition(
                "cert-manager",
                "deployment/cert-manager",
                "Available",
                &self.budgets.resource,
            )
            .await?;

        Ok(())
    }

    /// Whether the configured version satisfies a constraint. The version
    /// token is the last segment of the composite string.
    fn manager_version_satisfies(&self, constraint: &str) -> Result<bool> {
        let spec = self.config.version_spec();
        version::satisfies(spec.version_token(), constraint)
            .with_context(|| format!("Cannot evaluate version constraint {constraint}"))
    }

    async fn deploy_rancher(&self) -> Result<()> {
        let extra_flags = if self.config.dev_chart && self.manager_version_satisfies(">=2.13")? {
            let spec = self.config.version_spec();
            let flags = rancher::dev_chart_flags(&self.config.hostname, &spec.channel);
            info!(flags = %flags.join(" "), "using dev system chart");
            flags
        } else {
            Vec::new()
        };

        let plan = rancher::plan(self.config, &extra_flags);

        self.helm
            .repo_add(&plan.repo_alias, &plan.repo_url, &self.budgets.helm)
            .await?;
        self.helm.repo_update(&self.budgets.helm).await?;

        let args: Vec<&str> = plan.args.iter().map(String::as_str).collect();
        self.helm
            .run_with_retry(&args, &self.budgets.helm)
            .await
            .context("Rancher Manager deployment failed")?;

        Ok(())
    }

    async fn wait_rancher_workloads(&self) -> Result<()> {
        let (namespace, deployment) = rancher::WEBHOOK_DEPLOYMENT;
        self.kubectl
            .wait_for_condition(namespace, deployment, "Available", &self.budgets.resource)
            .await?;

        // The turtles and CAPI controllers only ship from 2.13 on.
        if self.manager_version_satisfies(">=2.13")? {
            for (namespace, deployment) in [rancher::TURTLES_DEPLOYMENT, rancher::CAPI_DEPLOYMENT] {
                self.kubectl
                    .wait_for_condition(namespace, deployment, "Available", &self.budgets.resource)
                    .await?;
            }
        }

        Ok(())
    }

    /// Head builds leave the server-url setting unset: point it at the
    /// public hostname, bounce the deployment and wait for the whole pod set
    /// to come back.
    async fn post_install_patch(&self) -> Result<()> {
        let spec = self.config.version_spec();
        let is_head = spec.channel == "head" || spec.head_version.is_some();
        if !is_head {
            ui::print_info("No post-install patches required");
            return Ok(());
        }

        let patch =
            serde_json::json!({ "value": format!("https://{}", self.config.hostname) }).to_string();
        self.kubectl
            .run(&[
                "patch",
                "settings.management.cattle.io",
                "server-url",
                "--type",
                "merge",
                "-p",
                &patch,
            ])
            .context("Failed to patch the server-url setting")?;

        self.kubectl
            .run(&[
                "-n",
                rancher::SYSTEM_NAMESPACE,
                "rollout",
                "restart",
                "deployment/rancher",
            ])
            .context("Failed to restart the rancher deployment")?;

        let selectors = vec![
            PodSelector::new("cattle-system", "app=rancher"),
            PodSelector::new("cattle-system", "app=rancher-webhook"),
            PodSelector::new("cattle-fleet-local-system", "app=fleet-agent"),
        ];

        let client = pods::client_from_kubeconfig(&self.config.kubeconfig_path()).await?;
        pods::wait_for_pods_ready(&client, &selectors, &self.budgets.pods).await?;

        Ok(())
    }

    /// Run the configured log collector, best effort, before a failed run
    /// exits.
    pub fn collect_logs(&self) {
        let Some(script) = self.config.log_collector.as_deref() else {
            return;
        };

        ui::print_info(&format!("Collecting logs with {}", script.display()));
        match harness::CommandSpec::new("bash")
            .arg(script.display().to_string())
            .run()
        {
            Ok(output) => info!(output = %output.trim(), "log collector finished"),
            Err(e) => warn!(error = %e, "log collector failed"),
        }
    }

    fn print_success_summary(&self, elapsed_secs: i64) {
        ui::print_section("Scenario Complete!");
        ui::print_success("Rancher Manager is up and healthy.");
        ui::print_kv("Hostname", &self.config.hostname);
        ui::print_kv("Version", &self.config.rancher_version);
        if !self.config.arch.is_empty() {
            ui::print_kv("Architecture", &self.config.arch);
        }
        ui::print_kv("Elapsed", &format!("{elapsed_secs}s"));
    }
}
