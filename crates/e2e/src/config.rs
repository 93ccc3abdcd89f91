//! Run configuration.
//!
//! Everything is read once at process start — either from the environment
//! (the variable names CI already exports) or from a YAML file — into an
//! immutable struct that is passed by reference into the scenario driver.
//! No global mutable configuration exists anywhere in the runner.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use harness::VersionSpec;
use serde::{Deserialize, Serialize};

fn default_timeout_scale() -> f64 {
    1.0
}

/// Immutable configuration for one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Architecture tag (informational, recorded in the run summary).
    #[serde(default)]
    pub arch: String,

    /// cert-manager chart version; latest when unset.
    #[serde(default)]
    pub cert_manager_version: Option<String>,

    /// Downstream cluster name (informational).
    #[serde(default)]
    pub cluster_name: String,

    /// Downstream cluster namespace (informational).
    #[serde(default)]
    pub cluster_ns: String,

    /// Public hostname Rancher Manager is served on.
    pub hostname: String,

    /// Log collector script to run when a scenario fails.
    #[serde(default)]
    pub log_collector: Option<PathBuf>,

    /// Composite `channel/version[/headVersion]` string selecting what to
    /// install (e.g. `latest/2.13.0`, `head/2.13`, `latest/devel/2.12`).
    pub rancher_version: String,

    /// Install from the in-development system chart, pinning the turtles
    /// chart version through extra environment entries.
    #[serde(default)]
    pub dev_chart: bool,

    /// Multiplier applied to every step budget (slow runners). Never below 1.
    #[serde(default = "default_timeout_scale")]
    pub timeout_scale: f64,

    /// Explicit kubeconfig; defaults to the K3s-written one.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

impl EnvConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when `RANCHER_VERSION` or `PUBLIC_DNS` is missing or
    /// empty, or when `TIMEOUT_SCALE` is not a number >= 1.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => bail!("{key} environment variable not set"),
            }
        };

        let timeout_scale = match lookup("TIMEOUT_SCALE") {
            Some(raw) => {
                let scale: f64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("TIMEOUT_SCALE is not a number: {raw:?}"))?;
                if scale < 1.0 {
                    bail!("TIMEOUT_SCALE must be >= 1, got {scale}");
                }
                scale
            }
            None => default_timeout_scale(),
        };

        Ok(Self {
            arch: lookup("ARCH").unwrap_or_default(),
            cert_manager_version: lookup("CERT_MANAGER_VERSION").filter(|v| !v.is_empty()),
            cluster_name: lookup("CLUSTER_NAME").unwrap_or_default(),
            cluster_ns: lookup("CLUSTER_NS").unwrap_or_default(),
            hostname: required("PUBLIC_DNS")?,
            log_collector: lookup("RANCHER_LOG_COLLECTOR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            rancher_version: required("RANCHER_VERSION")?,
            dev_chart: lookup("TURTLES_DEV_CHART").as_deref() == Some("true"),
            timeout_scale,
            kubeconfig: lookup("KUBECONFIG")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Load configuration from a YAML file instead of the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        if config.rancher_version.trim().is_empty() {
            bail!("rancher_version must not be empty");
        }
        if config.timeout_scale < 1.0 {
            bail!("timeout_scale must be >= 1, got {}", config.timeout_scale);
        }
        Ok(config)
    }

    /// The composite version string split into its positional segments.
    #[must_use]
    pub fn version_spec(&self) -> VersionSpec {
        VersionSpec::parse(&self.rancher_version)
    }

    /// Kubeconfig to drive the cluster with: the explicit one when given,
    /// otherwise the file K3s writes.
    #[must_use]
    pub fn kubeconfig_path(&self) -> PathBuf {
        self.kubeconfig
            .clone()
            .unwrap_or_else(|| PathBuf::from(harness::k3s::KUBECONFIG_PATH))
    }
}
