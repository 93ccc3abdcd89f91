//! Rancher Manager deployment planning.
//!
//! Maps the extracted channel/version onto a chart repository and the full
//! `helm upgrade --install` argument vector. Pure functions — the scenario
//! driver feeds the plan to the retrying helm runner.

use harness::VersionSpec;

use crate::config::EnvConfig;

/// Namespace the server chart installs into.
pub const SYSTEM_NAMESPACE: &str = "cattle-system";

/// Namespaces/deployments that must be Available after an install.
pub const WEBHOOK_DEPLOYMENT: (&str, &str) = ("cattle-system", "deployments/rancher-webhook");

/// Additional controller deployments present from 2.13 on.
pub const TURTLES_DEPLOYMENT: (&str, &str) = (
    "cattle-turtles-system",
    "deployments/rancher-turtles-controller-manager",
);
pub const CAPI_DEPLOYMENT: (&str, &str) =
    ("cattle-capi-system", "deployments/capi-controller-manager");

/// Branch and pinned chart version used when installing against the
/// in-development system chart.
pub const DEV_CHART_BRANCH: &str = "dev-v2.13";
pub const DEV_TURTLES_VERSION: &str = "108.0.0+up99.99.99";

/// A fully planned deployment: which chart repo to register and the helm
/// arguments to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub repo_alias: String,
    pub repo_url: String,
    pub args: Vec<String>,
}

/// Chart repository URL for a release channel. Prime channels are served
/// from their own host; everything else from the public release repo.
#[must_use]
pub fn chart_repo_url(channel: &str) -> String {
    if channel.starts_with("prime") {
        format!("https://charts.rancher.com/server-charts/{channel}")
    } else {
        format!("https://releases.rancher.com/server-charts/{channel}")
    }
}

/// Local repo alias for a channel. `head` installs resolve charts from the
/// `latest` repo (there is no head chart repo, only head images).
#[must_use]
pub fn repo_alias(channel: &str) -> String {
    let channel = if channel == "head" { "latest" } else { channel };
    format!("rancher-{}", channel.replace('/', "-"))
}

/// Starting index for extra `extraEnv` entries. Index 0 always carries
/// `CATTLE_SERVER_URL`; prime-optimus channels also occupy index 1 with the
/// agent TLS mode, so later entries shift by one.
#[must_use]
pub fn extra_env_start_index(channel: &str) -> usize {
    if channel.contains("prime-optimus") {
        2
    } else {
        1
    }
}

/// `--set`/`--set-string` pairs pointing the server at the in-development
/// system chart and pinning the turtles chart version.
#[must_use]
pub fn dev_chart_flags(hostname: &str, channel: &str) -> Vec<String> {
    let start = extra_env_start_index(channel);
    let entries = [
        (
            "CATTLE_CHART_DEFAULT_URL",
            format!("http://{hostname}:4080/git/charts"),
        ),
        ("CATTLE_CHART_DEFAULT_BRANCH", DEV_CHART_BRANCH.to_string()),
        (
            "CATTLE_RANCHER_TURTLES_VERSION",
            DEV_TURTLES_VERSION.to_string(),
        ),
    ];

    let mut flags = Vec::with_capacity(entries.len() * 4);
    for (offset, (name, value)) in entries.into_iter().enumerate() {
        let idx = start + offset;
        flags.push("--set".to_string());
        flags.push(format!("extraEnv[{idx}].name={name}"));
        flags.push("--set-string".to_string());
        flags.push(format!("extraEnv[{idx}].value={value}"));
    }
    flags
}

fn version_flags(spec: &VersionSpec) -> Vec<String> {
    // Three-segment composites and the head channel install development
    // builds: chart from the devel stream, image pinned to the head tag.
    if let Some(head) = spec.head_version.as_deref().filter(|v| !v.is_empty()) {
        return vec![
            "--devel".to_string(),
            "--set".to_string(),
            format!("rancherImageTag=v{head}-head"),
        ];
    }

    match spec.version.as_deref() {
        Some("devel") => vec!["--devel".to_string()],
        Some(version) if !version.is_empty() => {
            if spec.channel == "head" {
                vec![
                    "--devel".to_string(),
                    "--set".to_string(),
                    format!("rancherImageTag=v{version}-head"),
                ]
            } else {
                vec!["--version".to_string(), version.to_string()]
            }
        }
        _ => Vec::new(),
    }
}

/// Build the full deployment plan for the configured channel/version.
#[must_use]
pub fn plan(config: &EnvConfig, extra_flags: &[String]) -> DeployPlan {
    let spec = config.version_spec();
    let alias = repo_alias(&spec.channel);
    let repo_url = chart_repo_url(if spec.channel == "head" {
        "latest"
    } else {
        &spec.channel
    });

    let mut args: Vec<String> = [
        "upgrade",
        "--install",
        "rancher",
        &format!("{alias}/rancher"),
        "--namespace",
        SYSTEM_NAMESPACE,
        "--create-namespace",
        "--set",
        &format!("hostname={}", config.hostname),
        "--set",
        "bootstrapPassword=rancherpassword",
        "--set",
        "replicas=1",
        "--set",
        "extraEnv[0].name=CATTLE_SERVER_URL",
        "--set-string",
        &format!("extraEnv[0].value=https://{}", config.hostname),
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect();

    if spec.channel.contains("prime-optimus") {
        args.extend(
            [
                "--set",
                "extraEnv[1].name=CATTLE_AGENT_TLS_MODE",
                "--set-string",
                "extraEnv[1].value=system-store",
            ]
            .into_iter()
            .map(ToString::to_string),
        );
    }

    args.extend(version_flags(&spec));
    args.extend(extra_flags.iter().cloned());
    args.push("--wait".to_string());

    DeployPlan {
        repo_alias: alias,
        repo_url,
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(rancher_version: &str, dev_chart: bool) -> EnvConfig {
        EnvConfig::from_lookup(|key| match key {
            "PUBLIC_DNS" => Some("rancher.example.com".to_string()),
            "RANCHER_VERSION" => Some(rancher_version.to_string()),
            "TURTLES_DEV_CHART" => Some(if dev_chart { "true" } else { "false" }.to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn channel_maps_to_chart_repo() {
        assert_eq!(
            chart_repo_url("latest"),
            "https://releases.rancher.com/server-charts/latest"
        );
        assert_eq!(
            chart_repo_url("prime"),
            "https://charts.rancher.com/server-charts/prime"
        );
        assert_eq!(
            chart_repo_url("prime-optimus"),
            "https://charts.rancher.com/server-charts/prime-optimus"
        );
    }

    #[test]
    fn extra_env_index_shifts_for_prime_optimus() {
        assert_eq!(extra_env_start_index("latest"), 1);
        assert_eq!(extra_env_start_index("prime"), 1);
        assert_eq!(extra_env_start_index("prime-optimus"), 2);
        assert_eq!(extra_env_start_index("prime-optimus-alpha"), 2);
    }

    #[test]
    fn dev_chart_flags_number_from_start_index() {
        let flags = dev_chart_flags("rancher.example.com", "latest");
        assert_eq!(flags.len(), 12);
        assert_eq!(flags[1], "extraEnv[1].name=CATTLE_CHART_DEFAULT_URL");
        assert_eq!(
            flags[3],
            "extraEnv[1].value=http://rancher.example.com:4080/git/charts"
        );
        assert_eq!(flags[5], "extraEnv[2].name=CATTLE_CHART_DEFAULT_BRANCH");
        assert_eq!(flags[9], "extraEnv[3].name=CATTLE_RANCHER_TURTLES_VERSION");

        let shifted = dev_chart_flags("rancher.example.com", "prime-optimus-alpha");
        assert_eq!(shifted[1], "extraEnv[2].name=CATTLE_CHART_DEFAULT_URL");
    }

    #[test]
    fn pinned_release_uses_version_flag() {
        let plan = plan(&config_for("latest/2.13.0", false), &[]);
        assert_eq!(plan.repo_alias, "rancher-latest");
        assert_eq!(
            plan.repo_url,
            "https://releases.rancher.com/server-charts/latest"
        );
        assert!(plan
            .args
            .windows(2)
            .any(|w| w[0] == "--version" && w[1] == "2.13.0"));
        assert!(!plan.args.contains(&"--devel".to_string()));
        assert_eq!(plan.args.last().unwrap(), "--wait");
    }

    #[test]
    fn head_channel_pins_image_tag_from_devel_stream() {
        let plan = plan(&config_for("head/2.13", false), &[]);
        assert_eq!(plan.repo_alias, "rancher-latest");
        assert!(plan.args.contains(&"--devel".to_string()));
        assert!(plan
            .args
            .contains(&"rancherImageTag=v2.13-head".to_string()));
        assert!(!plan.args.contains(&"--version".to_string()));
    }

    #[test]
    fn three_segment_composite_installs_head_build() {
        let plan = plan(&config_for("latest/devel/2.12", false), &[]);
        assert!(plan.args.contains(&"--devel".to_string()));
        assert!(plan
            .args
            .contains(&"rancherImageTag=v2.12-head".to_string()));
    }

    #[test]
    fn devel_version_uses_devel_flag_only() {
        let plan = plan(&config_for("alpha/devel", false), &[]);
        assert!(plan.args.contains(&"--devel".to_string()));
        assert!(!plan.args.iter().any(|a| a.starts_with("rancherImageTag")));
    }

    #[test]
    fn prime_optimus_occupies_second_extra_env_slot() {
        let plan = plan(&config_for("prime-optimus/2.13.1", false), &[]);
        assert!(plan
            .args
            .contains(&"extraEnv[1].name=CATTLE_AGENT_TLS_MODE".to_string()));
    }

    #[test]
    fn extra_flags_are_appended_before_wait() {
        let extra = dev_chart_flags("rancher.example.com", "latest");
        let plan = plan(&config_for("latest/2.13.0", true), &extra);
        let wait_pos = plan.args.iter().position(|a| a == "--wait").unwrap();
        let extra_pos = plan
            .args
            .iter()
            .position(|a| a.contains("CATTLE_CHART_DEFAULT_URL"))
            .unwrap();
        assert!(extra_pos < wait_pos);
    }
}
