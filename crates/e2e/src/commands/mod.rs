//! CLI subcommands.

pub mod install;
pub mod upgrade;
pub mod validate;

use std::path::Path;

use anyhow::Result;

use crate::config::EnvConfig;
use crate::ui;

/// Load configuration from an explicit file when given, from the
/// environment otherwise.
pub fn load_config(file: Option<&Path>) -> Result<EnvConfig> {
    match file {
        Some(path) => EnvConfig::from_yaml(path),
        None => EnvConfig::from_env(),
    }
}

/// Print the values a run is about to use.
pub fn print_config_summary(config: &EnvConfig) {
    println!();
    ui::print_kv("Hostname", &config.hostname);
    ui::print_kv("Version", &config.rancher_version);
    if let Some(cert_manager) = config.cert_manager_version.as_deref() {
        ui::print_kv("cert-manager", cert_manager);
    }
    ui::print_kv("Dev chart", if config.dev_chart { "yes" } else { "no" });
    if !config.cluster_name.is_empty() {
        ui::print_kv("Cluster", &config.cluster_name);
    }
    if !config.cluster_ns.is_empty() {
        ui::print_kv("Cluster namespace", &config.cluster_ns);
    }
    if config.timeout_scale > 1.0 {
        ui::print_kv("Timeout scale", &format!("{}", config.timeout_scale));
    }
    println!();
}
