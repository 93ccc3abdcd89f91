use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::commands;
use crate::scenario::Scenario;
use crate::ui;

/// Upgrade an existing Rancher Manager installation.
#[derive(Args)]
pub struct UpgradeCommand {
    /// Configuration file path (environment variables are used otherwise).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl UpgradeCommand {
    pub async fn run(&self) -> Result<()> {
        ui::print_section("Upgrade Rancher Manager");

        let config = commands::load_config(self.config.as_deref())?;
        commands::print_config_summary(&config);

        let scenario = Scenario::new(&config)?;
        if let Err(e) = scenario.run_upgrade().await {
            ui::print_error(&format!("Upgrade scenario failed: {e:#}"));
            scenario.collect_logs();
            return Err(e);
        }

        Ok(())
    }
}
