use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};

use crate::commands;
use crate::scenario::Scenario;
use crate::ui;

/// Install K3s, cert-manager and Rancher Manager on this host.
#[derive(Args)]
pub struct InstallCommand {
    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,

    /// Configuration file path (environment variables are used otherwise).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl InstallCommand {
    pub async fn run(&self) -> Result<()> {
        ui::print_section("Install Rancher Manager");

        let config = commands::load_config(self.config.as_deref())?;
        commands::print_config_summary(&config);

        if !self.yes {
            let proceed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("This installs K3s onto this host. Proceed?")
                .default(true)
                .interact()?;

            if !proceed {
                println!("{}", "Installation cancelled.".yellow());
                return Ok(());
            }
        }

        let scenario = Scenario::new(&config)?;
        if let Err(e) = scenario.run_install().await {
            ui::print_error(&format!("Install scenario failed: {e:#}"));
            scenario.collect_logs();
            return Err(e);
        }

        Ok(())
    }
}
