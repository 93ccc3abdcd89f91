use anyhow::Result;
use clap::Args;

use crate::ui;
use crate::validator::PrerequisitesValidator;

/// Check the external tooling without running a scenario.
#[derive(Args)]
pub struct ValidateCommand {
    /// Check the full install requirements instead of the upgrade subset.
    #[arg(long)]
    install: bool,
}

impl ValidateCommand {
    pub async fn run(&self) -> Result<()> {
        ui::print_section("Validate Prerequisites");

        let validator = if self.install {
            PrerequisitesValidator::for_install()
        } else {
            PrerequisitesValidator::for_upgrade()
        };

        validator.validate()
    }
}
