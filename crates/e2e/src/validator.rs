use std::process::Command;

use anyhow::Result;
use colored::Colorize;
use which::which;

use crate::ui;

/// Validates the external tooling a scenario shells out to.
pub struct PrerequisitesValidator {
    requirements: Vec<Requirement>,
}

struct Requirement {
    name: String,
    check: Box<dyn Fn() -> bool>,
    install_instructions: String,
    critical: bool,
}

fn binary_responds(program: &'static str, probe_args: &'static [&'static str]) -> Box<dyn Fn() -> bool> {
    Box::new(move || {
        which(program).is_ok()
            && Command::new(program)
                .args(probe_args)
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false)
    })
}

fn binary_present(program: &'static str) -> Box<dyn Fn() -> bool> {
    Box::new(move || which(program).is_ok())
}

impl PrerequisitesValidator {
    fn base_requirements() -> Vec<Requirement> {
        vec![
            Requirement {
                name: "kubectl".to_string(),
                check: binary_responds("kubectl", &["version", "--client"]),
                install_instructions: "Install kubectl from https://kubernetes.io/docs/tasks/tools/"
                    .to_string(),
                critical: true,
            },
            Requirement {
                name: "Helm".to_string(),
                check: binary_responds("helm", &["version"]),
                install_instructions: "Install Helm from https://helm.sh/docs/intro/install/"
                    .to_string(),
                critical: true,
            },
        ]
    }

    /// Requirements for an upgrade run: cluster tooling only.
    #[must_use]
    pub fn for_upgrade() -> Self {
        Self {
            requirements: Self::base_requirements(),
        }
    }

    /// Requirements for a full install: the cluster tooling plus everything
    /// the K3s bootstrap needs on the host.
    #[must_use]
    pub fn for_install() -> Self {
        let mut requirements = Self::base_requirements();

        requirements.push(Requirement {
            name: "sh".to_string(),
            check: binary_present("sh"),
            install_instructions: "A POSIX shell is required to run the K3s install script"
                .to_string(),
            critical: true,
        });

        requirements.push(Requirement {
            name: "systemctl".to_string(),
            check: binary_present("systemctl"),
            install_instructions: "K3s is started through systemd on the target host".to_string(),
            critical: true,
        });

        requirements.push(Requirement {
            name: "sudo".to_string(),
            check: binary_present("sudo"),
            install_instructions: "Starting the K3s service requires sudo (or run as root)"
                .to_string(),
            critical: false,
        });

        Self { requirements }
    }

    /// Run all checks, printing each result.
    ///
    /// # Errors
    ///
    /// Returns an error when any critical prerequisite is missing.
    pub fn validate(&self) -> Result<()> {
        println!();
        let mut failures = Vec::new();

        for requirement in &self.requirements {
            if (requirement.check)() {
                ui::print_check_result(&requirement.name, true, None);
            } else {
                ui::print_check_result(&requirement.name, false, None);
                failures.push(requirement);
            }
        }

        println!();

        if failures.is_empty() {
            ui::print_success("All prerequisites met!");
        } else {
            ui::print_warning("Some prerequisites are not met:");
            println!();
            for failure in &failures {
                if failure.critical {
                    println!(
                        "  {} {} - {}",
                        "✗".red(),
                        failure.name.red(),
                        failure.install_instructions.bright_black()
                    );
                } else {
                    println!(
                        "  {} {} - {}",
                        "⚠".yellow(),
                        failure.name.yellow(),
                        failure.install_instructions.bright_black()
                    );
                }
            }
            println!();

            if failures.iter().any(|f| f.critical) {
                return Err(anyhow::anyhow!(
                    "Critical prerequisites not met. Please install the required tools and try again."
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_is_present_on_test_hosts() {
        assert!(binary_present("sh")());
    }

    #[test]
    fn missing_binary_fails_probe() {
        assert!(!binary_present("definitely-not-a-real-binary-name")());
    }
}
