use std::process::Command;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rancher-e2e"))
}

#[test]
fn help_lists_subcommands() {
    let output = bin().arg("--help").output().expect("run rancher-e2e --help");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("install"));
    assert!(stdout.contains("upgrade"));
    assert!(stdout.contains("validate"));
}

#[test]
fn install_without_configuration_fails_cleanly() {
    let output = bin()
        .args(["install", "--yes"])
        .env_remove("RANCHER_VERSION")
        .env_remove("PUBLIC_DNS")
        .output()
        .expect("run rancher-e2e install");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("RANCHER_VERSION") || stderr.contains("PUBLIC_DNS"));
}

#[test]
#[ignore = "requires kubectl and helm on the PATH"]
fn validate_passes_on_provisioned_hosts() {
    let output = bin()
        .arg("validate")
        .output()
        .expect("run rancher-e2e validate");
    assert!(output.status.success());
}

#[test]
#[ignore = "requires a host that K3s may be installed onto, network access and sudo"]
fn install_scenario_end_to_end() {
    let output = bin()
        .args(["install", "--yes"])
        .env("RANCHER_VERSION", "latest/2.13.0")
        .env("PUBLIC_DNS", "rancher.local")
        .output()
        .expect("run rancher-e2e install");
    assert!(output.status.success());
}
